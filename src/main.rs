//! Event-Harvester main entry point
//!
//! This is the command-line interface for the Event-Harvester channel feed
//! harvester.

use anyhow::{bail, Context};
use clap::Parser;
use event_harvester::config::{
    compute_config_hash, load_config, parse_ids_list, validate, Config,
};
use event_harvester::crawler::{Coordinator, Mode};
use event_harvester::output::{load_statistics, print_statistics};
use event_harvester::storage::{open_storage, Storage};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Event-Harvester: a resumable channel feed harvester
///
/// Pages through a public channel's web feed, stores every post once in a
/// SQLite database, derives event announcements from post text and keeps
/// a JSON export of all events up to date.
#[derive(Parser, Debug)]
#[command(name = "event-harvester")]
#[command(version)]
#[command(about = "A resumable channel feed harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (optional; defaults apply without it)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Channel username to harvest
    #[arg(long)]
    channel: Option<String>,

    /// SQLite database path
    #[arg(long, value_name = "PATH")]
    db: Option<String>,

    /// Maximum feed pages per update run
    #[arg(long)]
    max_pages: Option<u32>,

    /// Maximum posts examined per update run
    #[arg(long)]
    max_posts: Option<u32>,

    /// Stop after this many consecutive already-stored posts
    #[arg(long)]
    stop_after_known: Option<u32>,

    /// Delay between requests, in seconds
    #[arg(long, value_name = "SECONDS")]
    sleep: Option<f64>,

    /// Flush export and checkpoint every N insertions (0 disables)
    #[arg(long)]
    checkpoint_every: Option<u32>,

    /// Fetch these post ids instead of paging (comma-separated)
    #[arg(long, value_name = "IDS", conflicts_with = "repair_missing")]
    fetch_ids: Option<String>,

    /// Re-fetch ids missing inside the stored id range
    #[arg(long)]
    repair_missing: bool,

    /// Maximum ids fetched by --repair-missing
    #[arg(long)]
    repair_limit: Option<u32>,

    /// Event export path
    #[arg(long, value_name = "PATH", conflicts_with = "no_export")]
    export: Option<String>,

    /// Disable the event export
    #[arg(long)]
    no_export: bool,

    /// Checkpoint path
    #[arg(long, value_name = "PATH", conflicts_with = "no_checkpoint")]
    checkpoint_file: Option<String>,

    /// Disable the checkpoint
    #[arg(long)]
    no_checkpoint: bool,

    /// Append each newly inserted event to this JSONL file
    #[arg(long, value_name = "PATH")]
    events_jsonl: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_only"])]
    stats: bool,

    /// Rewrite the event export from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_only: bool,

    /// Print the effective configuration and exit
    #[arg(long, conflicts_with_all = ["stats", "export_only"])]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = effective_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config, &select_mode(&cli, &config)?)
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.export_only {
        handle_export_only(&config)
    } else {
        let mode = select_mode(&cli, &config)?;
        handle_harvest(config, mode).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("event_harvester=info,warn"),
            1 => EnvFilter::new("event_harvester=debug,info"),
            2 => EnvFilter::new("event_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the config file (if any) and applies command-line overrides
fn effective_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(channel) = &cli.channel {
        config.channel.name = channel.clone();
    }
    if let Some(db) = &cli.db {
        config.output.database_path = db.clone();
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(max_posts) = cli.max_posts {
        config.crawler.max_posts = max_posts;
    }
    if let Some(stop_after_known) = cli.stop_after_known {
        config.crawler.stop_after_known = stop_after_known;
    }
    if let Some(sleep) = cli.sleep {
        if !sleep.is_finite() || sleep < 0.0 {
            bail!("--sleep must be a non-negative number of seconds, got {}", sleep);
        }
        config.crawler.sleep_ms = (sleep * 1000.0).round() as u64;
    }
    if let Some(checkpoint_every) = cli.checkpoint_every {
        config.crawler.checkpoint_every = checkpoint_every;
    }
    if let Some(repair_limit) = cli.repair_limit {
        config.crawler.repair_limit = repair_limit;
    }

    if cli.no_export {
        config.output.export_path = None;
    } else if let Some(export) = &cli.export {
        config.output.export_path = Some(export.clone());
    }
    if cli.no_checkpoint {
        config.output.checkpoint_path = None;
    } else if let Some(checkpoint) = &cli.checkpoint_file {
        config.output.checkpoint_path = Some(checkpoint.clone());
    }
    if let Some(events_jsonl) = &cli.events_jsonl {
        config.output.events_jsonl_path = Some(events_jsonl.clone());
    }

    validate(&config).context("invalid configuration")?;
    Ok(config)
}

fn select_mode(cli: &Cli, config: &Config) -> anyhow::Result<Mode> {
    if let Some(ids) = &cli.fetch_ids {
        let ids = parse_ids_list(ids).context("invalid --fetch-ids")?;
        if ids.is_empty() {
            bail!("--fetch-ids needs at least one post id");
        }
        return Ok(Mode::TargetedFetch { ids });
    }

    if cli.repair_missing {
        return Ok(Mode::Repair {
            limit: config.crawler.repair_limit as usize,
        });
    }

    Ok(Mode::Update)
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config, mode: &Mode) -> anyhow::Result<()> {
    println!("=== Event-Harvester Dry Run ===\n");
    println!("Mode: {}", mode.name());
    if let Mode::TargetedFetch { ids } = mode {
        println!("Ids: {:?}", ids);
    }
    println!("Config hash: {}\n", compute_config_hash(config)?);
    print!("{}", toml::to_string_pretty(config)?);
    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage, config.channel.username())?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-only mode: rewrites the event export
fn handle_export_only(config: &Config) -> anyhow::Result<()> {
    let Some(export_path) = &config.output.export_path else {
        bail!("--export-only needs an export path, but the export is disabled");
    };

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let count = storage
        .export_events(config.channel.username(), Path::new(export_path))
        .with_context(|| format!("failed to export events to {}", export_path))?;

    println!("✓ Exported {} events to: {}", count, export_path);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, mode: Mode) -> anyhow::Result<()> {
    let token = CancellationToken::new();
    let listener = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current item");
            listener.cancel();
        }
    });

    tracing::info!(
        "Harvesting channel {} into {}",
        config.channel.username(),
        config.output.database_path
    );

    let mut coordinator = Coordinator::new(config)?.with_cancellation(token);
    let outcome = coordinator.run(mode).await?;

    tracing::info!("Harvest stopped: {}", outcome.reason);
    Ok(())
}
