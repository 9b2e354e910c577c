//! Harvest coordinator - main orchestration logic
//!
//! This module contains the run loops that tie the harvester together:
//! - Paging backwards through the feed until caught up with the store
//! - Fetching explicit ids and recording the ones that cannot be ingested
//! - Repairing gaps inside the stored id range
//! - Periodic and final flushes of the export and checkpoint artifacts
//!
//! All three modes share one ingestion step, so a post is persisted and
//! turned into events the same way no matter how it was found.

use super::fetcher::{FetchError, Fetcher};
use super::parser::{PageDecoder, TelegramPageDecoder};
use super::progress::{Mode, Phase, RunOutcome, RunProgress, StopReason};
use crate::config::{compute_config_hash, validate, Config};
use crate::extract::{EventDeriver, HeuristicDeriver};
use crate::model::{MissingStatus, Post};
use crate::output::{write_checkpoint, EventLog};
use crate::storage::{open_storage, RunStatus, Storage};
use crate::{ConfigError, Result};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Longest diagnostic note kept in the missing-post ledger, in characters
const MAX_NOTE_CHARS: usize = 200;

/// Builds feed and single-post URLs for one channel
#[derive(Debug, Clone)]
struct Endpoints {
    base: Url,
    channel: String,
}

impl Endpoints {
    fn new(base_url: &str, channel: &str) -> std::result::Result<Self, ConfigError> {
        let base = Url::parse(base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            base,
            channel: channel.to_string(),
        })
    }

    fn with_path(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `{base}/s/{channel}`, optionally `?before={cursor}`
    fn feed_page(&self, before: Option<i64>) -> Url {
        let mut url = self.with_path(&["s", self.channel.as_str()]);
        if let Some(before) = before {
            url.query_pairs_mut()
                .append_pair("before", &before.to_string());
        }
        url
    }

    /// `{base}/{channel}/{id}?embed=1`
    fn single_post(&self, post_id: i64) -> Url {
        let id = post_id.to_string();
        let mut url = self.with_path(&[self.channel.as_str(), id.as_str()]);
        url.query_pairs_mut().append_pair("embed", "1");
        url
    }
}

/// Why one id in a targeted fetch could not be ingested
#[derive(Debug)]
struct Miss {
    status: MissingStatus,
    note: String,
}

impl Miss {
    fn new(status: MissingStatus, note: impl Into<String>) -> Self {
        Self {
            status,
            note: note.into(),
        }
    }

    fn unexpected(cause: impl std::fmt::Display) -> Self {
        Self::new(
            MissingStatus::Error,
            cause.to_string().chars().take(MAX_NOTE_CHARS).collect::<String>(),
        )
    }
}

/// What became of one id in a targeted fetch
#[derive(Debug)]
enum Attempt {
    Stored,
    Missed(Miss),
    Cancelled,
}

/// Main harvest coordinator
pub struct Coordinator {
    config: Config,
    endpoints: Endpoints,
    storage: Box<dyn Storage>,
    fetcher: Fetcher,
    decoder: Box<dyn PageDecoder>,
    deriver: Box<dyn EventDeriver>,
    cancel: CancellationToken,
    event_log: Option<EventLog>,
    next_checkpoint: u64,
}

impl Coordinator {
    /// Creates a coordinator backed by the SQLite database named in `config`
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Invalid configuration, or the store or HTTP
    ///   client could not be initialised
    pub fn new(config: Config) -> Result<Self> {
        validate(&config)?;
        let storage = open_storage(Path::new(&config.output.database_path))?;
        Self::with_storage(config, Box::new(storage))
    }

    /// Creates a coordinator over an already opened store
    pub fn with_storage(config: Config, storage: Box<dyn Storage>) -> Result<Self> {
        validate(&config)?;
        let endpoints = Endpoints::new(&config.channel.base_url, config.channel.username())?;
        let fetcher = Fetcher::new(&config.fetcher)?;
        let decoder = Box::new(TelegramPageDecoder::new(config.channel.base_url.as_str()));
        let deriver = Box::new(HeuristicDeriver::new(config.heuristics.clone()));

        Ok(Self {
            config,
            endpoints,
            storage,
            fetcher,
            decoder,
            deriver,
            cancel: CancellationToken::new(),
            event_log: None,
            next_checkpoint: 0,
        })
    }

    /// Stops the run at the next page or id boundary once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.fetcher = self.fetcher.with_cancellation(token.clone());
        self.cancel = token;
        self
    }

    pub fn with_decoder(mut self, decoder: Box<dyn PageDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_deriver(mut self, deriver: Box<dyn EventDeriver>) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    fn channel(&self) -> String {
        self.config.channel.username().to_string()
    }

    /// Runs one mode to completion
    ///
    /// Every termination, including cancellation and fatal errors, ends
    /// with a best-effort flush of the export and checkpoint artifacts and
    /// a closed run record.
    ///
    /// # Returns
    ///
    /// * `Ok(RunOutcome)` - The run stopped normally or was cancelled
    /// * `Err(HarvestError)` - A feed page could not be fetched or decoded,
    ///   or the store failed outside a single item
    pub async fn run(&mut self, mode: Mode) -> Result<RunOutcome> {
        let channel = self.channel();
        let config_hash = compute_config_hash(&self.config)?;

        self.event_log = match &self.config.output.events_jsonl_path {
            Some(path) => Some(EventLog::open(Path::new(path))?),
            None => None,
        };
        self.next_checkpoint = u64::from(self.config.crawler.checkpoint_every);

        let run_id = self.storage.create_run(&channel, mode.name(), &config_hash)?;
        info!("Starting {} run {} for channel {}", mode.name(), run_id, channel);

        let mut progress = RunProgress::new(&channel, &mode);
        let result = match &mode {
            Mode::Update => self.run_update(&channel, &mut progress).await,
            Mode::TargetedFetch { ids } => self.run_targeted(&channel, ids, &mut progress).await,
            Mode::Repair { limit } => self.run_repair(&channel, *limit, &mut progress).await,
        };

        match result {
            Ok(reason) => {
                progress.outcome = Some(reason);
                enter(Phase::Stopped(reason));
                self.flush(&progress);

                let status = if reason == StopReason::Cancelled {
                    RunStatus::Interrupted
                } else {
                    RunStatus::Completed
                };
                self.close_run(run_id, status);

                info!(
                    "Run {} finished ({}): {} pages, {} posts processed, {} posts and {} events inserted, {} ids recorded missing",
                    run_id,
                    reason,
                    progress.pages,
                    progress.processed_posts,
                    progress.inserted_posts,
                    progress.inserted_events,
                    progress.missing_recorded
                );

                Ok(RunOutcome {
                    run_id,
                    reason,
                    progress,
                })
            }
            Err(e) => {
                error!("Run {} failed: {}", run_id, e);
                progress.error = Some(e.to_string());
                self.flush(&progress);
                self.close_run(run_id, RunStatus::Failed);
                Err(e)
            }
        }
    }

    /// Pages backwards from the newest post
    async fn run_update(
        &mut self,
        channel: &str,
        progress: &mut RunProgress,
    ) -> Result<StopReason> {
        let max_pages = self.config.crawler.max_pages;
        let max_posts = self.config.crawler.max_posts;
        let stop_after_known = self.config.crawler.stop_after_known.max(1);

        loop {
            if self.cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }
            if progress.pages >= max_pages {
                return Ok(StopReason::PageLimit);
            }
            if progress.processed_posts >= max_posts {
                return Ok(StopReason::PostLimit);
            }

            enter(Phase::Paging);
            let url = self.endpoints.feed_page(progress.before);
            let body = match self.fetcher.fetch(url.as_str()).await {
                Err(FetchError::Cancelled) => return Ok(StopReason::Cancelled),
                result => result?,
            };
            let posts = self.decoder.decode(&body, channel)?;

            let Some(oldest) = posts.iter().map(|p| p.post_id).min() else {
                info!("No posts on page (before={:?}), stopping", progress.before);
                return Ok(StopReason::FeedExhausted);
            };
            progress.pages += 1;

            let ids: Vec<i64> = posts.iter().map(|p| p.post_id).collect();
            let existing = self.storage.existing_post_ids(channel, &ids)?;
            info!(
                "Page {} (before={:?}): {} posts, {} already stored",
                progress.pages,
                progress.before,
                posts.len(),
                existing.len()
            );

            enter(Phase::Draining);
            for post in &posts {
                if progress.processed_posts >= max_posts {
                    break;
                }
                progress.processed_posts += 1;

                if existing.contains(&post.post_id) {
                    progress.known_streak += 1;
                    if progress.known_streak >= stop_after_known {
                        info!(
                            "{} known posts in a row, caught up with stored history",
                            progress.known_streak
                        );
                        return Ok(StopReason::KnownStreak);
                    }
                    continue;
                }

                progress.known_streak = 0;
                if let Err(e) = self.ingest_post(post, progress) {
                    error!("Error processing post {}: {}", post.post_url, e);
                }
                self.maybe_checkpoint(progress);
            }

            if progress.before == Some(oldest) {
                warn!("Pagination stuck at before={}, stopping", oldest);
                return Ok(StopReason::PaginationStuck);
            }
            progress.before = Some(oldest);

            if progress.pages < max_pages && progress.processed_posts < max_posts {
                self.pause().await;
            }
        }
    }

    /// Fetches each id on its own; failures are recorded, never fatal to the batch
    async fn run_targeted(
        &mut self,
        channel: &str,
        ids: &[i64],
        progress: &mut RunProgress,
    ) -> Result<StopReason> {
        let mut seen = HashSet::new();
        let ids: Vec<i64> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        let total = ids.len();

        enter(Phase::Draining);
        for (index, &post_id) in ids.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }

            if self
                .storage
                .existing_post_ids(channel, &[post_id])?
                .contains(&post_id)
            {
                info!("[{}/{}] post {} already stored, skipping", index + 1, total, post_id);
                continue;
            }

            progress.processed_posts += 1;
            match self.fetch_one(channel, post_id, progress).await {
                Attempt::Stored => info!("[{}/{}] stored post {}", index + 1, total, post_id),
                Attempt::Cancelled => return Ok(StopReason::Cancelled),
                Attempt::Missed(miss) => {
                    warn!(
                        "[{}/{}] post {} recorded as {}: {}",
                        index + 1,
                        total,
                        post_id,
                        miss.status,
                        miss.note
                    );
                    self.storage
                        .record_missing(channel, post_id, miss.status, &miss.note)?;
                    progress.missing_recorded += 1;
                }
            }
            self.maybe_checkpoint(progress);

            self.pause().await;
        }

        Ok(StopReason::Completed)
    }

    /// Retries the ids missing inside the stored id range
    async fn run_repair(
        &mut self,
        channel: &str,
        limit: usize,
        progress: &mut RunProgress,
    ) -> Result<StopReason> {
        let Some((min, max)) = self.storage.post_id_range(channel)? else {
            warn!("No posts stored for {} yet; run an update first", channel);
            return Ok(StopReason::NothingToRepair);
        };

        let missing = self.storage.missing_ids_in_range(channel, min, max, limit)?;
        if missing.is_empty() {
            info!("No missing ids in [{}..{}]", min, max);
            return Ok(StopReason::NothingToRepair);
        }

        info!(
            "Repairing {} missing ids in [{}..{}]",
            missing.len(),
            min,
            max
        );
        self.run_targeted(channel, &missing, progress).await
    }

    /// Fetches and ingests one id
    async fn fetch_one(
        &mut self,
        channel: &str,
        post_id: i64,
        progress: &mut RunProgress,
    ) -> Attempt {
        let url = self.endpoints.single_post(post_id);

        let body = match self.fetcher.fetch(url.as_str()).await {
            Ok(body) => body,
            Err(FetchError::Cancelled) => return Attempt::Cancelled,
            Err(FetchError::ClientError { status }) => {
                return Attempt::Missed(Miss::new(
                    MissingStatus::from_http_status(status),
                    format!("HTTP {}", status),
                ));
            }
            Err(e) => return Attempt::Missed(Miss::unexpected(e)),
        };

        let posts = match self.decoder.decode(&body, channel) {
            Ok(posts) => posts,
            Err(e) => return Attempt::Missed(Miss::unexpected(e)),
        };

        let Some(post) = posts.into_iter().find(|p| p.post_id == post_id) else {
            return Attempt::Missed(Miss::new(
                MissingStatus::NotFound,
                "no message markup for this id",
            ));
        };

        match self.ingest_post(&post, progress) {
            Ok(()) => Attempt::Stored,
            Err(e) => Attempt::Missed(Miss::unexpected(e)),
        }
    }

    /// Persists a post and, if it announces something, its events
    fn ingest_post(&mut self, post: &Post, progress: &mut RunProgress) -> Result<()> {
        if self.storage.insert_post_if_absent(post)? {
            progress.inserted_posts += 1;
            debug!("Inserted post {}", post.post_id);
        }

        if !self.deriver.is_eventish(post) {
            return Ok(());
        }

        for event in self.deriver.derive(post) {
            if self.storage.insert_event_if_absent(&event)? {
                progress.inserted_events += 1;
                debug!("Inserted event '{}' from post {}", event.title, post.post_id);
                if let Some(log) = self.event_log.as_mut() {
                    if let Err(e) = log.append(&event) {
                        warn!(
                            "Failed to append event from post {} to {}: {}",
                            post.post_id,
                            log.path().display(),
                            e
                        );
                    }
                }
            }
        }

        Ok(())
    }

    fn maybe_checkpoint(&mut self, progress: &RunProgress) {
        let every = u64::from(self.config.crawler.checkpoint_every);
        if every == 0 || progress.insertions() < self.next_checkpoint {
            return;
        }
        self.flush(progress);
        self.next_checkpoint = progress.insertions() + every;
    }

    /// Writes the event export and the checkpoint, if enabled
    ///
    /// Failures are logged and swallowed.
    fn flush(&self, progress: &RunProgress) {
        enter(Phase::Checkpointing);

        if let Some(path) = &self.config.output.export_path {
            match self.storage.export_events(&progress.channel, Path::new(path)) {
                Ok(count) => info!("Exported {} events -> {}", count, path),
                Err(e) => warn!("Failed to export events to {}: {}", path, e),
            }
        }

        if let Some(path) = &self.config.output.checkpoint_path {
            if let Err(e) = write_checkpoint(Path::new(path), progress) {
                warn!("Failed to write checkpoint {}: {}", path, e);
            }
        }
    }

    fn close_run(&mut self, run_id: i64, status: RunStatus) {
        if let Err(e) = self.storage.finish_run(run_id, status) {
            warn!("Failed to close run {}: {}", run_id, e);
        }
    }

    /// Fixed delay between requests, cut short by cancellation
    async fn pause(&self) {
        let delay = Duration::from_millis(self.config.crawler.sleep_ms);
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}

fn enter(phase: Phase) {
    debug!("Phase: {}", phase);
}
