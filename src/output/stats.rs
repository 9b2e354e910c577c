//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! store statistics for one channel.

use crate::model::MissingStatus;
use crate::storage::{RunRecord, Storage};
use crate::HarvestError;
use std::collections::HashMap;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    pub channel: String,

    /// Number of stored posts
    pub total_posts: u64,

    /// Number of stored events
    pub total_events: u64,

    /// Smallest and largest stored post id
    pub id_range: Option<(i64, i64)>,

    /// Ids in the stored range that are neither stored nor known missing
    pub open_gaps: usize,

    /// Missing-ledger entries by status
    pub missing_by_status: HashMap<MissingStatus, u64>,

    /// Most recent run recorded in the store
    pub latest_run: Option<RunRecord>,
}

/// Upper bound on gaps counted for the report
const GAP_SCAN_LIMIT: usize = 100_000;

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `channel` - The channel to report on
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    channel: &str,
) -> Result<HarvestStatistics, HarvestError> {
    let id_range = storage.post_id_range(channel)?;
    let open_gaps = match id_range {
        Some((min, max)) => storage
            .missing_ids_in_range(channel, min, max, GAP_SCAN_LIMIT)?
            .len(),
        None => 0,
    };

    Ok(HarvestStatistics {
        channel: channel.to_string(),
        total_posts: storage.count_posts(channel)?,
        total_events: storage.count_events(channel)?,
        id_range,
        open_gaps,
        missing_by_status: storage.count_missing_by_status(channel)?,
        latest_run: storage.get_latest_run(channel)?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics: {} ===\n", stats.channel);

    println!("Overview:");
    println!("  Posts stored: {}", stats.total_posts);
    println!("  Events stored: {}", stats.total_events);
    match stats.id_range {
        Some((min, max)) => {
            println!("  Post id range: {}..{}", min, max);
            let span = (max - min + 1) as f64;
            let coverage = (stats.total_posts as f64 / span) * 100.0;
            println!("  Coverage of range: {:.1}%", coverage);
        }
        None => println!("  Post id range: (empty)"),
    }
    println!("  Open gaps: {}", stats.open_gaps);
    println!();

    if !stats.missing_by_status.is_empty() {
        println!("Missing Ledger:");
        for status in MissingStatus::all() {
            if let Some(count) = stats.missing_by_status.get(&status) {
                println!("  {}: {}", status, count);
            }
        }
        println!();
    }

    if let Some(run) = &stats.latest_run {
        println!("Latest Run:");
        println!("  #{} {} ({})", run.id, run.mode, run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
    }
}
