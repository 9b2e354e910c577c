//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{Event, MissingRecord, MissingStatus, Post};
use crate::storage::{RunRecord, RunStatus};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every mutating operation is idempotent and durable once it returns:
/// re-inserting a stored post or event is a no-op that reports `false`.
/// Callers never need to coordinate writes; the harvester issues them from
/// a single task.
pub trait Storage {
    // ===== Run Management =====

    /// Opens a run record in the `running` state and returns its id
    fn create_run(&mut self, channel: &str, mode: &str, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run for a channel
    fn get_latest_run(&self, channel: &str) -> StorageResult<Option<RunRecord>>;

    /// Closes a run with its terminal status and a finish timestamp
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Posts =====

    /// Inserts a post unless `(channel, post_id)` is already stored
    ///
    /// # Returns
    ///
    /// `true` if the post was inserted, `false` if it already existed
    fn insert_post_if_absent(&mut self, post: &Post) -> StorageResult<bool>;

    /// Gets a stored post
    fn get_post(&self, channel: &str, post_id: i64) -> StorageResult<Option<Post>>;

    /// Returns the subset of `ids` already stored for the channel
    fn existing_post_ids(&self, channel: &str, ids: &[i64]) -> StorageResult<HashSet<i64>>;

    /// Smallest and largest stored post id, or `None` if the channel is empty
    fn post_id_range(&self, channel: &str) -> StorageResult<Option<(i64, i64)>>;

    /// Counts stored posts for the channel
    fn count_posts(&self, channel: &str) -> StorageResult<u64>;

    // ===== Events =====

    /// Inserts an event unless its key is already stored
    ///
    /// # Returns
    ///
    /// `true` if the event was inserted, `false` if it already existed
    fn insert_event_if_absent(&mut self, event: &Event) -> StorageResult<bool>;

    /// Loads all events for a channel in export order
    ///
    /// Ordered by start time, then publish time, then source post id;
    /// events without a timestamp sort first.
    fn events_for_channel(&self, channel: &str) -> StorageResult<Vec<Event>>;

    /// Counts stored events for the channel
    fn count_events(&self, channel: &str) -> StorageResult<u64>;

    /// Writes every event of the channel to the export artifact at `path`
    ///
    /// The file is replaced atomically; a failed export leaves the previous
    /// file untouched.
    ///
    /// # Returns
    ///
    /// The number of exported events
    fn export_events(&self, channel: &str, path: &Path) -> StorageResult<usize> {
        let events = self.events_for_channel(channel)?;
        crate::output::write_event_export(path, channel, &events)?;
        Ok(events.len())
    }

    // ===== Missing-Post Ledger =====

    /// Records an id that could not be ingested
    ///
    /// The first record starts with `tries = 1`; later records for the same
    /// id increment `tries` and overwrite status, note and check time.
    fn record_missing(
        &mut self,
        channel: &str,
        post_id: i64,
        status: MissingStatus,
        note: &str,
    ) -> StorageResult<()>;

    /// Gets the ledger entry for an id
    fn get_missing(&self, channel: &str, post_id: i64) -> StorageResult<Option<MissingRecord>>;

    /// Ids in `[start, end]` that are neither stored nor known `not_found`
    ///
    /// Returned in ascending order, at most `limit` of them.
    fn missing_ids_in_range(
        &self,
        channel: &str,
        start: i64,
        end: i64,
        limit: usize,
    ) -> StorageResult<Vec<i64>>;

    /// Counts ledger entries by status
    fn count_missing_by_status(&self, channel: &str) -> StorageResult<HashMap<MissingStatus, u64>>;
}
