//! Output module for run artifacts and reports
//!
//! This module handles:
//! - Atomic JSON writes (temp file, fsync, rename)
//! - The full event export and the run checkpoint
//! - The append-only JSONL event log
//! - Store statistics for the `--stats` report

mod atomic;
mod checkpoint;
mod export;
mod jsonl;
pub mod stats;

pub use atomic::write_json_atomic;
pub use checkpoint::write_checkpoint;
pub use export::{write_event_export, EventExport};
pub use jsonl::EventLog;
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
