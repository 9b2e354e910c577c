//! Event-Harvester: a resumable channel feed harvester
//!
//! This crate incrementally pages through a public channel feed, derives
//! event records from post text, and keeps posts, events and a missing-post
//! ledger in a SQLite store so repeated runs only ever make forward progress.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod model;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for Event-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Decode error: {0}")]
    Decode(#[from] crawler::DecodeError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid id list: {0}")]
    InvalidIds(String),
}

/// Result type alias for Event-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, Mode, RunOutcome, RunProgress, StopReason};
pub use model::{Event, Link, MissingStatus, Post};
