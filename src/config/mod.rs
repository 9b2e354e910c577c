//! Configuration module for Event-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so a run without a config file uses the built-in
//! settings; command-line flags are applied on top by the binary.
//!
//! # Example
//!
//! ```no_run
//! use event_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting channel: {}", config.channel.name);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ChannelConfig, Config, CrawlerConfig, FetcherConfig, HeuristicsConfig, OutputConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, parse_config, parse_ids_list};
pub use validation::validate;
