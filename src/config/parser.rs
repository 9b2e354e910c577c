use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
///
/// Missing sections and keys fall back to their defaults.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the effective configuration
///
/// The configuration is serialized back to TOML first, so overrides applied
/// after loading are part of the hash. Stored on each run record to tell
/// runs with different settings apart.
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let content = toml::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Parses a comma-separated list of post ids
///
/// Blank entries are skipped; duplicates are dropped keeping the first
/// occurrence, so the fetch order matches the order given.
pub fn parse_ids_list(input: &str) -> Result<Vec<i64>, ConfigError> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id: i64 = part
            .parse()
            .map_err(|_| ConfigError::InvalidIds(format!("'{}' is not a post id", part)))?;
        if seen.insert(id) {
            ids.push(id);
        }
    }

    Ok(ids)
}
