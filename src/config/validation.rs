use crate::config::types::{ChannelConfig, Config, CrawlerConfig, FetcherConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_channel_config(&config.channel)?;
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the channel name and feed origin
fn validate_channel_config(config: &ChannelConfig) -> Result<(), ConfigError> {
    let name = config.username();
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "channel name cannot be empty".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Validation(format!(
            "channel name must contain only letters, digits and underscores, got '{}'",
            config.name
        )));
    }

    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    Ok(())
}

/// Validates run limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.stop_after_known < 1 {
        return Err(ConfigError::Validation(format!(
            "stop-after-known must be >= 1, got {}",
            config.stop_after_known
        )));
    }

    Ok(())
}

/// Validates retry settings
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.max_tries < 1 {
        return Err(ConfigError::Validation(format!(
            "max-tries must be >= 1, got {}",
            config.max_tries
        )));
    }

    if config.base_sleep_ms > config.max_sleep_ms {
        return Err(ConfigError::Validation(format!(
            "base-sleep-ms ({}) cannot exceed max-sleep-ms ({})",
            config.base_sleep_ms, config.max_sleep_ms
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    for (key, path) in [
        ("export-path", &config.export_path),
        ("checkpoint-path", &config.checkpoint_path),
        ("events-jsonl-path", &config.events_jsonl_path),
    ] {
        if matches!(path.as_deref(), Some("")) {
            return Err(ConfigError::Validation(format!(
                "{} cannot be empty; omit it to disable the artifact",
                key
            )));
        }
    }

    Ok(())
}
