//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building the HTTP client with the configured User-Agent and language
//! - Classifying responses into success, retryable and permanent failures
//! - Exponential backoff with jitter, honoring `Retry-After` on 429
//!
//! The fetcher is stateless between calls; every `fetch` starts a fresh
//! retry budget.

use crate::config::FetcherConfig;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lower bound of the multiplicative jitter applied to every sleep
pub const JITTER_MIN: f64 = 0.85;
/// Upper bound of the multiplicative jitter applied to every sleep
pub const JITTER_MAX: f64 = 1.25;

/// Failure of a single fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP 429; `retry_after` is the numeric `Retry-After` header, if any
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// HTTP 5xx
    #[error("server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Timeout, connection failure or interrupted body
    #[error("network error: {message}")]
    NetworkError { message: String },

    /// Any other non-success status; never retried
    #[error("client error: HTTP {status}")]
    ClientError { status: u16 },

    /// Retry budget used up; carries the last retryable failure
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },

    /// The run was cancelled while waiting to retry
    #[error("cancelled while waiting to retry")]
    Cancelled,
}

impl FetchError {
    /// Returns true if the request may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. }
                | FetchError::ServerError { .. }
                | FetchError::NetworkError { .. }
        )
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Backoff schedule for retryable failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub base_sleep: Duration,
    pub max_sleep: Duration,
}

impl RetryPolicy {
    /// Delay before the next attempt, before jitter
    ///
    /// `attempt` is the 1-based number of the attempt that just failed. A
    /// numeric `Retry-After` is clamped to `[base_sleep, max_sleep]`;
    /// otherwise the delay is `base_sleep * 2^(attempt - 1)` capped at
    /// `max_sleep`.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        if let Some(seconds) = retry_after {
            return Duration::from_secs(seconds)
                .max(self.base_sleep)
                .min(self.max_sleep);
        }

        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_sleep.saturating_mul(factor).min(self.max_sleep)
    }

    /// Applies a random factor in `[JITTER_MIN, JITTER_MAX]`
    pub fn jittered(delay: Duration) -> Duration {
        let factor = rand::thread_rng().gen_range(JITTER_MIN..=JITTER_MAX);
        delay.mul_f64(factor)
    }
}

impl From<&FetcherConfig> for RetryPolicy {
    fn from(config: &FetcherConfig) -> Self {
        Self {
            max_tries: config.max_tries.max(1),
            base_sleep: Duration::from_millis(config.base_sleep_ms),
            max_sleep: Duration::from_millis(config.max_sleep_ms),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&config.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, value);
    }

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Resilient page fetcher
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Fetcher {
    /// Creates a fetcher with a client built from `config`
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(build_http_client(config)?, RetryPolicy::from(config)))
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Abandons backoff sleeps once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches a URL and returns its body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Return body |
    /// | HTTP 429 | Retry after `Retry-After` (clamped) or backoff |
    /// | HTTP 5xx | Retry with backoff |
    /// | Timeout / connect / body read | Retry with backoff |
    /// | Any other status | Return `ClientError` immediately |
    ///
    /// After `max_tries` failed attempts the last failure is returned
    /// wrapped in `Exhausted`. Cancellation during a backoff sleep returns
    /// `Cancelled` without another attempt.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let failure = match self.attempt(url).await {
                Ok(body) => return Ok(body),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if attempt >= self.policy.max_tries {
                return Err(FetchError::Exhausted {
                    attempts: attempt,
                    last: Box::new(failure),
                });
            }

            let delay =
                RetryPolicy::jittered(self.policy.delay_for(attempt, failure.retry_after()));
            warn!(
                "{} (attempt {}/{}), sleeping {:.2}s before retrying {}",
                failure,
                attempt,
                self.policy.max_tries,
                delay.as_secs_f64(),
                url
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => return Err(FetchError::Cancelled),
            }
        }
    }

    async fn attempt(&self, url: &str) -> Result<String, FetchError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(FetchError::RateLimited { retry_after });
        }

        if status.is_server_error() {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            return Err(FetchError::ClientError {
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::NetworkError {
            message: e.to_string(),
        })
    }
}
