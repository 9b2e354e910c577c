//! Crawler module for feed fetching and run orchestration
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching with retry and backoff
//! - Decoding feed pages into posts
//! - Run modes, progress tracking and the coordinator that drives them

mod coordinator;
mod fetcher;
mod parser;
mod progress;

pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, FetchError, Fetcher, RetryPolicy, JITTER_MAX, JITTER_MIN};
pub use parser::{clean_text, DecodeError, PageDecoder, TelegramPageDecoder};
pub use progress::{Mode, Phase, RunOutcome, RunProgress, StopReason};
