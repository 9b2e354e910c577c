//! Record types for harvested data
//!
//! # Components
//!
//! - `Post`: One feed item, keyed by `(channel, post_id)`
//! - `Event`: A record derived from a post, keyed by its stable event key
//! - `MissingStatus` / `MissingRecord`: Ledger entries for ids that could not be ingested

mod event;
mod missing;
mod post;

// Re-export main types
pub use event::Event;
pub use missing::{MissingRecord, MissingStatus};
pub use post::{Link, Post};

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a string
pub(crate) fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
