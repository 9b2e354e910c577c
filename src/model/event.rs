//! Derived event records
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// An event derived from a post
///
/// Events are identified by [`Event::key`], a hash over the fields that make
/// two derivations of the same announcement equal. Re-deriving a post never
/// produces a second row for the same event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub channel: String,
    pub source_post_id: i64,
    pub source_post_url: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    pub title: String,
    pub start_at: Option<DateTime<FixedOffset>>,
    pub location: Option<String>,
    pub registration_url: Option<String>,
    pub raw_text: String,
}

impl Event {
    /// Stable dedup key: hex SHA-256 of
    /// `channel|source_post_id|title|start_at|registration_url`
    pub fn key(&self) -> String {
        let start_at = self
            .start_at
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        let base = format!(
            "{}|{}|{}|{}|{}",
            self.channel,
            self.source_post_id,
            self.title.trim(),
            start_at,
            self.registration_url.as_deref().unwrap_or("")
        );
        super::sha256_hex(&base)
    }
}
