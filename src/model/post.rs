//! Feed post records
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// An outbound link found in a post body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Link target
    pub href: String,

    /// Anchor text (falls back to the href when the anchor is empty)
    pub text: String,
}

impl Link {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
        }
    }

    /// Returns true if the link points back into Telegram itself
    pub fn is_internal(&self) -> bool {
        self.href.contains("t.me/") || self.href.starts_with("tg://")
    }
}

/// One item of a channel feed
///
/// `(channel, post_id)` is the primary key. Ids are assigned upstream and
/// grow monotonically within a channel; posts are never modified once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub channel: String,
    pub post_id: i64,
    pub post_url: String,
    pub published_at: Option<DateTime<FixedOffset>>,
    /// Normalized body text
    pub text: String,
    /// Outbound links, de-duplicated by href, in document order
    pub links: Vec<Link>,
}

impl Post {
    /// Hex SHA-256 of the post text
    pub fn text_hash(&self) -> String {
        super::sha256_hex(&self.text)
    }

    /// Serializes the links as `[{"href": .., "text": ..}]`
    pub fn links_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.links)
    }

    /// Removes repeated hrefs, keeping the first occurrence of each
    pub fn dedup_links(links: Vec<Link>) -> Vec<Link> {
        let mut seen = std::collections::HashSet::new();
        links
            .into_iter()
            .filter(|link| seen.insert(link.href.clone()))
            .collect()
    }
}
