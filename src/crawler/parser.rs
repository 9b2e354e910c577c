//! HTML decoder for channel feed pages
//!
//! This module turns a public channel's web preview into [`Post`] records:
//! - One post per `div.tgme_widget_message[data-post="channel/123"]`
//! - Publish time from the message date link's `<time datetime>`
//! - Body text from `div.tgme_widget_message_text`, normalised
//! - Outbound links from the body, de-duplicated by href
//!
//! The same markup is served for feed pages and for single embedded posts.

use crate::model::{Link, Post};
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;
use thiserror::Error;

static RE_HSPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static RE_BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Page decoding failure
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid selector {selector}: {message}")]
    Selector { selector: String, message: String },
}

/// Extracts posts from a fetched page
pub trait PageDecoder: Send + Sync {
    /// Returns the posts on the page, sorted by id descending
    ///
    /// Items without a parsable `channel/id` marker are skipped. An empty
    /// vector means the page holds no posts.
    fn decode(&self, html: &str, channel: &str) -> Result<Vec<Post>, DecodeError>;
}

/// Decoder for the `t.me/s/<channel>` web preview markup
#[derive(Debug, Clone)]
pub struct TelegramPageDecoder {
    base_url: String,
}

impl TelegramPageDecoder {
    /// `base_url` prefixes the `channel/id` marker to form each post URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for TelegramPageDecoder {
    fn default() -> Self {
        Self::new("https://t.me")
    }
}

fn selector(css: &str) -> Result<Selector, DecodeError> {
    Selector::parse(css).map_err(|e| DecodeError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

impl PageDecoder for TelegramPageDecoder {
    fn decode(&self, html: &str, channel: &str) -> Result<Vec<Post>, DecodeError> {
        let message_selector = selector("div.tgme_widget_message")?;
        let time_selector = selector("a.tgme_widget_message_date time")?;
        let text_selector = selector("div.tgme_widget_message_text")?;
        let link_selector = selector("a[href]")?;

        let document = Html::parse_document(html);
        let mut posts = Vec::new();

        for message in document.select(&message_selector) {
            let Some(data_post) = message.value().attr("data-post") else {
                continue;
            };
            let Some(post_id) = parse_post_marker(data_post) else {
                continue;
            };

            let published_at = message
                .select(&time_selector)
                .next()
                .and_then(|time| time.value().attr("datetime"))
                .and_then(parse_timestamp);

            let body = message.select(&text_selector).next();
            let text = body.map(render_text).map(|t| clean_text(&t)).unwrap_or_default();

            let links = body
                .map(|body| {
                    body.select(&link_selector)
                        .filter_map(|anchor| {
                            let href = anchor.value().attr("href")?.trim();
                            if href.is_empty() {
                                return None;
                            }
                            let text = clean_text(&anchor.text().collect::<Vec<_>>().join(" "));
                            let text = if text.is_empty() { href.to_string() } else { text };
                            Some(Link::new(href, text))
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            posts.push(Post {
                channel: channel.to_string(),
                post_id,
                post_url: format!("{}/{}", self.base_url, data_post),
                published_at,
                text,
                links: Post::dedup_links(links),
            });
        }

        posts.sort_by(|a, b| b.post_id.cmp(&a.post_id));
        Ok(posts)
    }
}

/// Parses the numeric id out of a `channel/123` marker
fn parse_post_marker(marker: &str) -> Option<i64> {
    let (_, id) = marker.split_once('/')?;
    id.trim().parse().ok()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw.trim()).ok()
}

/// Concatenates the text nodes under `element`, turning `<br>` into newlines
fn render_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out
}

/// Normalises whitespace in post text
///
/// Non-breaking spaces become spaces, runs of spaces and tabs collapse to
/// one, three or more newlines collapse to two, and the ends are trimmed.
pub fn clean_text(raw: &str) -> String {
    let text = raw.replace('\u{a0}', " ");
    let text = RE_HSPACE.replace_all(&text, " ");
    let text = RE_BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}
