use super::dates::parse_start_datetime;
use super::EventDeriver;
use crate::config::HeuristicsConfig;
use crate::model::{Event, Post};
use regex::Regex;
use std::sync::LazyLock;

/// Longest title kept, in characters
const MAX_TITLE_CHARS: usize = 200;

static RE_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bместо\b\s*[:\-]\s*(.+)$").unwrap());

/// Keyword-driven event deriver for Russian-language channels
#[derive(Debug, Clone)]
pub struct HeuristicDeriver {
    config: HeuristicsConfig,
    hint_hashtags: Vec<String>,
    hint_words: Vec<String>,
}

impl HeuristicDeriver {
    pub fn new(config: HeuristicsConfig) -> Self {
        let lower = |items: &[String]| {
            items
                .iter()
                .map(|item| item.trim().to_lowercase())
                .filter(|item| !item.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            hint_hashtags: lower(&config.hint_hashtags),
            hint_words: lower(&config.hint_words),
            config,
        }
    }

    /// A digest lists several events, one registration link each
    pub fn is_digest(&self, post: &Post) -> bool {
        let low = post.text.to_lowercase();
        let phrase = self.config.digest_phrase.to_lowercase();
        let hashtag = self.config.digest_hashtag.to_lowercase();

        post.links.len() >= self.config.digest_min_links
            && (phrase.is_empty() || low.contains(&phrase))
            && (hashtag.is_empty() || low.contains(&hashtag))
    }

    fn derive_digest(&self, post: &Post) -> Vec<Event> {
        post.links
            .iter()
            .filter(|link| !link.is_internal())
            .map(|link| {
                let anchor = link.text.trim();
                let title = if anchor.is_empty()
                    || anchor == link.href
                    || anchor.to_lowercase().starts_with("http")
                {
                    self.config.digest_title.clone()
                } else {
                    truncate_chars(anchor, MAX_TITLE_CHARS)
                };
                self.event(post, title, None, None, Some(link.href.clone()))
            })
            .collect()
    }

    fn derive_single(&self, post: &Post) -> Event {
        let title = post
            .text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| truncate_chars(line, MAX_TITLE_CHARS))
            .unwrap_or_else(|| self.config.default_title.clone());

        let location = post.text.lines().find_map(|line| {
            RE_LOCATION
                .captures(line.trim())
                .map(|caps| caps[1].trim().to_string())
                .filter(|value| !value.is_empty())
        });

        let registration_url = post
            .links
            .iter()
            .find(|link| !link.is_internal())
            .or_else(|| post.links.first())
            .map(|link| link.href.clone());

        let start_at = parse_start_datetime(&post.text, post.published_at);

        self.event(post, title, start_at, location, registration_url)
    }

    fn event(
        &self,
        post: &Post,
        title: String,
        start_at: Option<chrono::DateTime<chrono::FixedOffset>>,
        location: Option<String>,
        registration_url: Option<String>,
    ) -> Event {
        Event {
            channel: post.channel.clone(),
            source_post_id: post.post_id,
            source_post_url: post.post_url.clone(),
            published_at: post.published_at,
            title,
            start_at,
            location,
            registration_url,
            raw_text: post.text.clone(),
        }
    }
}

impl EventDeriver for HeuristicDeriver {
    fn is_eventish(&self, post: &Post) -> bool {
        let low = post.text.to_lowercase();
        self.hint_hashtags.iter().any(|tag| low.contains(tag))
            || self.hint_words.iter().any(|word| low.contains(word))
    }

    fn derive(&self, post: &Post) -> Vec<Event> {
        if self.is_digest(post) {
            self.derive_digest(post)
        } else {
            vec![self.derive_single(post)]
        }
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
