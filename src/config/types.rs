use serde::{Deserialize, Serialize};

/// Main configuration structure for Event-Harvester
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channel: ChannelConfig,
    pub crawler: CrawlerConfig,
    pub fetcher: FetcherConfig,
    pub output: OutputConfig,
    pub heuristics: HeuristicsConfig,
}

/// Which feed to harvest and where it lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChannelConfig {
    /// Channel username, without the leading `@`
    pub name: String,

    /// Origin serving the feed and single-post pages
    pub base_url: String,
}

impl ChannelConfig {
    /// Channel name with any leading `@` removed
    pub fn username(&self) -> &str {
        self.name.trim_start_matches('@')
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "bcmsu".to_string(),
            base_url: "https://t.me".to_string(),
        }
    }
}

/// Pagination and run-limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum feed pages fetched per update run
    pub max_pages: u32,

    /// Maximum posts examined per update run
    pub max_posts: u32,

    /// Stop an update run after this many consecutive already-stored posts
    pub stop_after_known: u32,

    /// Fixed delay between requests (milliseconds)
    pub sleep_ms: u64,

    /// Flush export and checkpoint every N insertions (posts + events); 0 disables
    pub checkpoint_every: u32,

    /// Maximum ids fetched by one repair run
    pub repair_limit: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 12,
            max_posts: 250,
            stop_after_known: 25,
            sleep_ms: 1400,
            checkpoint_every: 40,
            repair_limit: 120,
        }
    }
}

/// HTTP client and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// Attempts per request before giving up
    pub max_tries: u32,

    /// First backoff delay (milliseconds)
    pub base_sleep_ms: u64,

    /// Upper bound for any single backoff delay (milliseconds)
    pub max_sleep_ms: u64,

    /// Whole-request timeout (seconds)
    pub timeout_secs: u64,

    pub user_agent: String,

    pub accept_language: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_tries: 6,
            base_sleep_ms: 1000,
            max_sleep_ms: 60_000,
            timeout_secs: 30,
            user_agent: format!(
                "Mozilla/5.0 (compatible; event-harvester/{}; +https://t.me)",
                env!("CARGO_PKG_VERSION")
            ),
            accept_language: "ru,en;q=0.8".to_string(),
        }
    }
}

/// Output locations
///
/// Each artifact other than the database is optional; `None` disables it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Full event export, rewritten atomically
    pub export_path: Option<String>,

    /// Run progress snapshot, rewritten atomically
    pub checkpoint_path: Option<String>,

    /// Append-only JSONL of newly inserted events
    pub events_jsonl_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "tg_events.sqlite".to_string(),
            export_path: Some("events.json".to_string()),
            checkpoint_path: Some("checkpoint.json".to_string()),
            events_jsonl_path: None,
        }
    }
}

/// Text heuristics used to recognise and split event announcements
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HeuristicsConfig {
    /// Hashtags marking a post as an announcement
    pub hint_hashtags: Vec<String>,

    /// Words (or word stems) marking a post as an announcement
    pub hint_words: Vec<String>,

    /// Phrase a digest post must contain; empty disables the check
    pub digest_phrase: String,

    /// Hashtag a digest post must contain; empty disables the check
    pub digest_hashtag: String,

    /// Minimum number of links for a post to count as a digest
    pub digest_min_links: usize,

    /// Title used when a post has no usable first line
    pub default_title: String,

    /// Title used for digest entries whose anchor text is just a URL
    pub digest_title: String,
}

impl Default for HeuristicsConfig {
    fn default() -> Self {
        Self {
            hint_hashtags: vec![
                "#анонс".to_string(),
                "#ивенты".to_string(),
                "#дайджест".to_string(),
            ],
            hint_words: [
                "регистрация",
                "дата",
                "время",
                "место",
                "встреча",
                "лекция",
                "мастер-класс",
                "воркшоп",
                "open talk",
                "ивент",
                "событ",
            ]
            .iter()
            .map(|w| w.to_string())
            .collect(),
            digest_phrase: "регистрация на события".to_string(),
            digest_hashtag: "#дайджест".to_string(),
            digest_min_links: 2,
            default_title: "Событие".to_string(),
            digest_title: "Событие из дайджеста".to_string(),
        }
    }
}
