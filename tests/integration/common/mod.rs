//! Shared fixtures for the integration tests
#![allow(dead_code)]

use event_harvester::config::Config;
use event_harvester::Post;
use std::path::Path;
use wiremock::{Request, Respond, ResponseTemplate};

pub const CHANNEL: &str = "bcmsu";

/// Text of a synthetic post; every tenth one announces a lecture
pub fn post_text(id: i64) -> String {
    if id % 10 == 0 {
        format!("Лекция номер {}\nМесто: ауд. {}", id, id)
    } else {
        format!("Пост номер {}", id)
    }
}

pub fn message_html(channel: &str, id: i64) -> String {
    format!(
        r#"<div class="tgme_widget_message_wrap js-widget_message_wrap">
  <div class="tgme_widget_message text_not_supported_wrap js-widget_message" data-post="{channel}/{id}">
    <div class="tgme_widget_message_bubble">
      <div class="tgme_widget_message_text js-message_text" dir="auto">{text}</div>
      <div class="tgme_widget_message_footer compact js-message_footer">
        <a class="tgme_widget_message_date" href="https://t.me/{channel}/{id}"><time datetime="2025-11-20T10:00:00+00:00" class="time">10:00</time></a>
      </div>
    </div>
  </div>
</div>"#,
        channel = channel,
        id = id,
        text = post_text(id).replace('\n', "<br/>")
    )
}

pub fn page_html(channel: &str, ids: &[i64]) -> String {
    let messages: Vec<String> = ids.iter().map(|id| message_html(channel, *id)).collect();
    format!(
        "<!DOCTYPE html><html><body><main><section class=\"tgme_channel_history js-message_history\">{}</section></main></body></html>",
        messages.join("\n")
    )
}

/// Serves a feed of posts `newest..=1`, `page_size` per page, honoring `before`
pub struct FeedResponder {
    pub newest: i64,
    pub page_size: usize,
}

impl Respond for FeedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let before = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "before")
            .and_then(|(_, value)| value.parse::<i64>().ok());
        let top = before.map(|b| b - 1).unwrap_or(self.newest).min(self.newest);
        let ids: Vec<i64> = (1..=top).rev().take(self.page_size).collect();
        ResponseTemplate::new(200).set_body_string(page_html(CHANNEL, &ids))
    }
}

/// A config pointed at a mock server, with tiny delays and files under `dir`
pub fn test_config(base_url: &str, dir: &Path) -> Config {
    let mut config = Config::default();
    config.channel.name = CHANNEL.to_string();
    config.channel.base_url = base_url.to_string();

    config.crawler.max_pages = 100;
    config.crawler.max_posts = 10_000;
    config.crawler.sleep_ms = 0;

    config.fetcher.max_tries = 3;
    config.fetcher.base_sleep_ms = 1;
    config.fetcher.max_sleep_ms = 5;
    config.fetcher.timeout_secs = 5;

    let path = |name: &str| dir.join(name).to_string_lossy().into_owned();
    config.output.database_path = path("harvest.sqlite");
    config.output.export_path = Some(path("events.json"));
    config.output.checkpoint_path = Some(path("checkpoint.json"));
    config.output.events_jsonl_path = None;

    config
}

pub fn stored_post(id: i64) -> Post {
    Post {
        channel: CHANNEL.to_string(),
        post_id: id,
        post_url: format!("https://t.me/{}/{}", CHANNEL, id),
        published_at: None,
        text: post_text(id),
        links: vec![],
    }
}

pub fn read_json(path: &str) -> serde_json::Value {
    let content = std::fs::read_to_string(path).expect("artifact exists");
    serde_json::from_str(&content).expect("artifact is valid JSON")
}
