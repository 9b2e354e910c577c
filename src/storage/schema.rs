//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Event-Harvester database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel TEXT NOT NULL,
    mode TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Feed posts, insert-once
CREATE TABLE IF NOT EXISTS posts (
    channel TEXT NOT NULL,
    post_id INTEGER NOT NULL,
    post_url TEXT NOT NULL,
    published_at TEXT,
    text TEXT,
    links_json TEXT,
    text_hash TEXT,
    scraped_at TEXT,
    PRIMARY KEY (channel, post_id)
);

-- Events derived from posts, keyed by their stable hash
CREATE TABLE IF NOT EXISTS events (
    channel TEXT NOT NULL,
    event_key TEXT PRIMARY KEY,
    source_post_id INTEGER NOT NULL,
    source_post_url TEXT NOT NULL,
    published_at TEXT,
    title TEXT NOT NULL,
    start_at TEXT,
    location TEXT,
    registration_url TEXT,
    raw_text TEXT,
    created_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_channel_post ON events(channel, source_post_id);

-- Ids that were targeted but could not be ingested
CREATE TABLE IF NOT EXISTS missing_posts (
    channel TEXT NOT NULL,
    post_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    tries INTEGER NOT NULL DEFAULT 0,
    last_checked_at TEXT,
    note TEXT,
    PRIMARY KEY (channel, post_id)
);

CREATE INDEX IF NOT EXISTS idx_missing_status ON missing_posts(channel, status);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
