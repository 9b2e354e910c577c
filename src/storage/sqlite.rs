//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//! Each statement runs in autocommit mode, so every successful call is
//! committed before it returns and a crash never leaves half a row behind.

use crate::model::{Event, Link, MissingRecord, MissingStatus, Post};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Keeps `IN (...)` lists well below SQLite's bound-parameter limit
const ID_CHUNK_SIZE: usize = 500;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn format_timestamp(value: Option<DateTime<FixedOffset>>) -> Option<String> {
    value.map(|dt| dt.to_rfc3339())
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<FixedOffset>> {
    value.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        channel: row.get(1)?,
        mode: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Running),
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        channel: row.get(0)?,
        source_post_id: row.get(1)?,
        source_post_url: row.get(2)?,
        published_at: parse_timestamp(row.get(3)?),
        title: row.get(4)?,
        start_at: parse_timestamp(row.get(5)?),
        location: row.get(6)?,
        registration_url: row.get(7)?,
        raw_text: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, channel: &str, mode: &str, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (channel, mode, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                channel,
                mode,
                now_rfc3339(),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, channel, mode, started_at, finished_at, config_hash, status
                 FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self, channel: &str) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, channel, mode, started_at, finished_at, config_hash, status
                 FROM runs WHERE channel = ?1 ORDER BY id DESC LIMIT 1",
                params![channel],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now_rfc3339(), run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Posts =====

    fn insert_post_if_absent(&mut self, post: &Post) -> StorageResult<bool> {
        let links_json = post.links_json()?;
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO posts
             (channel, post_id, post_url, published_at, text, links_json, text_hash, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                post.channel,
                post.post_id,
                post.post_url,
                format_timestamp(post.published_at),
                post.text,
                links_json,
                post.text_hash(),
                now_rfc3339(),
            ],
        )?;
        Ok(inserted == 1)
    }

    fn get_post(&self, channel: &str, post_id: i64) -> StorageResult<Option<Post>> {
        let row = self
            .conn
            .query_row(
                "SELECT post_url, published_at, text, links_json
                 FROM posts WHERE channel = ?1 AND post_id = ?2",
                params![channel, post_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((post_url, published_at, text, links_json)) = row else {
            return Ok(None);
        };

        let links: Vec<Link> = match links_json {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };

        Ok(Some(Post {
            channel: channel.to_string(),
            post_id,
            post_url,
            published_at: parse_timestamp(published_at),
            text: text.unwrap_or_default(),
            links,
        }))
    }

    fn existing_post_ids(&self, channel: &str, ids: &[i64]) -> StorageResult<HashSet<i64>> {
        let mut existing = HashSet::new();

        for chunk in ids.chunks(ID_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let query = format!(
                "SELECT post_id FROM posts WHERE channel = ? AND post_id IN ({})",
                placeholders
            );

            let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(chunk.len() + 1);
            values.push(channel.to_string().into());
            values.extend(chunk.iter().map(|id| rusqlite::types::Value::from(*id)));

            let mut stmt = self.conn.prepare(&query)?;
            let rows = stmt.query_map(params_from_iter(values), |row| row.get::<_, i64>(0))?;
            for row in rows {
                existing.insert(row?);
            }
        }

        Ok(existing)
    }

    fn post_id_range(&self, channel: &str) -> StorageResult<Option<(i64, i64)>> {
        let (min, max): (Option<i64>, Option<i64>) = self.conn.query_row(
            "SELECT MIN(post_id), MAX(post_id) FROM posts WHERE channel = ?1",
            params![channel],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(min.zip(max))
    }

    fn count_posts(&self, channel: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE channel = ?1",
            params![channel],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Events =====

    fn insert_event_if_absent(&mut self, event: &Event) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO events (
                channel, event_key, source_post_id, source_post_url, published_at,
                title, start_at, location, registration_url, raw_text, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                event.channel,
                event.key(),
                event.source_post_id,
                event.source_post_url,
                format_timestamp(event.published_at),
                event.title,
                format_timestamp(event.start_at),
                event.location,
                event.registration_url,
                event.raw_text,
                now_rfc3339(),
            ],
        )?;
        Ok(inserted == 1)
    }

    fn events_for_channel(&self, channel: &str) -> StorageResult<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT channel, source_post_id, source_post_url, published_at, title,
                    start_at, location, registration_url, raw_text
             FROM events
             WHERE channel = ?1
             ORDER BY COALESCE(start_at, ''), COALESCE(published_at, ''), source_post_id, rowid",
        )?;

        let events = stmt
            .query_map(params![channel], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    fn count_events(&self, channel: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM events WHERE channel = ?1",
            params![channel],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Missing-Post Ledger =====

    fn record_missing(
        &mut self,
        channel: &str,
        post_id: i64,
        status: MissingStatus,
        note: &str,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO missing_posts (channel, post_id, status, tries, last_checked_at, note)
             VALUES (?1, ?2, ?3, 1, ?4, ?5)
             ON CONFLICT(channel, post_id) DO UPDATE SET
                status = excluded.status,
                tries = missing_posts.tries + 1,
                last_checked_at = excluded.last_checked_at,
                note = excluded.note",
            params![channel, post_id, status.to_db_string(), now_rfc3339(), note],
        )?;
        Ok(())
    }

    fn get_missing(&self, channel: &str, post_id: i64) -> StorageResult<Option<MissingRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT status, tries, last_checked_at, note
                 FROM missing_posts WHERE channel = ?1 AND post_id = ?2",
                params![channel, post_id],
                |row| {
                    Ok(MissingRecord {
                        channel: channel.to_string(),
                        post_id,
                        status: MissingStatus::from_db_string(&row.get::<_, String>(0)?)
                            .unwrap_or(MissingStatus::Error),
                        tries: row.get(1)?,
                        last_checked_at: row.get(2)?,
                        note: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn missing_ids_in_range(
        &self,
        channel: &str,
        start: i64,
        end: i64,
        limit: usize,
    ) -> StorageResult<Vec<i64>> {
        if start > end || limit == 0 {
            return Ok(Vec::new());
        }

        let mut known = HashSet::new();

        let mut stmt = self.conn.prepare(
            "SELECT post_id FROM posts WHERE channel = ?1 AND post_id BETWEEN ?2 AND ?3",
        )?;
        for row in stmt.query_map(params![channel, start, end], |row| row.get::<_, i64>(0))? {
            known.insert(row?);
        }

        let mut stmt = self.conn.prepare(
            "SELECT post_id, status FROM missing_posts
             WHERE channel = ?1 AND post_id BETWEEN ?2 AND ?3",
        )?;
        let rows = stmt.query_map(params![channel, start, end], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (post_id, status) = row?;
            if MissingStatus::from_db_string(&status).is_some_and(|s| s.is_permanent()) {
                known.insert(post_id);
            }
        }

        let missing = (start..=end)
            .filter(|id| !known.contains(id))
            .take(limit)
            .collect();

        Ok(missing)
    }

    fn count_missing_by_status(&self, channel: &str) -> StorageResult<HashMap<MissingStatus, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM missing_posts WHERE channel = ?1 GROUP BY status",
        )?;

        let mut summary = HashMap::new();
        let rows = stmt.query_map(params![channel], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status_str, count) = row?;
            if let Some(status) = MissingStatus::from_db_string(&status_str) {
                summary.insert(status, count as u64);
            }
        }

        Ok(summary)
    }
}
