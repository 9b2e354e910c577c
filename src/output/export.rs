//! Full event export artifact

use crate::model::Event;
use chrono::Utc;
use serde::Serialize;
use std::io;
use std::path::Path;

/// The export document: every stored event of one channel
#[derive(Debug, Serialize)]
pub struct EventExport<'a> {
    pub channel: &'a str,
    pub events_count: usize,
    pub generated_at: String,
    pub events: &'a [Event],
}

/// Atomically writes the export document for `events` to `path`
pub fn write_event_export(path: &Path, channel: &str, events: &[Event]) -> io::Result<()> {
    let export = EventExport {
        channel,
        events_count: events.len(),
        generated_at: Utc::now().to_rfc3339(),
        events,
    };
    super::write_json_atomic(path, &export)?;
    tracing::debug!("Exported {} events to {}", events.len(), path.display());
    Ok(())
}
