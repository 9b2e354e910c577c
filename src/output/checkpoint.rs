//! Run checkpoint artifact
//!
//! The checkpoint is a diagnostic snapshot of the current run. It is never
//! read back: resumption always starts from what the store holds.

use chrono::Utc;
use serde::Serialize;
use std::io;
use std::path::Path;

#[derive(Serialize)]
struct CheckpointDocument<'a, T: Serialize> {
    #[serde(flatten)]
    progress: &'a T,
    updated_at: String,
}

/// Atomically writes `progress`, stamped with the current time, to `path`
pub fn write_checkpoint<T: Serialize>(path: &Path, progress: &T) -> io::Result<()> {
    let document = CheckpointDocument {
        progress,
        updated_at: Utc::now().to_rfc3339(),
    };
    super::write_json_atomic(path, &document)
}
