//! Atomic file replacement
//!
//! Readers of an artifact written here see either the previous complete
//! file or the new complete file, never a partial one.

use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Path of the temporary sibling used while writing `path`
fn temp_path(path: &Path) -> PathBuf {
    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Serializes `value` as pretty JSON and atomically replaces `path` with it
///
/// The document is streamed into `<path>.tmp`, flushed and fsynced, then
/// renamed over `path`. If anything fails the temporary file is removed and
/// the existing file at `path` is left as it was.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let result = write_and_sync(&tmp, value).and_then(|()| fs::rename(&tmp, path));

    if result.is_err() {
        // Only remove what we created; a pre-existing directory at the temp path is not ours.
        if tmp.is_file() {
            let _ = fs::remove_file(&tmp);
        }
    }

    result
}

fn write_and_sync<T: Serialize + ?Sized>(tmp: &Path, value: &T) -> io::Result<()> {
    let file = File::create(tmp)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}
