//! Shared timestamp helpers for deterministic database rows.
//!
//! Node rows are stamped with the source file's mtime rather than the wall
//! clock, so projecting a frozen filesystem snapshot always yields an
//! identical database.

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Returns unix-epoch seconds with `Z` suffix (e.g. `1771220592Z`).
pub fn now_epoch_z() -> String {
    use std::time::SystemTime;
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}

/// Returns a file's mtime as epoch seconds with `Z` suffix.
///
/// Falls back to `0Z` when the file's metadata is unreadable; callers treat
/// the stamp as opaque and never parse it back.
pub fn file_epoch_z(path: &Path) -> String {
    let secs = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{}Z", secs)
}
