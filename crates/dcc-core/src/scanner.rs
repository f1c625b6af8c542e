use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lists status file candidates one level deep, sorted by path.
///
/// Best effort: an unreadable directory or entry yields fewer candidates, never an error.
pub fn list_candidates(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(event = "dcc_scan_unreadable", path = %dir.display(), error = %err);
            return Vec::new();
        }
    };

    let mut out: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    out.sort();
    out
}
