//! Turn a local directory tree into the flat item list the browser consumes

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::browser::types::Item;
use crate::keys::SEPARATOR;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub total_size: u64,
    pub total_files: u64,
    pub total_dirs: u64,
    /// Entries that could not be read and were left out
    pub skipped: u64,
}

fn modified_at(metadata: &Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().and_then(|t| {
        DateTime::from_timestamp(
            t.duration_since(std::time::UNIX_EPOCH).ok()?.as_secs() as i64,
            0,
        )
    })
}

/// Key of `path` relative to `root`: `/`-joined components, folders with a
/// trailing separator
fn key_for(root: &Path, path: &Path, is_dir: bool) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut key = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if key.is_empty() {
        return None;
    }
    if is_dir {
        key.push(SEPARATOR);
    }
    Some(key)
}

/// Walk `root` and return one item per file and folder below it.
///
/// Unreadable entries are skipped. Symlinks are not followed.
pub fn scan_directory<P: AsRef<Path>>(root: P) -> Result<(Vec<Item>, ScanStats)> {
    let root = root.as_ref();
    let metadata = std::fs::metadata(root)
        .with_context(|| format!("Failed to read {}", root.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }

    let mut items = Vec::new();
    let mut stats = ScanStats::default();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry: {e}");
                stats.skipped += 1;
                continue;
            }
        };
        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %entry.path().display(), "skipping entry without metadata: {e}");
                stats.skipped += 1;
                continue;
            }
        };

        let is_dir = metadata.is_dir();
        let Some(key) = key_for(root, entry.path(), is_dir) else {
            continue;
        };

        let size = if is_dir { 0 } else { metadata.len() };
        if is_dir {
            stats.total_dirs += 1;
        } else {
            stats.total_files += 1;
            stats.total_size += size;
        }

        items.push(Item::new(key, size, modified_at(&metadata)));
    }

    debug!(
        root = %root.display(),
        files = stats.total_files,
        dirs = stats.total_dirs,
        "scanned directory"
    );
    Ok((items, stats))
}
