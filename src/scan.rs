//! Disk scanning.
//!
//! Walks the input folder and returns every media file with its modification
//! time and size, keyed by its `/`-separated path relative to the root. This
//! is the "disk" side of the delta computed by the index.
//!
//! Hidden files and directories (leading `.`) are skipped, as are exiftool
//! JSON sidecars and anything whose extension is not a media type enabled in
//! [`ScanOptions`]. An unreadable root is fatal; an unreadable entry further
//! down the tree is logged and skipped.

use crate::config::ScanConfig;
use crate::model::{PHOTO_EXTENSIONS, RAW_PHOTO_EXTENSIONS, VIDEO_EXTENSIONS, extension_of};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("cannot read input folder {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("input is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// A file observed on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskEntry {
    /// Modification time, epoch milliseconds.
    pub mod_time: i64,
    pub size: u64,
}

/// Relative path → observed state.
pub type DiskMap = BTreeMap<String, DiskEntry>;

/// Which media types the scan picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub include_photos: bool,
    pub include_videos: bool,
    pub include_raw_photos: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

impl From<&ScanConfig> for ScanOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            include_photos: config.include_photos,
            include_videos: config.include_videos,
            include_raw_photos: config.include_raw_photos,
        }
    }
}

impl ScanOptions {
    /// Whether a file with this (lowercase) extension should be indexed.
    pub fn accepts(&self, ext: &str) -> bool {
        (self.include_photos && PHOTO_EXTENSIONS.contains(&ext))
            || (self.include_raw_photos && RAW_PHOTO_EXTENSIONS.contains(&ext))
            || (self.include_videos && VIDEO_EXTENSIONS.contains(&ext))
    }
}

/// Milliseconds since the Unix epoch; times before the epoch clamp to 0.
pub fn epoch_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// `/`-separated path of `path` relative to `root`.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Find all media files under `root`.
pub fn scan(root: &Path, options: &ScanOptions) -> Result<DiskMap, ScanError> {
    let root_meta = std::fs::metadata(root).map_err(|source| ScanError::Unreadable {
        path: root.to_path_buf(),
        source,
    })?;
    if !root_meta.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    std::fs::read_dir(root).map_err(|source| ScanError::Unreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let mut found = DiskMap::new();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(rel) = relative_path(root, entry.path()) else {
            continue;
        };
        if !options.accepts(&extension_of(&rel)) {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!("skipping {rel}: {err}");
                continue;
            }
        };
        let mod_time = meta.modified().map(epoch_millis).unwrap_or(0);
        found.insert(
            rel,
            DiskEntry {
                mod_time,
                size: meta.len(),
            },
        );
    }
    tracing::debug!(files = found.len(), root = %root.display(), "disk scan complete");
    Ok(found)
}
