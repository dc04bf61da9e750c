//! Shared test utilities for the mediaforge test suite.
//!
//! Provides in-memory [`MediaFile`] builders for filter and planner tests, a
//! metadata extractor that needs no real media, and a helper that writes a
//! source file with an exact modification time.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_media(tmp.path(), "2020/a.jpg", b"1", 1_000_000);
//! let events = index.update(tmp.path(), &options, &StubExtractor::default(), 1)?;
//!
//! let dup = media_file("2020/a.jpg__copy.jpg", 10, 5);
//! ```

use crate::artifacts::OutputOptions;
use crate::metadata::{ExtractionError, MediaEntry, Metadata, MetadataExtractor};
use crate::model::{MediaFile, RunState, extension_of};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

// =========================================================================
// In-memory files
// =========================================================================

/// Standardized metadata with a given MIME type, date and optional
/// dimensions.
pub fn metadata_with(mime: &str, date: i64, dims: Option<(u32, u32)>) -> Metadata {
    Metadata {
        mime_type: mime.to_string(),
        file_date: date,
        date,
        width: dims.map(|(w, _)| w),
        height: dims.map(|(_, h)| h),
        live_photo: false,
    }
}

/// A new, unprocessed file with the MIME type guessed from its extension and
/// artifacts laid out with default output options.
pub fn media_file(path: &str, size: u64, date: i64) -> MediaFile {
    let mime = crate::metadata::mime_from_extension(&extension_of(path))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    MediaFile::new(
        1,
        path,
        metadata_with(&mime, date, None),
        size,
        RunState {
            added: true,
            ..RunState::default()
        },
        &OutputOptions::default(),
    )
}

// =========================================================================
// On-disk fixtures
// =========================================================================

/// Write `bytes` to `root/rel`, creating directories, and set its
/// modification time to `mtime_ms` epoch milliseconds.
pub fn write_media(root: &Path, rel: &str, bytes: &[u8], mtime_ms: i64) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    set_mtime(&path, mtime_ms);
}

/// Set a file's modification time to `mtime_ms` epoch milliseconds.
pub fn set_mtime(path: &Path, mtime_ms: i64) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(UNIX_EPOCH + Duration::from_millis(mtime_ms as u64))
        .unwrap();
}

// =========================================================================
// Extractor
// =========================================================================

/// Extractor that reads only the file's mtime and guesses the MIME type from
/// the extension. Paths listed in `failing` return an error.
#[derive(Debug, Default)]
pub struct StubExtractor {
    pub failing: BTreeSet<String>,
    /// Extra tags merged into every entry.
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl StubExtractor {
    pub fn failing(paths: &[&str]) -> Self {
        Self {
            failing: paths.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl MetadataExtractor for StubExtractor {
    fn extract(&self, root: &Path, path: &str) -> Result<MediaEntry, ExtractionError> {
        if self.failing.contains(path) {
            return Err(ExtractionError::Unsupported(path.to_string()));
        }
        let absolute = root.join(path);
        let modified = std::fs::metadata(&absolute)
            .and_then(|m| m.modified())
            .map_err(|source| ExtractionError::Io {
                path: absolute.clone(),
                source,
            })?;
        let mime_type = crate::metadata::mime_from_extension(&extension_of(path))
            .ok_or_else(|| ExtractionError::Unsupported(path.to_string()))?;
        Ok(MediaEntry {
            source_file: path.to_string(),
            mime_type,
            file_modify_time: crate::scan::epoch_millis(modified),
            fields: self.fields.clone(),
        })
    }
}
