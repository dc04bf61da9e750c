//! Metadata extraction and standardization.
//!
//! Extraction produces one [`MediaEntry`] per source file: MIME type, file
//! modification time, and a bag of raw tags keyed exiftool-style
//! (`"EXIF:DateTimeOriginal"`, `"QuickTime:CreationDate"`, ...). The entry is
//! stored verbatim in the index, and [`Metadata`] is derived from it whenever a
//! row is read back, so standardization changes never require a re-scan.
//!
//! ## Sources
//!
//! The built-in [`FsExtractor`] reads what the filesystem and the `image`
//! crate can tell cheaply (size, mtime, pixel dimensions), then merges an
//! optional exiftool JSON sidecar (`photo.jpg.json`, the output of
//! `exiftool -G -json photo.jpg`) on top. The sidecar is how capture dates
//! and Live Photo markers reach the index.
//!
//! ## Logical date
//!
//! The first present tag in [`DATE_TAGS`] wins. If it does not parse as an
//! EXIF date (`YYYY:MM:DD HH:MM:SS`, offsets ignored), the file modification
//! time is used instead; later tags are not consulted.

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Capture-date tags in priority order.
pub const DATE_TAGS: &[&str] = &[
    "EXIF:DateTimeOriginal",
    "H264:DateTimeOriginal",
    "QuickTime:ContentCreateDate",
    "QuickTime:CreationDate",
    "XMP:CreateDate",
    "XMP:DateCreated",
];

const WIDTH_TAGS: &[&str] = &["File:ImageWidth", "EXIF:ExifImageWidth", "QuickTime:ImageWidth"];
const HEIGHT_TAGS: &[&str] = &[
    "File:ImageHeight",
    "EXIF:ExifImageHeight",
    "QuickTime:ImageHeight",
];
const LIVE_PHOTO_TAGS: &[&str] = &["QuickTime:LivePhotoAuto", "QuickTime:Live-photoAuto"];

const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid metadata sidecar {path}: {source}")]
    Sidecar {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unrecognised media format: {0}")]
    Unsupported(String),
}

/// Raw extraction result for one source file, stored as the index metadata blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
    /// Path relative to the input root.
    pub source_file: String,
    pub mime_type: String,
    /// Modification time, epoch milliseconds.
    pub file_modify_time: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl MediaEntry {
    /// String value of a tag, if present and non-empty.
    pub fn tag(&self, name: &str) -> Option<String> {
        match self.fields.get(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn first_u32(&self, tags: &[&str]) -> Option<u32> {
        tags.iter()
            .filter_map(|t| self.fields.get(*t))
            .find_map(|v| match v {
                serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
    }
}

/// Standardized metadata derived from a [`MediaEntry`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    pub mime_type: String,
    /// Source modification time, epoch milliseconds.
    pub file_date: i64,
    /// Logical date, epoch milliseconds.
    pub date: i64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Companion video of an Apple Live Photo.
    pub live_photo: bool,
}

impl Metadata {
    pub fn from_entry(entry: &MediaEntry) -> Self {
        let tags: Vec<Option<String>> = LIVE_PHOTO_TAGS.iter().map(|t| entry.tag(t)).collect();
        let live_photo = tags
            .iter()
            .flatten()
            .any(|v| !matches!(v.trim(), "" | "0" | "false"));
        Self {
            mime_type: entry.mime_type.clone(),
            file_date: entry.file_modify_time,
            date: logical_date(entry),
            width: entry.first_u32(WIDTH_TAGS),
            height: entry.first_u32(HEIGHT_TAGS),
            live_photo,
        }
    }
}

/// Resolve a field from multiple sources.
///
/// Returns the first non-None, non-empty value in priority order.
pub fn resolve(sources: &[Option<&str>]) -> Option<String> {
    sources
        .iter()
        .filter_map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        })
        .next()
}

/// Best capture date of an entry, falling back to its modification time.
pub fn logical_date(entry: &MediaEntry) -> i64 {
    let values: Vec<Option<String>> = DATE_TAGS.iter().map(|t| entry.tag(t)).collect();
    let sources: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
    resolve(&sources)
        .and_then(|raw| parse_exif_date(&raw))
        .unwrap_or(entry.file_modify_time)
}

/// Parse `YYYY:MM:DD HH:MM:SS`, ignoring sub-seconds and offsets.
pub fn parse_exif_date(raw: &str) -> Option<i64> {
    let head = raw.trim().get(..19)?;
    NaiveDateTime::parse_from_str(head, EXIF_DATE_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// MIME type guessed from the file extension.
pub fn mime_from_extension(ext: &str) -> Option<String> {
    let mime = match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "mp4" => "video/mp4",
        "m4v" => "video/x-m4v",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "wmv" => "video/x-ms-wmv",
        "mpg" | "mpeg" => "video/mpeg",
        "3gp" => "video/3gpp",
        "mts" | "m2ts" => "video/mp2t",
        raw if crate::model::RAW_PHOTO_EXTENSIONS.contains(&raw) => {
            return Some(format!("image/x-{raw}"));
        }
        _ => return None,
    };
    Some(mime.to_string())
}

/// Source of per-file metadata.
///
/// Implementations must be `Sync`: [`extract_all`] calls them from a worker pool.
pub trait MetadataExtractor: Sync {
    /// Extract metadata for `path`, relative to `root`.
    fn extract(&self, root: &Path, path: &str) -> Result<MediaEntry, ExtractionError>;
}

/// Filesystem + `image` crate extractor with exiftool JSON sidecar support.
#[derive(Debug, Default)]
pub struct FsExtractor;

impl MetadataExtractor for FsExtractor {
    fn extract(&self, root: &Path, path: &str) -> Result<MediaEntry, ExtractionError> {
        let absolute = root.join(path);
        let io_err = |source| ExtractionError::Io {
            path: absolute.clone(),
            source,
        };
        let stat = std::fs::metadata(&absolute).map_err(io_err)?;
        let modified = stat.modified().map_err(io_err)?;

        let ext = crate::model::extension_of(path);
        let mime_type =
            mime_from_extension(&ext).ok_or_else(|| ExtractionError::Unsupported(path.to_string()))?;

        let mut fields = BTreeMap::new();
        fields.insert("File:FileSize".to_string(), serde_json::json!(stat.len()));
        if mime_type.starts_with("image/")
            && let Ok((width, height)) = image::image_dimensions(&absolute)
        {
            fields.insert("File:ImageWidth".to_string(), serde_json::json!(width));
            fields.insert("File:ImageHeight".to_string(), serde_json::json!(height));
        }
        if let Some(sidecar) = read_sidecar(&absolute)? {
            fields.extend(sidecar);
        }

        Ok(MediaEntry {
            source_file: path.to_string(),
            mime_type,
            file_modify_time: crate::scan::epoch_millis(modified),
            fields,
        })
    }
}

/// Read an exiftool JSON sidecar (`<file>.json`) next to a media file.
///
/// Accepts either a single object or exiftool's one-element array. Returns
/// `Ok(None)` when no sidecar exists.
pub fn read_sidecar(
    media_path: &Path,
) -> Result<Option<BTreeMap<String, serde_json::Value>>, ExtractionError> {
    let mut name = media_path.as_os_str().to_os_string();
    name.push(".json");
    let sidecar = PathBuf::from(name);
    let content = match std::fs::read_to_string(&sidecar) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ExtractionError::Io {
                path: sidecar,
                source,
            });
        }
    };
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| ExtractionError::Sidecar {
            path: sidecar.clone(),
            source,
        })?;
    let object = match value {
        serde_json::Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        other => other,
    };
    match object {
        serde_json::Value::Object(map) => Ok(Some(map.into_iter().collect())),
        _ => Ok(None),
    }
}

/// Run an extractor over many paths on a bounded worker pool.
///
/// Results come back in input order, so callers applying them to the index
/// stay deterministic regardless of which worker finished first.
pub fn extract_all(
    extractor: &dyn MetadataExtractor,
    root: &Path,
    paths: &[String],
    concurrency: usize,
) -> Result<Vec<(String, Result<MediaEntry, ExtractionError>)>, rayon::ThreadPoolBuildError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency.max(1))
        .build()?;
    Ok(pool.install(|| {
        paths
            .par_iter()
            .map(|path| (path.clone(), extractor.extract(root, path)))
            .collect()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn entry_with(fields: &[(&str, serde_json::Value)]) -> MediaEntry {
        MediaEntry {
            source_file: "a.jpg".into(),
            mime_type: "image/jpeg".into(),
            file_modify_time: 1_000,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    // =========================================================================
    // resolve / logical date
    // =========================================================================

    #[test]
    fn resolve_first_non_empty_wins() {
        assert_eq!(
            resolve(&[None, Some("  "), Some("b"), Some("c")]),
            Some("b".to_string())
        );
        assert_eq!(resolve(&[None, Some("")]), None);
    }

    #[test]
    fn parse_exif_date_plain() {
        assert_eq!(parse_exif_date("1970:01:01 00:00:01"), Some(1_000));
    }

    #[test]
    fn parse_exif_date_ignores_offset() {
        assert_eq!(
            parse_exif_date("1970:01:01 00:01:00+02:00"),
            Some(60_000)
        );
    }

    #[test]
    fn parse_exif_date_rejects_garbage() {
        assert_eq!(parse_exif_date("yesterday"), None);
        assert_eq!(parse_exif_date("0000:00:00 00:00:00"), None);
    }

    #[test]
    fn logical_date_falls_back_to_file_date() {
        assert_eq!(logical_date(&entry_with(&[])), 1_000);
    }

    #[test]
    fn logical_date_prefers_tag_priority() {
        let entry = entry_with(&[
            ("XMP:CreateDate", serde_json::json!("1970:01:01 00:00:05")),
            ("EXIF:DateTimeOriginal", serde_json::json!("1970:01:01 00:00:02")),
        ]);
        assert_eq!(logical_date(&entry), 2_000);
    }

    #[test]
    fn logical_date_invalid_first_tag_falls_back_to_file_date() {
        let entry = entry_with(&[
            ("EXIF:DateTimeOriginal", serde_json::json!("not a date")),
            ("XMP:CreateDate", serde_json::json!("1970:01:01 00:00:05")),
        ]);
        assert_eq!(logical_date(&entry), 1_000);
    }

    #[test]
    fn metadata_reads_dimensions_and_live_photo() {
        let entry = entry_with(&[
            ("File:ImageWidth", serde_json::json!(4000)),
            ("File:ImageHeight", serde_json::json!("3000")),
            ("QuickTime:LivePhotoAuto", serde_json::json!(1)),
        ]);
        let meta = Metadata::from_entry(&entry);
        assert_eq!(meta.width, Some(4000));
        assert_eq!(meta.height, Some(3000));
        assert!(meta.live_photo);
        assert_eq!(meta.file_date, 1_000);
    }

    #[test]
    fn metadata_live_photo_false_when_zero() {
        let entry = entry_with(&[("QuickTime:LivePhotoAuto", serde_json::json!(0))]);
        assert!(!Metadata::from_entry(&entry).live_photo);
    }

    #[test]
    fn mime_from_extension_known_and_raw() {
        assert_eq!(mime_from_extension("jpg").as_deref(), Some("image/jpeg"));
        assert_eq!(mime_from_extension("mov").as_deref(), Some("video/quicktime"));
        assert_eq!(mime_from_extension("nef").as_deref(), Some("image/x-nef"));
        assert_eq!(mime_from_extension("txt"), None);
    }

    // =========================================================================
    // FsExtractor
    // =========================================================================

    #[test]
    fn fs_extractor_reads_file_and_sidecar() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("clip.mp4"), b"not really a video").unwrap();
        fs::write(
            tmp.path().join("clip.mp4.json"),
            r#"[{"QuickTime:CreationDate": "2021:06:01 12:00:00"}]"#,
        )
        .unwrap();

        let entry = FsExtractor.extract(tmp.path(), "clip.mp4").unwrap();
        assert_eq!(entry.mime_type, "video/mp4");
        assert_eq!(entry.source_file, "clip.mp4");
        assert_eq!(entry.fields["File:FileSize"], serde_json::json!(18));
        assert_eq!(
            Metadata::from_entry(&entry).date,
            parse_exif_date("2021:06:01 12:00:00").unwrap()
        );
    }

    #[test]
    fn fs_extractor_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = FsExtractor.extract(tmp.path(), "gone.jpg");
        assert!(matches!(result, Err(ExtractionError::Io { .. })));
    }

    #[test]
    fn fs_extractor_rejects_unknown_extension() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        let result = FsExtractor.extract(tmp.path(), "notes.txt");
        assert!(matches!(result, Err(ExtractionError::Unsupported(_))));
    }

    #[test]
    fn fs_extractor_invalid_sidecar_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.jpg"), "x").unwrap();
        fs::write(tmp.path().join("a.jpg.json"), "{ nope").unwrap();
        let result = FsExtractor.extract(tmp.path(), "a.jpg");
        assert!(matches!(result, Err(ExtractionError::Sidecar { .. })));
    }

    #[test]
    fn extract_all_preserves_input_order() {
        let tmp = TempDir::new().unwrap();
        let paths: Vec<String> = (0..20).map(|i| format!("{i:02}.png")).collect();
        for p in &paths {
            fs::write(tmp.path().join(p), "x").unwrap();
        }
        let results = extract_all(&FsExtractor, tmp.path(), &paths, 4).unwrap();
        let order: Vec<&str> = results.iter().map(|(p, _)| p.as_str()).collect();
        let expected: Vec<&str> = paths.iter().map(String::as_str).collect();
        assert_eq!(order, expected);
        assert!(results.iter().all(|(_, r)| r.is_ok()));
    }
}
