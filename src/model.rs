//! The in-memory view of an indexed source file.
//!
//! A [`MediaFile`] is built from a `FileEvent::File` emitted by the index. It
//! carries the stable identity from the index, the run flags from the delta
//! (`added`, `modified`), the standardized metadata, and the artifact map
//! computed from the output configuration.

use crate::artifacts::{ArtifactKind, ArtifactMap, OutputOptions};
use crate::metadata::Metadata;
use std::path::Path;

/// Browser-displayable photo formats. Anything else is converted first.
const WEB_PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
/// Browser-playable video containers.
const WEB_VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "webm"];

pub const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "tif", "tiff", "bmp", "heic", "heif",
];
pub const RAW_PHOTO_EXTENSIONS: &[&str] = &[
    "arw", "cr2", "cr3", "dng", "nef", "nrw", "orf", "raf", "rw2", "pef", "srw",
];
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "webm", "avi", "mkv", "mts", "m2ts", "3gp", "wmv", "mpg", "mpeg",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Image,
    Video,
    Unknown,
}

impl MediaType {
    /// Classify from a MIME type such as `image/jpeg`.
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next() {
            Some("image") => MediaType::Image,
            Some("video") => MediaType::Video,
            _ => MediaType::Unknown,
        }
    }
}

/// Whether browsers can display a file of this type as-is.
pub fn is_web_supported(path: &str, media_type: MediaType) -> bool {
    let ext = extension_of(path);
    if media_type == MediaType::Video {
        WEB_VIDEO_EXTENSIONS.contains(&ext.as_str())
    } else {
        WEB_PHOTO_EXTENSIONS.contains(&ext.as_str())
    }
}

/// Lowercase extension without the dot, or an empty string.
pub fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// How the index saw a file in this run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunState {
    /// New at this path in this run.
    pub added: bool,
    /// Content changed since the previous run.
    pub modified: bool,
    /// A previous build produced every artifact without a failure.
    pub processed: bool,
}

/// A live source file as seen by the filter and planning phases.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub id: i64,
    /// Path relative to the input root, `/`-separated.
    pub path: String,
    pub filename: String,
    /// Extension including the dot, case preserved (`.JPG`).
    pub extension: String,
    /// Logical date, epoch milliseconds.
    pub date: i64,
    /// Source modification time, epoch milliseconds.
    pub file_date: i64,
    pub size: u64,
    pub media_type: MediaType,
    pub meta: Metadata,
    pub modified: bool,
    pub added: bool,
    pub processed: bool,
    pub output: ArtifactMap,
}

impl MediaFile {
    pub fn new(
        id: i64,
        path: &str,
        meta: Metadata,
        size: u64,
        state: RunState,
        opts: &OutputOptions,
    ) -> Self {
        let filename = Path::new(path)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        let extension = Path::new(path)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let media_type = MediaType::from_mime(&meta.mime_type);
        let output = crate::artifacts::paths(path, media_type, opts);
        Self {
            id,
            path: path.to_string(),
            filename,
            extension,
            date: meta.date,
            file_date: meta.file_date,
            size,
            media_type,
            meta,
            modified: state.modified,
            added: state.added,
            processed: state.processed,
            output,
        }
    }

    pub fn is_video(&self) -> bool {
        self.media_type == MediaType::Video
    }

    /// Path with the final extension removed, used for copy detection.
    pub fn path_no_extension(&self) -> &str {
        self.path
            .strip_suffix(self.extension.as_str())
            .unwrap_or(&self.path)
    }

    /// Whether browsers can display the source as-is.
    pub fn is_web_supported(&self) -> bool {
        is_web_supported(&self.path, self.media_type)
    }

    pub fn is_jpg(&self) -> bool {
        matches!(extension_of(&self.path).as_str(), "jpg" | "jpeg")
    }

    pub fn is_vertical(&self) -> bool {
        matches!((self.meta.width, self.meta.height), (Some(w), Some(h)) if h > w)
    }

    pub fn is_horizontal(&self) -> bool {
        matches!((self.meta.width, self.meta.height), (Some(w), Some(h)) if w > h)
    }

    /// Source path for artifacts that derive from the pixels: the original
    /// when web-safe, otherwise the converted file under the output root.
    pub fn render_source(&self, input: &Path, output: &Path) -> std::path::PathBuf {
        match self.output.get(&ArtifactKind::Conversion) {
            Some(conversion) if !self.is_web_supported() => output.join(&conversion.path),
            _ => input.join(&self.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{media_file, metadata_with};

    #[test]
    fn media_type_from_mime() {
        assert_eq!(MediaType::from_mime("image/jpeg"), MediaType::Image);
        assert_eq!(MediaType::from_mime("video/mp4"), MediaType::Video);
        assert_eq!(MediaType::from_mime("application/pdf"), MediaType::Unknown);
        assert_eq!(MediaType::from_mime(""), MediaType::Unknown);
    }

    #[test]
    fn extension_is_lowercased_without_dot() {
        assert_eq!(extension_of("a/b/IMG_1.JPG"), "jpg");
        assert_eq!(extension_of("noext"), "");
    }

    #[test]
    fn path_no_extension_strips_last_extension() {
        let f = media_file("2020/photo.jpg__copy.jpg", 10, 1000);
        assert_eq!(f.extension, ".jpg");
        assert_eq!(f.path_no_extension(), "2020/photo.jpg__copy");
    }

    #[test]
    fn web_support_by_extension() {
        assert!(media_file("a.JPG", 1, 1).is_web_supported());
        assert!(!media_file("a.heic", 1, 1).is_web_supported());
        assert!(media_file("a.jpeg", 1, 1).is_jpg());
        assert!(!media_file("a.png", 1, 1).is_jpg());
    }

    #[test]
    fn orientation_from_dimensions() {
        let mut f = media_file("a.jpg", 1, 1);
        f.meta = metadata_with("image/jpeg", 1, Some((300, 200)));
        assert!(f.is_horizontal());
        assert!(!f.is_vertical());

        f.meta = metadata_with("image/jpeg", 1, None);
        assert!(!f.is_horizontal());
        assert!(!f.is_vertical());
    }

    #[test]
    fn render_source_uses_conversion_for_unsupported_formats() {
        let input = Path::new("/in");
        let output = Path::new("/out");
        let jpg = media_file("trip/a.jpg", 1, 1);
        assert_eq!(jpg.render_source(input, output), Path::new("/in/trip/a.jpg"));

        let heic = media_file("trip/b.heic", 1, 1);
        assert_eq!(
            heic.render_source(input, output),
            Path::new("/out/media/converted/trip/b.jpg")
        );
    }
}
