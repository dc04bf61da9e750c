//! Artifact layout.
//!
//! Every source file maps to up to five artifacts: a thumbnail, a small and a
//! large preview, the original (copied, linked or referenced), and for formats
//! browsers cannot show, a web-safe conversion. Each artifact carries a
//! [`Relationship`] naming how it is derived from its source; the planner turns
//! relationships into actions.
//!
//! ## Structures
//!
//! ```text
//! folders                              suffix
//! media/thumb/2020/IMG_1.jpg           media/2020/IMG_1_jpg_thumb.jpg
//! media/small/2020/IMG_1.jpg           media/2020/IMG_1_jpg_small.jpg
//! media/large/2020/IMG_1.jpg           media/2020/IMG_1_jpg_large.jpg
//! media/original/2020/IMG_1.jpg        media/2020/IMG_1.jpg
//! media/converted/2020/IMG_2.jpg       media/2020/IMG_2_heic_converted.jpg
//! ```
//!
//! All paths are relative to the output root, except `fs:link` targets which
//! live under the configured link prefix.

use crate::config::{OriginalMode, OutputConfig, OutputStructure, PreviewMode};
use crate::model::{MediaType, is_web_supported};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

const CONVERTED_PHOTO_EXT: &str = "jpg";
const CONVERTED_VIDEO_EXT: &str = "mp4";

/// Artifact slots, one index column each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    Thumbnail,
    Small,
    Large,
    Original,
    Conversion,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Thumbnail,
        ArtifactKind::Small,
        ArtifactKind::Large,
        ArtifactKind::Original,
        ArtifactKind::Conversion,
    ];

    /// Index column holding the produced path.
    pub fn column(self) -> &'static str {
        match self {
            ArtifactKind::Thumbnail => "thumbnail",
            ArtifactKind::Small => "small",
            ArtifactKind::Large => "large",
            ArtifactKind::Original => "original",
            ArtifactKind::Conversion => "conversion",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// How an artifact derives from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relationship {
    PhotoThumbnail,
    PhotoSmall,
    PhotoLarge,
    PhotoConversion,
    VideoThumbnail,
    VideoSmall,
    VideoPoster,
    VideoResized,
    VideoConversion,
    FsCopy,
    FsSymlink,
    FsHardlink,
    FsLink,
}

impl Relationship {
    pub fn as_str(self) -> &'static str {
        match self {
            Relationship::PhotoThumbnail => "photo:thumbnail",
            Relationship::PhotoSmall => "photo:small",
            Relationship::PhotoLarge => "photo:large",
            Relationship::PhotoConversion => "photo:conversion",
            Relationship::VideoThumbnail => "video:thumbnail",
            Relationship::VideoSmall => "video:small",
            Relationship::VideoPoster => "video:poster",
            Relationship::VideoResized => "video:resized",
            Relationship::VideoConversion => "video:conversion",
            Relationship::FsCopy => "fs:copy",
            Relationship::FsSymlink => "fs:symlink",
            Relationship::FsHardlink => "fs:hardlink",
            Relationship::FsLink => "fs:link",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A planned artifact: where it goes and how it is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: String,
    pub rel: Relationship,
}

pub type ArtifactMap = BTreeMap<ArtifactKind, Artifact>;

/// The part of the output config that decides artifact paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputOptions {
    pub structure: OutputStructure,
    pub photo_preview: PreviewMode,
    pub video_preview: PreviewMode,
    pub original: OriginalMode,
    pub link_prefix: Option<String>,
}

impl From<&OutputConfig> for OutputOptions {
    fn from(config: &OutputConfig) -> Self {
        Self {
            structure: config.structure,
            photo_preview: config.photo_preview,
            video_preview: config.video_preview,
            original: config.original,
            link_prefix: config.link_prefix.clone(),
        }
    }
}

/// Artifacts for a source file. Unknown media types get none.
pub fn paths(path: &str, media_type: MediaType, opts: &OutputOptions) -> ArtifactMap {
    let rels: Vec<(ArtifactKind, Relationship)> = match media_type {
        MediaType::Image => vec![
            (ArtifactKind::Thumbnail, Relationship::PhotoThumbnail),
            (ArtifactKind::Small, Relationship::PhotoSmall),
            (ArtifactKind::Large, preview(MediaType::Image, opts.photo_preview)),
            (ArtifactKind::Original, original(opts.original)),
            (ArtifactKind::Conversion, Relationship::PhotoConversion),
        ],
        MediaType::Video => vec![
            (ArtifactKind::Thumbnail, Relationship::VideoThumbnail),
            (ArtifactKind::Small, Relationship::VideoSmall),
            (ArtifactKind::Large, preview(MediaType::Video, opts.video_preview)),
            (ArtifactKind::Original, original(opts.original)),
            (ArtifactKind::Conversion, Relationship::VideoConversion),
        ],
        MediaType::Unknown => {
            tracing::warn!("unsupported media type for {path}");
            return ArtifactMap::new();
        }
    };
    let web_safe = is_web_supported(path, media_type);
    rels.into_iter()
        .filter(|(kind, _)| *kind != ArtifactKind::Conversion || !web_safe)
        .map(|(kind, rel)| {
            let artifact = Artifact {
                path: relationship_path(path, rel, opts),
                rel,
            };
            (kind, artifact)
        })
        .collect()
}

fn preview(media_type: MediaType, mode: PreviewMode) -> Relationship {
    match (media_type, mode) {
        (MediaType::Video, PreviewMode::Resize) => Relationship::VideoResized,
        (MediaType::Video, PreviewMode::Poster) => Relationship::VideoPoster,
        (_, PreviewMode::Resize | PreviewMode::Poster) => Relationship::PhotoLarge,
        (_, PreviewMode::Copy) => Relationship::FsCopy,
        (_, PreviewMode::Symlink) => Relationship::FsSymlink,
        (_, PreviewMode::Link) => Relationship::FsLink,
    }
}

fn original(mode: OriginalMode) -> Relationship {
    match mode {
        OriginalMode::Copy => Relationship::FsCopy,
        OriginalMode::Symlink => Relationship::FsSymlink,
        OriginalMode::Hardlink => Relationship::FsHardlink,
        OriginalMode::Link => Relationship::FsLink,
    }
}

/// Split `a/b/name.ext` into (`a/b`, `name`, `ext`).
fn split(path: &str) -> (String, String, String) {
    let p = Path::new(path);
    let dir = p
        .parent()
        .map(|d| d.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default();
    let name = p
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = p
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, name, ext)
}

/// Keep web photo extensions, everything else becomes JPEG.
fn photo_extension(ext: &str) -> &str {
    if matches!(
        ext.to_ascii_lowercase().as_str(),
        "jpg" | "jpeg" | "png" | "gif"
    ) {
        ext
    } else {
        CONVERTED_PHOTO_EXT
    }
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty() && **p != ".")
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}

fn relationship_path(path: &str, rel: Relationship, opts: &OutputOptions) -> String {
    let link = || link_target(opts.link_prefix.as_deref().unwrap_or(""), path);
    let (dir, name, ext) = split(path);
    let photo_ext = photo_extension(&ext);
    match opts.structure {
        OutputStructure::Folders => {
            let (folder, file) = match rel {
                Relationship::PhotoThumbnail => ("thumb", format!("{name}.{photo_ext}")),
                Relationship::PhotoSmall => ("small", format!("{name}.{photo_ext}")),
                Relationship::PhotoLarge => ("large", format!("{name}.{photo_ext}")),
                Relationship::PhotoConversion => {
                    ("converted", format!("{name}.{CONVERTED_PHOTO_EXT}"))
                }
                Relationship::VideoThumbnail => ("thumb", format!("{name}.jpg")),
                Relationship::VideoSmall => ("small", format!("{name}.jpg")),
                Relationship::VideoPoster => ("large", format!("{name}.jpg")),
                Relationship::VideoResized => ("large", format!("{name}.{CONVERTED_VIDEO_EXT}")),
                Relationship::VideoConversion => {
                    ("converted", format!("{name}.{CONVERTED_VIDEO_EXT}"))
                }
                Relationship::FsCopy | Relationship::FsSymlink | Relationship::FsHardlink => {
                    ("original", format!("{name}.{ext}"))
                }
                Relationship::FsLink => return link(),
            };
            join(&["media", folder, &dir, &file])
        }
        OutputStructure::Suffix => {
            let file = match rel {
                Relationship::PhotoThumbnail => format!("{name}_{ext}_thumb.{photo_ext}"),
                Relationship::PhotoSmall => format!("{name}_{ext}_small.{photo_ext}"),
                Relationship::PhotoLarge => format!("{name}_{ext}_large.{photo_ext}"),
                Relationship::PhotoConversion => {
                    format!("{name}_{ext}_converted.{CONVERTED_PHOTO_EXT}")
                }
                Relationship::VideoThumbnail => format!("{name}_{ext}_thumb.jpg"),
                Relationship::VideoSmall => format!("{name}_{ext}_small.jpg"),
                Relationship::VideoPoster => format!("{name}_{ext}_poster.jpg"),
                Relationship::VideoResized => format!("{name}_{ext}_large.{CONVERTED_VIDEO_EXT}"),
                Relationship::VideoConversion => {
                    format!("{name}_{ext}_converted.{CONVERTED_VIDEO_EXT}")
                }
                Relationship::FsCopy | Relationship::FsSymlink | Relationship::FsHardlink => {
                    format!("{name}.{ext}")
                }
                Relationship::FsLink => return link(),
            };
            join(&["media", &dir, &file])
        }
    }
}

/// Join a link prefix and a source path. URL prefixes get percent-encoded
/// path segments; anything else is treated as a filesystem path.
fn link_target(prefix: &str, path: &str) -> String {
    let is_url = ["http://", "https://", "file://"]
        .iter()
        .any(|scheme| prefix.starts_with(scheme));
    if is_url {
        let encoded: Vec<String> = path.split('/').map(encode_segment).collect();
        format!("{}/{}", prefix.trim_end_matches('/'), encoded.join("/"))
    } else {
        Path::new(prefix).join(path).to_string_lossy().into_owned()
    }
}

fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}
