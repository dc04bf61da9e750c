//! Build configuration.
//!
//! Handles loading, validating, and merging the build config file. Stock
//! defaults are the base layer; a user `mediaforge.toml` only needs the keys it
//! wants to override, and CLI flags are applied on top by `main`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [index]
//! file = "index.db"          # Relative to the output directory
//!
//! [scan]
//! include_photos = true
//! include_videos = true
//! include_raw_photos = false
//!
//! [sizes]
//! thumbnail = 120            # Square thumbnail edge
//! small = 480                # Small preview height
//! large = 1440               # Large preview long edge
//! photo_quality = 90         # JPEG/WebP quality (1-100)
//!
//! [output]
//! structure = "folders"      # "folders" or "suffix"
//! photo_preview = "resize"   # "resize", "copy", "symlink" or "link"
//! video_preview = "resize"   # same, or "poster" for a still frame
//! original = "symlink"       # "copy", "symlink", "hardlink" or "link"
//! # link_prefix = "https://cdn.example.com/photos"
//! # relocate_converted = "/mnt/archive/converted"
//! dry_run = false
//!
//! [processing]
//! # concurrency = 4          # Omit for auto (= CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build configuration loaded from a TOML file.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Where the persistent index lives.
    pub index: IndexConfig,
    /// Which media types the disk scan picks up.
    pub scan: ScanConfig,
    /// Artifact dimensions and encoding quality.
    pub sizes: SizesConfig,
    /// Artifact layout and relationship choices.
    pub output: OutputConfig,
    /// Parallel job execution settings.
    pub processing: ProcessingConfig,
}

impl BuildConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.file.trim().is_empty() {
            return Err(ConfigError::Validation("index.file must not be empty".into()));
        }
        let sizes = &self.sizes;
        if sizes.thumbnail == 0 || sizes.small == 0 || sizes.large == 0 {
            return Err(ConfigError::Validation(
                "sizes.thumbnail, sizes.small and sizes.large must be non-zero".into(),
            ));
        }
        if sizes.photo_quality == 0 || sizes.photo_quality > 100 {
            return Err(ConfigError::Validation(
                "sizes.photo_quality must be 1-100".into(),
            ));
        }
        if self.processing.concurrency == Some(0) {
            return Err(ConfigError::Validation(
                "processing.concurrency must be at least 1".into(),
            ));
        }
        if self.output.photo_preview == PreviewMode::Poster {
            return Err(ConfigError::Validation(
                "output.photo_preview cannot be \"poster\"".into(),
            ));
        }
        let uses_link = self.output.photo_preview == PreviewMode::Link
            || self.output.video_preview == PreviewMode::Link
            || self.output.original == OriginalMode::Link;
        if uses_link && self.output.link_prefix.is_none() {
            return Err(ConfigError::Validation(
                "output.link_prefix is required when a relationship is \"link\"".into(),
            ));
        }
        Ok(())
    }

    /// Absolute location of the index file for a given output directory.
    pub fn index_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(&self.index.file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Index file name, relative to the output directory.
    pub file: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            file: "index.db".to_string(),
        }
    }
}

/// Media types picked up by the disk scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub include_photos: bool,
    pub include_videos: bool,
    pub include_raw_photos: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_photos: true,
            include_videos: true,
            include_raw_photos: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizesConfig {
    /// Edge of the square thumbnail crop.
    pub thumbnail: u32,
    /// Height of the small preview.
    pub small: u32,
    /// Long edge of the large preview.
    pub large: u32,
    /// Lossy encoding quality for photo artifacts.
    pub photo_quality: u32,
}

impl Default for SizesConfig {
    fn default() -> Self {
        Self {
            thumbnail: 120,
            small: 480,
            large: 1440,
            photo_quality: 90,
        }
    }
}

/// Directory layout of generated artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStructure {
    /// `media/thumb/<dir>/<name>.jpg`, `media/small/...`, `media/large/...`
    #[default]
    Folders,
    /// `media/<dir>/<name>_<ext>_thumb.jpg` next to each other
    Suffix,
}

/// How the large preview of a photo or video is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewMode {
    #[default]
    Resize,
    Copy,
    Symlink,
    Link,
    /// Videos only: a still frame instead of a playable preview.
    Poster,
}

/// How the original file is exposed in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginalMode {
    Copy,
    #[default]
    Symlink,
    Hardlink,
    Link,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub structure: OutputStructure,
    pub photo_preview: PreviewMode,
    pub video_preview: PreviewMode,
    pub original: OriginalMode,
    /// URL or path prefix for `link` relationships.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_prefix: Option<String>,
    /// Move converted files here and leave a symlink behind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relocate_converted: Option<PathBuf>,
    /// Plan jobs and report them without executing anything.
    pub dry_run: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of jobs in flight. When absent, defaults to the number
    /// of CPU cores. Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .concurrency
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BuildConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<BuildConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the build config.
///
/// `None` yields the validated stock defaults. An explicit path must exist.
pub fn load_config(path: Option<&Path>) -> Result<BuildConfig, ConfigError> {
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# mediaforge configuration
# ========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Index
# ---------------------------------------------------------------------------
[index]
# Index database, relative to the output directory. Removed files are kept
# in a sibling "<name>-deleted.db" so they keep their id if they come back.
file = "index.db"

# ---------------------------------------------------------------------------
# Disk scan
# ---------------------------------------------------------------------------
[scan]
include_photos = true
include_videos = true
include_raw_photos = false

# ---------------------------------------------------------------------------
# Artifact sizes
# ---------------------------------------------------------------------------
[sizes]
# Square thumbnail edge in pixels.
thumbnail = 120
# Height of the small preview.
small = 480
# Long edge of the large preview.
large = 1440
# JPEG/WebP encoding quality (1 = worst, 100 = best).
photo_quality = 90

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# "folders": media/thumb/..., media/small/..., media/large/...
# "suffix":  media/<dir>/<name>_<ext>_thumb.jpg
structure = "folders"
# Large previews: "resize", "copy", "symlink" or "link".
photo_preview = "resize"
# Videos also accept "poster" (a still frame instead of a playable file).
video_preview = "resize"
# Originals: "copy", "symlink", "hardlink" or "link".
original = "symlink"
# Required when any relationship above is "link".
# link_prefix = "https://cdn.example.com/photos"
# Move converted files to this directory and leave a symlink behind.
# relocate_converted = "/mnt/archive/converted"
# Plan and report jobs without running them.
dry_run = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel jobs.
# Omit or comment out to auto-detect (= number of CPU cores).
# concurrency = 4
"##
}
