//! Parameter types for image operations.
//!
//! These describe *what* to produce. The [`actions`](crate::actions) layer
//! fills them in from the build config and the source dimensions; the
//! [`backend`](super::backend) does the pixel work. Tests swap in a mock
//! backend without touching the planning code.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Used for format conversions that later get resized again.
    pub fn max() -> Self {
        Self(100)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Which edge a fit resize constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Keep the source dimensions (re-encode only).
    Original,
    Height(u32),
    Width(u32),
}

/// Unsharp-mask parameters applied after downscaling thumbnails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sharpening {
    pub sigma: f32,
    pub threshold: i32,
}

impl Sharpening {
    /// Light sharpening suitable for thumbnails.
    pub fn light() -> Self {
        Self {
            sigma: 0.5,
            threshold: 0,
        }
    }
}

/// A resize to exact output dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub quality: Quality,
}

/// A center-cropped square.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub size: u32,
    pub quality: Quality,
    pub sharpening: Option<Sharpening>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(75).value(), 75);
        assert_eq!(Quality::new(250).value(), 100);
        assert_eq!(Quality::max().value(), 100);
    }

    #[test]
    fn quality_default_matches_config_default() {
        assert_eq!(
            Quality::default().value(),
            crate::config::SizesConfig::default().photo_quality
        );
    }
}
