//! Relationship → action mapping and the transcoder that executes actions.
//!
//! The planner never calls the filesystem or an encoder directly. It asks
//! [`action_for`] what a relationship means for a given file, and the queue
//! hands the resulting [`Action`] to a [`Transcoder`]:
//!
//! | Relationship | Action |
//! |---|---|
//! | `photo:thumbnail` | square crop of `sizes.thumbnail` |
//! | `photo:small` | fit to `sizes.small` high |
//! | `photo:large` | fit the long edge to `sizes.large` |
//! | `photo:conversion` | re-encode at full quality; nothing if web-safe |
//! | `video:thumbnail`, `video:small`, `video:poster` | still frame |
//! | `video:resized` | symlink if web-safe, otherwise transcode |
//! | `video:conversion` | transcode; nothing if web-safe |
//! | `fs:copy`, `fs:symlink`, `fs:hardlink` | filesystem operation |
//! | `fs:link` | none |

use crate::artifacts::Relationship;
use crate::config::SizesConfig;
use crate::imaging::{
    BackendError, Bound, ImageBackend, Quality, ResizeParams, Sharpening, ThumbnailParams,
    fit_dimensions, square_edge,
};
use crate::model::MediaFile;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("{0} is not supported by this transcoder")]
    Unsupported(String),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> TranscodeError + '_ {
    move |source| TranscodeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Target geometry for pixel-producing actions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeSpec {
    /// Center-cropped square.
    Square { size: u32, quality: Quality },
    /// Aspect-preserving fit.
    Fit { bound: Bound, quality: Quality },
}

/// What it takes to produce one artifact from its source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Decode the source image and encode a resized copy.
    Resize(ResizeSpec),
    /// Grab a frame from a video and encode it as an image.
    Still(ResizeSpec),
    /// Re-encode a video into a web-playable container.
    Transcode,
    Copy,
    Symlink,
    Hardlink,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Resize(_) => f.write_str("resize"),
            Action::Still(_) => f.write_str("video still"),
            Action::Transcode => f.write_str("video transcode"),
            Action::Copy => f.write_str("copy"),
            Action::Symlink => f.write_str("symlink"),
            Action::Hardlink => f.write_str("hardlink"),
        }
    }
}

/// The action behind a relationship, or `None` when nothing has to be
/// produced: `fs:link`, and conversions of files browsers already show.
pub fn action_for(rel: Relationship, file: &MediaFile, sizes: &SizesConfig) -> Option<Action> {
    let quality = Quality::new(sizes.photo_quality);
    let thumbnail = ResizeSpec::Square {
        size: sizes.thumbnail,
        quality,
    };
    let small = ResizeSpec::Fit {
        bound: Bound::Height(sizes.small),
        quality,
    };
    let large = ResizeSpec::Fit {
        bound: if file.is_vertical() {
            Bound::Width(sizes.large)
        } else {
            Bound::Height(sizes.large)
        },
        quality,
    };
    let action = match rel {
        Relationship::PhotoThumbnail => Action::Resize(thumbnail),
        Relationship::PhotoSmall => Action::Resize(small),
        Relationship::PhotoLarge => Action::Resize(large),
        Relationship::PhotoConversion | Relationship::VideoConversion
            if file.is_web_supported() =>
        {
            return None;
        }
        Relationship::PhotoConversion => Action::Resize(ResizeSpec::Fit {
            bound: Bound::Original,
            quality: Quality::max(),
        }),
        Relationship::VideoThumbnail => Action::Still(thumbnail),
        Relationship::VideoSmall => Action::Still(small),
        Relationship::VideoPoster => Action::Still(large),
        Relationship::VideoResized if file.is_web_supported() => Action::Symlink,
        Relationship::VideoResized => Action::Transcode,
        Relationship::VideoConversion => Action::Transcode,
        Relationship::FsCopy => Action::Copy,
        Relationship::FsSymlink => Action::Symlink,
        Relationship::FsHardlink => Action::Hardlink,
        Relationship::FsLink => return None,
    };
    Some(action)
}

/// Produces artifacts. Called from queue workers, hence `Sync`.
pub trait Transcoder: Sync {
    /// Produce `dest` from `source`. The parent directory of `dest` exists.
    fn produce(&self, action: &Action, source: &Path, dest: &Path) -> Result<(), TranscodeError>;
}

/// Default transcoder: images through an [`ImageBackend`], links and copies
/// through `std::fs`. Video encoding is not available.
pub struct MediaTranscoder<B: ImageBackend> {
    backend: B,
}

impl<B: ImageBackend> MediaTranscoder<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn resize(&self, spec: &ResizeSpec, source: &Path, dest: &Path) -> Result<(), TranscodeError> {
        let dims = self.backend.identify(source)?;
        match *spec {
            ResizeSpec::Square { size, quality } => {
                let size = square_edge((dims.width, dims.height), size);
                self.backend.thumbnail(&ThumbnailParams {
                    source: source.to_path_buf(),
                    output: dest.to_path_buf(),
                    size,
                    quality,
                    sharpening: Some(Sharpening::light()),
                })?;
            }
            ResizeSpec::Fit { bound, quality } => {
                let (width, height) = fit_dimensions((dims.width, dims.height), bound);
                self.backend.resize(&ResizeParams {
                    source: source.to_path_buf(),
                    output: dest.to_path_buf(),
                    width,
                    height,
                    quality,
                })?;
            }
        }
        Ok(())
    }
}

impl<B: ImageBackend> Transcoder for MediaTranscoder<B> {
    fn produce(&self, action: &Action, source: &Path, dest: &Path) -> Result<(), TranscodeError> {
        tracing::debug!("{} {} -> {}", action, source.display(), dest.display());
        match action {
            Action::Resize(spec) => self.resize(spec, source, dest),
            Action::Still(_) | Action::Transcode => {
                Err(TranscodeError::Unsupported(action.to_string()))
            }
            Action::Copy => {
                remove_existing(dest)?;
                fs::copy(source, dest).map_err(io_error(dest))?;
                Ok(())
            }
            Action::Symlink => {
                remove_existing(dest)?;
                symlink(source, dest)
            }
            Action::Hardlink => {
                remove_existing(dest)?;
                fs::hard_link(source, dest).map_err(io_error(dest))
            }
        }
    }
}

/// Remove whatever sits at `dest`, including dangling symlinks.
fn remove_existing(dest: &Path) -> Result<(), TranscodeError> {
    match fs::symlink_metadata(dest) {
        Ok(_) => fs::remove_file(dest).map_err(io_error(dest)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(TranscodeError::Io {
            path: dest.to_path_buf(),
            source,
        }),
    }
}

#[cfg(unix)]
fn symlink(source: &Path, dest: &Path) -> Result<(), TranscodeError> {
    std::os::unix::fs::symlink(source, dest).map_err(io_error(dest))
}

#[cfg(not(unix))]
fn symlink(_source: &Path, _dest: &Path) -> Result<(), TranscodeError> {
    Err(TranscodeError::Unsupported("symlink".to_string()))
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Move a freshly converted file to `target` and leave a symlink at `dest`.
///
/// A `dest` that is already a symlink was relocated by an earlier build and
/// is left alone. If the symlink cannot be created the file is moved back.
pub fn relocate_converted(dest: &Path, target: &Path) -> Result<(), TranscodeError> {
    if is_symlink(dest) {
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    move_file(dest, target)?;
    if let Err(e) = symlink(target, dest) {
        tracing::error!("cannot link {} -> {}: {}", dest.display(), target.display(), e);
        move_file(target, dest)?;
        return Err(e);
    }
    Ok(())
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), TranscodeError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(io_error(to))?;
    fs::remove_file(from).map_err(io_error(from))
}
