//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait covers the three operations photo artifacts
//! need: identify, resize, and thumbnail. The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::{ResizeParams, ThumbnailParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` because jobs call it from the worker pool.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Resize to exact dimensions and encode by output extension.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;

    /// Fill-resize, center-crop to a square, optionally sharpen.
    fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::{Quality, Sharpening};
    use std::sync::Mutex;

    /// Mock backend that records operations without executing them.
    /// Uses Mutex (not RefCell) so it is Sync and works from rayon workers.
    #[derive(Default)]
    pub struct MockBackend {
        /// Returned by every identify call.
        pub dimensions: Option<Dimensions>,
        /// Sources whose operations fail.
        pub failing: Vec<String>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Resize {
            source: String,
            output: String,
            width: u32,
            height: u32,
            quality: u32,
        },
        Thumbnail {
            source: String,
            output: String,
            size: u32,
            sharpened: bool,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::with_dimensions(4000, 3000)
        }

        pub fn with_dimensions(width: u32, height: u32) -> Self {
            Self {
                dimensions: Some(Dimensions { width, height }),
                ..Self::default()
            }
        }

        pub fn failing_on(mut self, source_suffix: &str) -> Self {
            self.failing.push(source_suffix.to_string());
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        fn check(&self, source: &Path) -> Result<(), BackendError> {
            let source = source.to_string_lossy();
            if self.failing.iter().any(|f| source.ends_with(f.as_str())) {
                return Err(BackendError::ProcessingFailed(format!(
                    "mock failure for {source}"
                )));
            }
            Ok(())
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));
            self.check(path)?;
            self.dimensions
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }

        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                quality: params.quality.value(),
            });
            self.check(&params.source)
        }

        fn thumbnail(&self, params: &ThumbnailParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Thumbnail {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                size: params.size,
                sharpened: params.sharpening.is_some(),
            });
            self.check(&params.source)
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(800, 600);
        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result, Dimensions { width: 800, height: 600 });

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_records_resize() {
        let backend = MockBackend::new();
        backend
            .resize(&ResizeParams {
                source: "/source.jpg".into(),
                output: "/small.jpg".into(),
                width: 640,
                height: 480,
                quality: Quality::new(90),
            })
            .unwrap();

        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Resize {
                width: 640,
                height: 480,
                quality: 90,
                ..
            }
        ));
    }

    #[test]
    fn mock_fails_on_configured_source() {
        let backend = MockBackend::new().failing_on("broken.jpg");
        let result = backend.thumbnail(&ThumbnailParams {
            source: "/in/broken.jpg".into(),
            output: "/out/thumb.jpg".into(),
            size: 120,
            quality: Quality::default(),
            sharpening: Some(Sharpening::light()),
        });
        assert!(result.is_err());
        // Still recorded: the attempt happened.
        assert_eq!(backend.get_operations().len(), 1);
    }
}
