//! Pixel work for photo artifacts, pure Rust via the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `ImageReader::into_dimensions` (format sniffed) |
//! | **Fit resize** | `DynamicImage::resize` (Lanczos3), never upscaled |
//! | **Square thumbnail** | `resize_to_fill` + `unsharpen` |
//! | **Encode** | JPEG (quality), PNG, GIF, lossless WebP by output extension |
//!
//! The module is split into:
//! - **Calculations**: pure dimension math (unit testable)
//! - **Parameters**: what to produce, independent of how
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{fit_dimensions, square_edge};
pub use params::{Bound, Quality, ResizeParams, Sharpening, ThumbnailParams};
pub use rust_backend::RustBackend;
