//! Pure dimension math. No I/O.

use super::params::Bound;

/// Output dimensions for an aspect-preserving resize.
///
/// The constrained edge is clamped to the source edge, so images are never
/// upscaled. The other edge is rounded and never drops below 1.
pub fn fit_dimensions(source: (u32, u32), bound: Bound) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return source;
    }
    match bound {
        Bound::Original => source,
        Bound::Height(h) => {
            let h = h.min(src_h);
            let w = (src_w as f64 * h as f64 / src_h as f64).round() as u32;
            (w.max(1), h)
        }
        Bound::Width(w) => {
            let w = w.min(src_w);
            let h = (src_h as f64 * w as f64 / src_w as f64).round() as u32;
            (w, h.max(1))
        }
    }
}

/// Square thumbnails never exceed the source's short edge.
pub fn square_edge(source: (u32, u32), size: u32) -> u32 {
    size.min(source.0.min(source.1)).max(1)
}
