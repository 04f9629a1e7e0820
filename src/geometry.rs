//! Geometry helpers for placing images and centred text

use crate::types::Size;

/// Uniformly scale `source` so it fits inside `bounds`, preserving aspect ratio.
///
/// Degenerate sources (zero or negative extent) collapse to zero size so callers
/// can treat them as undrawable.
pub fn fit_within(source: Size, bounds: Size) -> Size {
    if source.width <= 0.0 || source.height <= 0.0 {
        return Size::new(0.0, 0.0);
    }
    let scale = (bounds.width / source.width).min(bounds.height / source.height);
    Size::new(source.width * scale, source.height * scale)
}

/// X coordinate that centres a run of `text_width` on a page of `page_width`
pub fn centered_x(page_width: f64, text_width: f64) -> f64 {
    (page_width - text_width) / 2.0
}
