//! Page-space geometry: bounding boxes and tolerance matching.
//!
//! Two independent sources report figure geometry — the text-extraction
//! engine and the external structure-discovery tool — and they round
//! coordinates differently. Exact equality therefore never holds in
//! practice; an absolute closeness test on each coordinate does. The
//! tolerance is absolute and small on purpose: page-point coordinates are
//! at a fixed physical scale (1 pt = 1/72 in), so a relative tolerance
//! would be wrong for boxes near the page origin.

/// Default coordinate tolerance in page points.
pub const DEFAULT_TOLERANCE: f32 = 0.1;

/// A rectangle on the page in top-down page points: the origin is the
/// top-left corner and `top < bottom`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Width in page points.
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height in page points.
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// True when every coordinate pair is within `tolerance` of its
    /// counterpart. Symmetric in `self`/`other`.
    pub fn matches(&self, other: &BoundingBox, tolerance: f32) -> bool {
        (self.left - other.left).abs() <= tolerance
            && (self.top - other.top).abs() <= tolerance
            && (self.right - other.right).abs() <= tolerance
            && (self.bottom - other.bottom).abs() <= tolerance
    }
}
