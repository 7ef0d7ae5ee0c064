//! Rectangles in surface space and output space.
//!
//! Surface-space boxes are what a mockup surface reports for its container
//! and elements (CSS-like pixels). Output-space rects are measured on the
//! export canvas at the requested resolution.

use serde::{Deserialize, Serialize};

/// An on-screen bounding box in surface space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A box at the origin with the given size.
    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// True when the box cannot be used as a scaling reference.
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    /// Map this box into the output space of `container` scaled to
    /// `out_w x out_h`.
    pub fn project(&self, container: &BoundingBox, out_w: u32, out_h: u32) -> GeometryRect {
        let sx = out_w as f64 / container.width;
        let sy = out_h as f64 / container.height;
        GeometryRect {
            x: (self.x - container.x) * sx,
            y: (self.y - container.y) * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

/// The rectangle on the output canvas where video frames are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl GeometryRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// The smaller of width and height.
    pub fn min_dimension(&self) -> f64 {
        self.width.min(self.height)
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Integer pixel rows/columns touched by this rect, clipped to a
    /// `canvas_w x canvas_h` canvas. Returns `(x0, y0, x1, y1)` with
    /// exclusive upper bounds, or `None` if nothing is visible.
    pub fn pixel_bounds(&self, canvas_w: u32, canvas_h: u32) -> Option<(u32, u32, u32, u32)> {
        if self.is_empty() {
            return None;
        }
        let x0 = self.x.floor().max(0.0) as u32;
        let y0 = self.y.floor().max(0.0) as u32;
        let x1 = (self.right().ceil().max(0.0) as u32).min(canvas_w);
        let y1 = (self.bottom().ceil().max(0.0) as u32).min(canvas_h);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }
}

/// Corner radius applied when drawing video into a rounded chrome region.
///
/// Zero means "draw unclipped".
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct ClipRadius(pub f64);

impl ClipRadius {
    pub const ZERO: ClipRadius = ClipRadius(0.0);

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_clipped(&self) -> bool {
        self.0 > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_project_scales_relative_to_container() {
        let container = BoundingBox::new(100.0, 50.0, 400.0, 800.0);
        let video = BoundingBox::new(110.0, 60.0, 380.0, 780.0);
        let rect = video.project(&container, 1080, 1920);
        assert!((rect.x - 27.0).abs() < 1e-9);
        assert!((rect.y - 24.0).abs() < 1e-9);
        assert!((rect.width - 1026.0).abs() < 1e-9);
        assert!((rect.height - 1872.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_boxes() {
        assert!(BoundingBox::sized(0.0, 10.0).is_degenerate());
        assert!(BoundingBox::sized(10.0, f64::NAN).is_degenerate());
        assert!(!BoundingBox::sized(10.0, 10.0).is_degenerate());
    }

    #[test]
    fn test_pixel_bounds_clip_to_canvas() {
        let rect = GeometryRect::new(-5.5, 2.2, 20.0, 100.0);
        assert_eq!(rect.pixel_bounds(10, 50), Some((0, 2, 10, 50)));

        let offscreen = GeometryRect::new(20.0, 20.0, 5.0, 5.0);
        assert_eq!(offscreen.pixel_bounds(10, 10), None);
    }

    #[test]
    fn test_clip_radius_zero_is_unclipped() {
        assert!(!ClipRadius::ZERO.is_clipped());
        assert!(ClipRadius(0.5).is_clipped());
    }

    proptest! {
        #[test]
        fn pixel_bounds_stay_on_canvas(
            x in -500.0f64..2000.0,
            y in -500.0f64..2000.0,
            w in 0.0f64..2000.0,
            h in 0.0f64..2000.0,
            canvas_w in 1u32..1920,
            canvas_h in 1u32..1080,
        ) {
            if let Some((x0, y0, x1, y1)) = GeometryRect::new(x, y, w, h).pixel_bounds(canvas_w, canvas_h) {
                prop_assert!(x0 < x1 && x1 <= canvas_w);
                prop_assert!(y0 < y1 && y1 <= canvas_h);
            }
        }
    }
}
