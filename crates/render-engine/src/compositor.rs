//! Frame compositor: draws rounded-clipped images onto an RGBA canvas.
//!
//! A clip is described by a [`RoundedRectPath`] (four edges joined by four
//! quarter arcs, the same shape a 2D canvas builds with `arcTo`). Before
//! drawing, the path is flattened into per-row horizontal spans; pixels on
//! the span edges get fractional coverage so rounded corners are
//! anti-aliased. Span lists are cached by [`ClippedFrameDrawer`], which
//! makes the per-frame path allocation-free once the geometry settles.

use std::f64::consts::{FRAC_PI_2, PI};

use image::{Rgba, RgbaImage};
use mockshot_common::error::{MockshotError, MockshotResult};
use mockshot_mockup_model::geometry::{ClipRadius, GeometryRect};

/// One segment of a clip path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    Line {
        from: (f64, f64),
        to: (f64, f64),
    },
    /// Clockwise arc around `center`; angles in radians, y pointing down.
    Arc {
        center: (f64, f64),
        radius: f64,
        start_angle: f64,
        end_angle: f64,
    },
}

/// A rectangle with uniformly rounded corners.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundedRectPath {
    rect: GeometryRect,
    radius: f64,
    segments: [PathSegment; 8],
}

impl RoundedRectPath {
    /// Build the path; `radius` is clamped to half the smaller side.
    pub fn new(rect: GeometryRect, radius: ClipRadius) -> Self {
        let r = radius.value().clamp(0.0, (rect.min_dimension() / 2.0).max(0.0));
        let (x, y, right, bottom) = (rect.x, rect.y, rect.right(), rect.bottom());

        let segments = [
            PathSegment::Line {
                from: (x + r, y),
                to: (right - r, y),
            },
            PathSegment::Arc {
                center: (right - r, y + r),
                radius: r,
                start_angle: -FRAC_PI_2,
                end_angle: 0.0,
            },
            PathSegment::Line {
                from: (right, y + r),
                to: (right, bottom - r),
            },
            PathSegment::Arc {
                center: (right - r, bottom - r),
                radius: r,
                start_angle: 0.0,
                end_angle: FRAC_PI_2,
            },
            PathSegment::Line {
                from: (right - r, bottom),
                to: (x + r, bottom),
            },
            PathSegment::Arc {
                center: (x + r, bottom - r),
                radius: r,
                start_angle: FRAC_PI_2,
                end_angle: PI,
            },
            PathSegment::Line {
                from: (x, bottom - r),
                to: (x, y + r),
            },
            PathSegment::Arc {
                center: (x + r, y + r),
                radius: r,
                start_angle: PI,
                end_angle: PI + FRAC_PI_2,
            },
        ];

        Self {
            rect,
            radius: r,
            segments,
        }
    }

    pub fn rect(&self) -> GeometryRect {
        self.rect
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The inside of the path along the horizontal line at `y`.
    pub fn horizontal_span(&self, y: f64) -> Option<(f64, f64)> {
        let rect = self.rect;
        if rect.is_empty() || y < rect.y || y > rect.bottom() {
            return None;
        }
        let r = self.radius;
        let dy = if y < rect.y + r {
            rect.y + r - y
        } else if y > rect.bottom() - r {
            y - (rect.bottom() - r)
        } else {
            0.0
        };
        let inset = r - (r * r - dy * dy).max(0.0).sqrt();
        Some((rect.x + inset, rect.right() - inset))
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.horizontal_span(y)
            .map(|(left, right)| x >= left && x <= right)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy)]
struct RowSpan {
    y: u32,
    left: f64,
    right: f64,
    /// Vertical coverage of this pixel row by the rect.
    weight: f32,
}

/// A clip path flattened into pixel rows for one canvas size.
#[derive(Debug, Clone)]
pub struct ClipSpans {
    rect: GeometryRect,
    radius: ClipRadius,
    canvas: (u32, u32),
    rows: Vec<RowSpan>,
}

impl ClipSpans {
    pub fn build(rect: GeometryRect, radius: ClipRadius, canvas_w: u32, canvas_h: u32) -> Self {
        let path = RoundedRectPath::new(rect, radius);
        let mut rows = Vec::new();
        if let Some((_, y0, _, y1)) = rect.pixel_bounds(canvas_w, canvas_h) {
            rows.reserve((y1 - y0) as usize);
            for y in y0..y1 {
                let top = y as f64;
                let weight = ((top + 1.0).min(rect.bottom()) - top.max(rect.y)).clamp(0.0, 1.0);
                if weight <= 0.0 {
                    continue;
                }
                let sample_y = (top + 0.5).clamp(rect.y, rect.bottom());
                if let Some((left, right)) = path.horizontal_span(sample_y) {
                    rows.push(RowSpan {
                        y,
                        left,
                        right,
                        weight: weight as f32,
                    });
                }
            }
        }
        Self {
            rect,
            radius,
            canvas: (canvas_w, canvas_h),
            rows,
        }
    }

    fn matches(&self, rect: GeometryRect, radius: ClipRadius, canvas_w: u32, canvas_h: u32) -> bool {
        self.rect == rect && self.radius == radius && self.canvas == (canvas_w, canvas_h)
    }

    /// Iterate `(x, y, coverage)` for every pixel with non-zero coverage.
    fn for_each_pixel(&self, mut f: impl FnMut(u32, u32, f32)) {
        let canvas_w = self.canvas.0;
        for row in &self.rows {
            let x0 = row.left.floor().max(0.0) as u32;
            let x1 = (row.right.ceil().max(0.0) as u32).min(canvas_w);
            for x in x0..x1 {
                let left = x as f64;
                let horizontal = ((left + 1.0).min(row.right) - left.max(row.left)).clamp(0.0, 1.0);
                let coverage = horizontal as f32 * row.weight;
                if coverage > 0.0 {
                    f(x, row.y, coverage);
                }
            }
        }
    }
}

/// Draw `src` scaled into `rect` on `dest`, restricted to `spans`.
pub fn draw_scaled(dest: &mut RgbaImage, src: &RgbaImage, rect: GeometryRect, spans: &ClipSpans) {
    let (sw, sh) = src.dimensions();
    if sw == 0 || sh == 0 || rect.is_empty() {
        return;
    }
    let scale_x = sw as f64 / rect.width;
    let scale_y = sh as f64 / rect.height;
    spans.for_each_pixel(|x, y, coverage| {
        let u = (x as f64 + 0.5 - rect.x) * scale_x - 0.5;
        let v = (y as f64 + 0.5 - rect.y) * scale_y - 0.5;
        let sample = sample_bilinear(src, u, v);
        blend(dest.get_pixel_mut(x, y), sample, coverage);
    });
}

/// Fill `spans` on `dest` with a solid color.
pub fn fill(dest: &mut RgbaImage, color: Rgba<u8>, spans: &ClipSpans) {
    let c = [
        color[0] as f32,
        color[1] as f32,
        color[2] as f32,
        color[3] as f32,
    ];
    spans.for_each_pixel(|x, y, coverage| blend(dest.get_pixel_mut(x, y), c, coverage));
}

fn sample_bilinear(src: &RgbaImage, u: f64, v: f64) -> [f32; 4] {
    let (w, h) = src.dimensions();
    let u = u.clamp(0.0, (w - 1) as f64);
    let v = v.clamp(0.0, (h - 1) as f64);
    let x0 = u.floor() as u32;
    let y0 = v.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = (u - x0 as f64) as f32;
    let fy = (v - y0 as f64) as f32;

    let p00 = src.get_pixel(x0, y0).0;
    let p10 = src.get_pixel(x1, y0).0;
    let p01 = src.get_pixel(x0, y1).0;
    let p11 = src.get_pixel(x1, y1).0;

    let mut out = [0.0f32; 4];
    for c in 0..4 {
        let top = p00[c] as f32 + (p10[c] as f32 - p00[c] as f32) * fx;
        let bottom = p01[c] as f32 + (p11[c] as f32 - p01[c] as f32) * fx;
        out[c] = top + (bottom - top) * fy;
    }
    out
}

fn blend(dst: &mut Rgba<u8>, src: [f32; 4], coverage: f32) {
    let alpha = (src[3] / 255.0) * coverage;
    if alpha <= 0.0 {
        return;
    }
    let inv = 1.0 - alpha;
    for c in 0..3 {
        dst[c] = (src[c] * alpha + dst[c] as f32 * inv).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (alpha * 255.0 + dst[3] as f32 * inv).round().clamp(0.0, 255.0) as u8;
}

/// Draws one output frame: the static template plus the live video frame
/// clipped to the chrome's rounded content region.
#[derive(Debug, Default)]
pub struct ClippedFrameDrawer {
    spans: Option<ClipSpans>,
    frames_drawn: u64,
}

impl ClippedFrameDrawer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `draw_frame` calls that completed.
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Compose one frame into `dest`.
    ///
    /// `dest` is overwritten with `template`, then `frame` (if the video has
    /// one to present) is drawn scaled into `rect`, clipped to rounded
    /// corners when `radius > 0`. Calling it twice with the same inputs
    /// produces the same pixels.
    pub fn draw_frame(
        &mut self,
        dest: &mut RgbaImage,
        template: &RgbaImage,
        frame: Option<&RgbaImage>,
        rect: GeometryRect,
        radius: ClipRadius,
    ) -> MockshotResult<()> {
        if dest.dimensions() != template.dimensions() {
            return Err(MockshotError::render(format!(
                "template is {}x{} but the canvas is {}x{}",
                template.width(),
                template.height(),
                dest.width(),
                dest.height()
            )));
        }

        dest.copy_from_slice(template.as_raw());

        if let Some(frame) = frame {
            let (w, h) = dest.dimensions();
            let stale = !self
                .spans
                .as_ref()
                .map(|s| s.matches(rect, radius, w, h))
                .unwrap_or(false);
            if stale {
                tracing::debug!(?rect, radius = radius.value(), "Rebuilding clip spans");
                self.spans = Some(ClipSpans::build(rect, radius, w, h));
            }
            if let Some(spans) = &self.spans {
                draw_scaled(dest, frame, rect, spans);
            }
        }

        self.frames_drawn += 1;
        Ok(())
    }
}
