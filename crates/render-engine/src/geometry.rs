//! Placement of the live video on the output canvas.

use mockshot_common::error::{MockshotError, MockshotResult};
use mockshot_mockup_model::geometry::{BoundingBox, ClipRadius, GeometryRect};
use mockshot_mockup_model::surface::ChromeStyle;

/// Resolve where video frames land on an `out_w x out_h` canvas and how
/// much their corners are rounded.
///
/// Pure and cheap: the recorder calls it on every draw tick so a container
/// resize mid-export is picked up.
pub fn resolve_geometry(
    container: &BoundingBox,
    video: &BoundingBox,
    out_w: u32,
    out_h: u32,
    chrome: &ChromeStyle,
) -> MockshotResult<(GeometryRect, ClipRadius)> {
    if container.is_degenerate() {
        return Err(MockshotError::acquisition(format!(
            "mockup container has no area ({}x{})",
            container.width, container.height
        )));
    }
    if out_w == 0 || out_h == 0 {
        return Err(MockshotError::acquisition(format!(
            "output resolution {out_w}x{out_h} has no area"
        )));
    }

    let rect = video.project(container, out_w, out_h);

    if !chrome.clips_content() {
        return Ok((rect, ClipRadius::ZERO));
    }

    let scale = (out_w as f64 / container.width).min(out_h as f64 / container.height);
    let half_min = (rect.min_dimension() / 2.0).max(0.0);
    let radius = (chrome.corner_radius_px * scale).clamp(0.0, half_min);

    Ok((rect, ClipRadius(radius)))
}
