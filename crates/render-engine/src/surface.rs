//! A mockup surface assembled from flat layers.
//!
//! [`LayeredSurface`] is the concrete [`MockupSurface`] used by the CLI and
//! the tests: an ordered list of fills, images, and media elements laid out
//! in surface space. Rasterization paints the accepted layers back to front
//! onto a transparent canvas at the requested output size.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use mockshot_common::error::{MockshotError, MockshotResult};
use mockshot_mockup_model::geometry::{BoundingBox, ClipRadius};
use mockshot_mockup_model::media::MediaElement;
use mockshot_mockup_model::surface::{ChromeKind, ChromeStyle, LayerKind, MockupSurface};

use crate::compositor::{draw_scaled, fill, ClipSpans};
use crate::geometry::resolve_geometry;

const BACKDROP: Rgba<u8> = Rgba([236, 239, 244, 255]);
const BEZEL: Rgba<u8> = Rgba([24, 24, 27, 255]);
const TITLE_BAR: Rgba<u8> = Rgba([226, 228, 233, 255]);
const TRAFFIC_LIGHTS: [Rgba<u8>; 3] = [
    Rgba([255, 95, 87, 255]),
    Rgba([254, 188, 46, 255]),
    Rgba([40, 200, 64, 255]),
];

/// What a layer paints.
#[derive(Debug, Clone)]
pub enum LayerContent {
    /// Solid color with rounded corners (radius in surface pixels).
    Fill { color: Rgba<u8>, corner_radius: f64 },
    /// A static bitmap stretched over the layer bounds.
    Image(Arc<RgbaImage>),
    /// A live media element; paints its current frame.
    Media(Arc<dyn MediaElement>),
}

/// One entry in the visual tree.
#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub kind: LayerKind,
    pub bounds: BoundingBox,
    pub content: LayerContent,
}

impl Layer {
    pub fn fill(
        name: impl Into<String>,
        kind: LayerKind,
        bounds: BoundingBox,
        color: Rgba<u8>,
        corner_radius: f64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            bounds,
            content: LayerContent::Fill {
                color,
                corner_radius,
            },
        }
    }

    pub fn image(name: impl Into<String>, bounds: BoundingBox, image: Arc<RgbaImage>) -> Self {
        Self {
            name: name.into(),
            kind: LayerKind::Content,
            bounds,
            content: LayerContent::Image(image),
        }
    }

    pub fn media(bounds: BoundingBox, element: Arc<dyn MediaElement>) -> Self {
        Self {
            name: element.id().to_string(),
            kind: LayerKind::Media,
            bounds,
            content: LayerContent::Media(element),
        }
    }
}

/// A mockup surface made of layers painted in insertion order.
#[derive(Debug, Clone)]
pub struct LayeredSurface {
    bounds: BoundingBox,
    chrome: ChromeStyle,
    layers: Vec<Layer>,
}

impl LayeredSurface {
    pub fn new(width: f64, height: f64, chrome: ChromeStyle) -> Self {
        Self {
            bounds: BoundingBox::sized(width, height),
            chrome,
            layers: Vec::new(),
        }
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Build a framed mockup around `content_w x content_h` of content.
    ///
    /// The content box sits inside the chrome; `content` decides whether it
    /// shows a screenshot or a live element.
    pub fn framed(kind: ChromeKind, content_w: f64, content_h: f64, content: LayerContent) -> Self {
        match kind {
            ChromeKind::Device => {
                let (pad, bezel, screen_r) = (48.0, 18.0, 36.0);
                let w = content_w + 2.0 * (pad + bezel);
                let h = content_h + 2.0 * (pad + bezel);
                let screen = BoundingBox::new(pad + bezel, pad + bezel, content_w, content_h);
                Self::new(w, h, ChromeStyle::new(ChromeKind::Device, screen_r))
                    .with_layer(Layer::fill(
                        "backdrop",
                        LayerKind::Background,
                        BoundingBox::sized(w, h),
                        BACKDROP,
                        0.0,
                    ))
                    .with_layer(Layer::fill(
                        "bezel",
                        LayerKind::Chrome,
                        BoundingBox::new(pad, pad, content_w + 2.0 * bezel, content_h + 2.0 * bezel),
                        BEZEL,
                        screen_r + bezel,
                    ))
                    .with_layer(content_layer(screen, content))
            }
            ChromeKind::Browser => {
                let (pad, bar, radius) = (40.0, 36.0, 10.0);
                let w = content_w + 2.0 * pad;
                let h = content_h + bar + 2.0 * pad;
                let viewport = BoundingBox::new(pad, pad + bar, content_w, content_h);
                let mut surface = Self::new(w, h, ChromeStyle::new(ChromeKind::Browser, radius))
                    .with_layer(Layer::fill(
                        "backdrop",
                        LayerKind::Background,
                        BoundingBox::sized(w, h),
                        BACKDROP,
                        0.0,
                    ))
                    .with_layer(Layer::fill(
                        "window",
                        LayerKind::Chrome,
                        BoundingBox::new(pad, pad, content_w, content_h + bar),
                        TITLE_BAR,
                        radius,
                    ));
                for (i, color) in TRAFFIC_LIGHTS.iter().enumerate() {
                    let d = 12.0;
                    surface.push(Layer::fill(
                        format!("traffic-light-{i}"),
                        LayerKind::Chrome,
                        BoundingBox::new(pad + 14.0 + i as f64 * 20.0, pad + (bar - d) / 2.0, d, d),
                        *color,
                        d / 2.0,
                    ));
                }
                surface.with_layer(content_layer(viewport, content))
            }
            ChromeKind::Plain => {
                let pad = 32.0;
                let w = content_w + 2.0 * pad;
                let h = content_h + 2.0 * pad;
                Self::new(w, h, ChromeStyle::plain())
                    .with_layer(Layer::fill(
                        "backdrop",
                        LayerKind::Background,
                        BoundingBox::sized(w, h),
                        BACKDROP,
                        0.0,
                    ))
                    .with_layer(content_layer(
                        BoundingBox::new(pad, pad, content_w, content_h),
                        content,
                    ))
            }
        }
    }

    fn paint(&self, canvas: &mut RgbaImage, layer: &Layer) -> MockshotResult<()> {
        let (w, h) = canvas.dimensions();
        match &layer.content {
            LayerContent::Fill {
                color,
                corner_radius,
            } => {
                let rect = layer.bounds.project(&self.bounds, w, h);
                let scale = (w as f64 / self.bounds.width).min(h as f64 / self.bounds.height);
                let spans = ClipSpans::build(rect, ClipRadius(corner_radius * scale), w, h);
                fill(canvas, *color, &spans);
            }
            LayerContent::Image(image) => {
                let (rect, radius) = resolve_geometry(&self.bounds, &layer.bounds, w, h, &self.chrome)?;
                let spans = ClipSpans::build(rect, radius, w, h);
                draw_scaled(canvas, image, rect, &spans);
            }
            LayerContent::Media(element) => {
                if !element.is_visible() {
                    return Ok(());
                }
                let Some(frame) = element.current_frame() else {
                    return Ok(());
                };
                let (rect, radius) = resolve_geometry(&self.bounds, &layer.bounds, w, h, &self.chrome)?;
                let spans = ClipSpans::build(rect, radius, w, h);
                draw_scaled(canvas, &frame, rect, &spans);
            }
        }
        Ok(())
    }
}

fn content_layer(bounds: BoundingBox, content: LayerContent) -> Layer {
    match content {
        LayerContent::Media(element) => Layer::media(bounds, element),
        LayerContent::Image(image) => Layer::image("screen", bounds, image),
        fill @ LayerContent::Fill { .. } => Layer {
            name: "screen".to_string(),
            kind: LayerKind::Content,
            bounds,
            content: fill,
        },
    }
}

impl MockupSurface for LayeredSurface {
    fn bounding_box(&self) -> BoundingBox {
        self.bounds
    }

    fn element_bounds(&self, element_id: &str) -> Option<BoundingBox> {
        self.layers.iter().find_map(|layer| match &layer.content {
            LayerContent::Media(element) if element.id() == element_id => Some(layer.bounds),
            _ => None,
        })
    }

    fn media_elements(&self) -> Vec<Arc<dyn MediaElement>> {
        self.layers
            .iter()
            .filter_map(|layer| match &layer.content {
                LayerContent::Media(element) => Some(Arc::clone(element)),
                _ => None,
            })
            .collect()
    }

    fn chrome(&self) -> ChromeStyle {
        self.chrome
    }

    fn rasterize(
        &self,
        width: u32,
        height: u32,
        include: &dyn Fn(LayerKind) -> bool,
    ) -> MockshotResult<RgbaImage> {
        if self.bounds.is_degenerate() || width == 0 || height == 0 {
            return Err(MockshotError::render(format!(
                "cannot rasterize a {}x{} surface at {width}x{height}",
                self.bounds.width, self.bounds.height
            )));
        }

        let mut canvas = RgbaImage::new(width, height);
        let mut painted = 0usize;
        for layer in self.layers.iter().filter(|l| include(l.kind)) {
            self.paint(&mut canvas, layer)?;
            painted += 1;
        }
        tracing::debug!(width, height, layers = painted, "Rasterized surface");
        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockshot_common::clock::{Clock, ManualClock};
    use mockshot_mockup_model::memory::MemoryClip;
    use mockshot_mockup_model::surface::{exclude_media, include_all};

    fn clip() -> Arc<dyn MediaElement> {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        Arc::new(MemoryClip::new("video", 3.0, clock).with_solid_frames(8, 8, 1))
    }

    fn plain_surface(element: Arc<dyn MediaElement>) -> LayeredSurface {
        LayeredSurface::new(100.0, 100.0, ChromeStyle::plain())
            .with_layer(Layer::fill(
                "bg",
                LayerKind::Background,
                BoundingBox::sized(100.0, 100.0),
                Rgba([0, 0, 255, 255]),
                0.0,
            ))
            .with_layer(Layer::media(BoundingBox::new(25.0, 25.0, 50.0, 50.0), element))
    }

    #[test]
    fn test_excluding_media_leaves_background() {
        let surface = plain_surface(clip());
        let template = surface.rasterize(100, 100, &exclude_media).unwrap();
        assert_eq!(*template.get_pixel(50, 50), Rgba([0, 0, 255, 255]));

        let full = surface.rasterize(100, 100, &include_all).unwrap();
        assert_ne!(*full.get_pixel(50, 50), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_hidden_media_is_not_painted() {
        let element = clip();
        let surface = plain_surface(Arc::clone(&element));
        element.set_visible(false);
        let full = surface.rasterize(100, 100, &include_all).unwrap();
        assert_eq!(*full.get_pixel(50, 50), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_rasterize_scales_to_output() {
        let surface = plain_surface(clip());
        let out = surface.rasterize(200, 50, &exclude_media).unwrap();
        assert_eq!(out.dimensions(), (200, 50));
    }

    #[test]
    fn test_element_lookup() {
        let surface = plain_surface(clip());
        assert_eq!(
            surface.element_bounds("video"),
            Some(BoundingBox::new(25.0, 25.0, 50.0, 50.0))
        );
        assert_eq!(surface.element_bounds("missing"), None);
        assert_eq!(surface.media_elements().len(), 1);
    }

    #[test]
    fn test_framed_device_has_rounded_screen() {
        let surface = LayeredSurface::framed(
            ChromeKind::Device,
            390.0,
            844.0,
            LayerContent::Media(clip()),
        );
        assert!(surface.chrome().clips_content());
        let bounds = surface.element_bounds("video").unwrap();
        assert_eq!((bounds.width, bounds.height), (390.0, 844.0));
    }

    #[test]
    fn test_zero_output_size_is_render_error() {
        let err = plain_surface(clip()).rasterize(0, 10, &include_all).unwrap_err();
        assert!(matches!(err, MockshotError::Render { .. }));
    }
}
