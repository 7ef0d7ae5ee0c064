//! Mockup surface contract and chrome metadata.

use std::sync::Arc;

use image::RgbaImage;
use mockshot_common::error::MockshotResult;
use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;
use crate::media::MediaElement;

/// The decorative frame surrounding the content area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChromeKind {
    /// Phone/tablet/laptop bezel with a rounded screen.
    #[default]
    Device,
    /// Browser window with a title/address bar.
    Browser,
    /// Borderless or flat frame; content is never clipped.
    Plain,
}

/// Chrome metadata relevant to compositing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChromeStyle {
    pub kind: ChromeKind,

    /// Corner radius of the content region, in surface pixels.
    pub corner_radius_px: f64,
}

impl ChromeStyle {
    pub fn new(kind: ChromeKind, corner_radius_px: f64) -> Self {
        Self {
            kind,
            corner_radius_px,
        }
    }

    /// A flat frame with no rounding.
    pub fn plain() -> Self {
        Self::new(ChromeKind::Plain, 0.0)
    }

    /// Whether content inside this chrome is clipped to rounded corners.
    pub fn clips_content(&self) -> bool {
        !matches!(self.kind, ChromeKind::Plain)
            && self.corner_radius_px.is_finite()
            && self.corner_radius_px > 0.0
    }
}

impl Default for ChromeStyle {
    fn default() -> Self {
        Self::new(ChromeKind::Device, 0.0)
    }
}

/// Category of a layer in the visual tree, used by rasterization filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Background,
    Chrome,
    Content,
    Overlay,
    /// A live video or audio element.
    Media,
}

impl LayerKind {
    pub fn is_media(&self) -> bool {
        matches!(self, LayerKind::Media)
    }
}

/// Rasterization filter that keeps everything except media layers.
pub fn exclude_media(kind: LayerKind) -> bool {
    !kind.is_media()
}

/// Rasterization filter that keeps every layer.
pub fn include_all(_kind: LayerKind) -> bool {
    true
}

/// The composed visual tree (chrome + content) that gets exported.
pub trait MockupSurface: Send + Sync + std::fmt::Debug {
    /// Bounding box of the mockup container.
    fn bounding_box(&self) -> BoundingBox;

    /// Bounding box of a media element on this surface.
    fn element_bounds(&self, element_id: &str) -> Option<BoundingBox>;

    /// Every media element on the surface, in paint order.
    fn media_elements(&self) -> Vec<Arc<dyn MediaElement>>;

    fn chrome(&self) -> ChromeStyle;

    /// Rasterize the layers accepted by `include` into a bitmap of
    /// `width x height`.
    fn rasterize(
        &self,
        width: u32,
        height: u32,
        include: &dyn Fn(LayerKind) -> bool,
    ) -> MockshotResult<RgbaImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_chrome_never_clips() {
        assert!(!ChromeStyle::new(ChromeKind::Plain, 24.0).clips_content());
        assert!(ChromeStyle::new(ChromeKind::Device, 24.0).clips_content());
        assert!(ChromeStyle::new(ChromeKind::Browser, 8.0).clips_content());
        assert!(!ChromeStyle::new(ChromeKind::Device, 0.0).clips_content());
    }

    #[test]
    fn test_media_filter() {
        assert!(!exclude_media(LayerKind::Media));
        assert!(exclude_media(LayerKind::Chrome));
        assert!(include_all(LayerKind::Media));
    }
}
