//! Chrome-only template capture.

use std::sync::Arc;

use image::RgbaImage;
use mockshot_capture_engine::guard::{MediaStateGuard, RestoreMode};
use mockshot_common::error::{MockshotError, MockshotResult};
use mockshot_mockup_model::media::MediaElement;
use mockshot_mockup_model::surface::{exclude_media, MockupSurface};

/// Static raster of a mockup with every media layer left out.
#[derive(Debug, Clone)]
pub struct RasterTemplate {
    image: RgbaImage,
}

impl RasterTemplate {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Renders the mockup chrome without the live video.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameSnapshotter;

impl FrameSnapshotter {
    pub fn new() -> Self {
        Self
    }

    /// Rasterize `surface` at `width x height` with `video` hidden.
    ///
    /// The video is muted and hidden for the duration of the rasterization
    /// and its visibility, mute, and volume are put back afterwards, on the
    /// error path too.
    pub fn capture(
        &self,
        surface: &dyn MockupSurface,
        video: &Arc<dyn MediaElement>,
        width: u32,
        height: u32,
    ) -> MockshotResult<RasterTemplate> {
        let guard = MediaStateGuard::capture(std::slice::from_ref(video), RestoreMode::Presentation);
        video.set_muted(true);
        video.set_visible(false);

        let rasterized = surface.rasterize(width, height, &exclude_media);
        guard.restore();

        match rasterized {
            Ok(image) => {
                tracing::debug!(width, height, video = video.id(), "Captured chrome template");
                Ok(RasterTemplate::new(image))
            }
            Err(e) => Err(MockshotError::acquisition(format!(
                "rasterization failed: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use mockshot_common::clock::{Clock, ManualClock};
    use mockshot_mockup_model::geometry::BoundingBox;
    use mockshot_mockup_model::memory::MemoryClip;
    use mockshot_mockup_model::surface::{ChromeStyle, LayerKind};

    use crate::surface::{Layer, LayeredSurface};

    fn video() -> Arc<dyn MediaElement> {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        Arc::new(MemoryClip::new("video", 3.0, clock).with_solid_frames(4, 4, 2))
    }

    fn surface(video: &Arc<dyn MediaElement>) -> LayeredSurface {
        LayeredSurface::new(10.0, 10.0, ChromeStyle::plain())
            .with_layer(Layer::fill(
                "bg",
                LayerKind::Background,
                BoundingBox::sized(10.0, 10.0),
                Rgba([255, 255, 255, 255]),
                0.0,
            ))
            .with_layer(Layer::media(BoundingBox::sized(10.0, 10.0), Arc::clone(video)))
    }

    #[test]
    fn test_template_excludes_video_and_restores_state() {
        let video = video();
        video.set_volume(0.7);
        let template = FrameSnapshotter::new()
            .capture(&surface(&video), &video, 20, 20)
            .unwrap();

        assert!(template
            .image()
            .pixels()
            .all(|p| *p == Rgba([255, 255, 255, 255])));
        assert!(video.is_visible());
        assert!(!video.is_muted());
        assert_eq!(video.volume(), 0.7);
    }

    #[test]
    fn test_failed_rasterization_is_acquisition_error_and_restores() {
        let video = video();
        let err = FrameSnapshotter::new()
            .capture(&surface(&video), &video, 0, 20)
            .unwrap_err();
        assert!(matches!(err, MockshotError::Acquisition { .. }));
        assert!(video.is_visible());
        assert!(!video.is_muted());
    }
}
