//! Export entry points.
//!
//! [`Compositor`] is the single front door for still and video exports. It
//! owns one job slot (a second export while one runs is rejected with
//! `Busy`), the event bus UI collaborators subscribe to, and the cancel
//! handle for the running video job.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbaImage};
use mockshot_common::error::{MockshotError, MockshotResult};
use mockshot_mockup_model::job::{
    ExportEvent, ExportJob, ExportKind, JobStatus, ProgressCallback, StillFormat,
};
use mockshot_mockup_model::media::{MediaElement, MediaKind};
use mockshot_mockup_model::surface::{include_all, MockupSurface};
use tokio::sync::{broadcast, Mutex};

use crate::recorder::CompositeRecorder;
use crate::sink::{Delivery, ExportSink};

/// Capacity of the event bus; slow subscribers lag rather than block.
const EVENT_CAPACITY: usize = 64;

/// Everything an export needs from the caller.
#[derive(Clone)]
pub struct ExportContext {
    pub surface: Arc<dyn MockupSurface>,
    /// The live video to record. When `None`, the first video element on
    /// the surface is used.
    pub video: Option<Arc<dyn MediaElement>>,
    pub output_width: u32,
    pub output_height: u32,
}

impl std::fmt::Debug for ExportContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportContext")
            .field("surface", &self.surface)
            .field("video", &self.video.as_ref().map(|v| v.id().to_string()))
            .field("output_width", &self.output_width)
            .field("output_height", &self.output_height)
            .finish()
    }
}

impl ExportContext {
    pub fn new(surface: Arc<dyn MockupSurface>, output_width: u32, output_height: u32) -> Self {
        Self {
            surface,
            video: None,
            output_width,
            output_height,
        }
    }

    pub fn with_video(mut self, video: Arc<dyn MediaElement>) -> Self {
        self.video = Some(video);
        self
    }

    fn resolve_video(&self) -> MockshotResult<Arc<dyn MediaElement>> {
        self.video
            .clone()
            .or_else(|| {
                self.surface
                    .media_elements()
                    .into_iter()
                    .find(|e| e.kind() == MediaKind::Video)
            })
            .ok_or_else(|| MockshotError::acquisition("no video element on the mockup"))
    }
}

/// Result of a finished export.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub job: ExportJob,
    pub delivery: Delivery,
    pub bytes: usize,
    pub mime_type: String,
}

/// Publishes `DownloadMode { active: true }` while alive and
/// `DownloadMode { active: false }` when dropped.
struct DownloadMode<'a> {
    events: &'a broadcast::Sender<ExportEvent>,
}

impl<'a> DownloadMode<'a> {
    fn enter(events: &'a broadcast::Sender<ExportEvent>) -> Self {
        let _ = events.send(ExportEvent::DownloadMode { active: true });
        Self { events }
    }
}

impl Drop for DownloadMode<'_> {
    fn drop(&mut self) {
        let _ = self.events.send(ExportEvent::DownloadMode { active: false });
    }
}

/// Runs still and video exports for one mockup editor.
pub struct Compositor {
    recorder: CompositeRecorder,
    sink: ExportSink,
    events: broadcast::Sender<ExportEvent>,
    slot: Mutex<()>,
    cancel: Arc<AtomicBool>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("recorder", &self.recorder)
            .field("sink", &self.sink)
            .field("busy", &self.is_busy())
            .finish()
    }
}

impl Compositor {
    pub fn new(recorder: CompositeRecorder, sink: ExportSink) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            recorder: recorder.with_events(events.clone()),
            sink,
            events,
            slot: Mutex::new(()),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExportEvent> {
        self.events.subscribe()
    }

    /// Handle that cancels the running video export when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_busy(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    /// Rasterize the whole mockup and deliver it as a still image.
    pub async fn export_still(
        &self,
        ctx: &ExportContext,
        format: StillFormat,
    ) -> MockshotResult<ExportOutcome> {
        let _slot = self.slot.try_lock().map_err(|_| MockshotError::Busy)?;
        let _mode = DownloadMode::enter(&self.events);

        let mut job = ExportJob::still(ctx.output_width, ctx.output_height);
        job.mime_type = Some(format.mime_type().to_string());
        self.publish(&job);

        match self.run_still(&mut job, ctx, format).await {
            Ok((delivery, bytes)) => Ok(ExportOutcome {
                job,
                delivery,
                bytes,
                mime_type: format.mime_type().to_string(),
            }),
            Err(e) => {
                tracing::warn!(job = job.id, error = %e, "Still export failed");
                job.fail(e.to_string());
                self.publish(&job);
                Err(e)
            }
        }
    }

    async fn run_still(
        &self,
        job: &mut ExportJob,
        ctx: &ExportContext,
        format: StillFormat,
    ) -> MockshotResult<(Delivery, usize)> {
        self.advance(job, JobStatus::Capturing)?;
        let image = ctx
            .surface
            .rasterize(ctx.output_width, ctx.output_height, &include_all)
            .map_err(|e| MockshotError::acquisition(format!("rasterization failed: {e}")))?;

        self.advance(job, JobStatus::Encoding)?;
        let bytes = encode_still(&image, format)?;

        let delivery = self
            .sink
            .deliver(&bytes, ExportKind::StillImage, format.mime_type())
            .await?;
        self.advance(job, JobStatus::Done)?;

        tracing::info!(
            job = job.id,
            format = format.extension(),
            bytes = bytes.len(),
            "Still export complete"
        );
        Ok((delivery, bytes.len()))
    }

    /// Record the mockup with its live video and deliver the result.
    pub async fn export_video(
        &self,
        ctx: &ExportContext,
        progress: Option<ProgressCallback>,
    ) -> MockshotResult<ExportOutcome> {
        let _slot = self.slot.try_lock().map_err(|_| MockshotError::Busy)?;
        let video = ctx.resolve_video()?;
        let _mode = DownloadMode::enter(&self.events);
        self.cancel.store(false, Ordering::SeqCst);

        let mut job = ExportJob::video(
            ctx.output_width,
            ctx.output_height,
            self.recorder.settings().frame_rate,
        );
        self.publish(&job);

        let media = self
            .recorder
            .record(
                &mut job,
                ctx.surface.as_ref(),
                &video,
                progress.as_ref(),
                &self.cancel,
            )
            .await?;

        let delivery = match self
            .sink
            .deliver(&media.bytes, ExportKind::VideoMockup, media.mime_type())
            .await
        {
            Ok(delivery) => delivery,
            Err(e) => {
                self.recorder.abandon(&mut job, &e);
                return Err(e);
            }
        };
        self.recorder.complete(&mut job)?;

        Ok(ExportOutcome {
            job,
            delivery,
            bytes: media.bytes.len(),
            mime_type: media.mime_type().to_string(),
        })
    }

    fn advance(&self, job: &mut ExportJob, next: JobStatus) -> MockshotResult<()> {
        job.transition(next)?;
        self.publish(job);
        Ok(())
    }

    fn publish(&self, job: &ExportJob) {
        let _ = self.events.send(ExportEvent::StatusChanged {
            job_id: job.id,
            kind: job.kind,
            status: job.status,
        });
    }
}

/// Encode a rasterized mockup in `format`.
pub fn encode_still(image: &RgbaImage, format: StillFormat) -> MockshotResult<Vec<u8>> {
    let mut buf = Vec::new();
    match format {
        StillFormat::Png => {
            image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        StillFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)?;
        }
        StillFormat::Svg => {
            let png = encode_still(image, StillFormat::Png)?;
            let data = base64::engine::general_purpose::STANDARD.encode(png);
            let (w, h) = image.dimensions();
            buf = format!(
                "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\
<image width=\"{w}\" height=\"{h}\" href=\"data:image/png;base64,{data}\"/></svg>"
            )
            .into_bytes();
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn image() -> RgbaImage {
        RgbaImage::from_pixel(4, 3, Rgba([255, 0, 0, 128]))
    }

    #[test]
    fn test_png_roundtrips_dimensions() {
        let bytes = encode_still(&image(), StillFormat::Png).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn test_jpeg_drops_alpha() {
        let bytes = encode_still(&image(), StillFormat::Jpeg).unwrap();
        assert!(bytes.starts_with(&[0xFF, 0xD8]));
    }

    #[test]
    fn test_svg_embeds_png() {
        let bytes = encode_still(&image(), StillFormat::Svg).unwrap();
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("viewBox=\"0 0 4 3\""));
        assert!(svg.contains("data:image/png;base64,iVBORw0KGgo"));
    }
}
