//! Timed recording of a mockup with its live video.
//!
//! [`CompositeRecorder::record`] drives one video job through
//! `Pending -> Capturing -> Encoding` (or `Failed`) and hands back the
//! encoded payload; [`CompositeRecorder::complete`] marks it `Done` once
//! the payload has been delivered. Recording captures the
//! chrome template once, pulls the clip's audio, silences every element,
//! then redraws the video into the template on a fixed frame grid and feeds
//! each canvas to the negotiated encoder. Playback state of every media
//! element is restored exactly once when the job ends, however it ends.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use image::RgbaImage;
use mockshot_capture_engine::audio::AudioTrackBridge;
use mockshot_capture_engine::guard::{silence, MediaStateGuard, RestoreMode};
use mockshot_common::clock::{Clock, FramePacer};
use mockshot_common::config::ExportDefaults;
use mockshot_common::error::{MockshotError, MockshotResult};
use mockshot_mockup_model::job::{ExportEvent, ExportJob, ExportProgress, JobStatus, ProgressCallback};
use mockshot_mockup_model::media::{is_recordable_duration, MediaElement};
use mockshot_mockup_model::surface::MockupSurface;
use tokio::sync::broadcast;

use crate::codec::{negotiate, preference_from_config, VideoFormat};
use crate::compositor::ClippedFrameDrawer;
use crate::encoder::{EncoderFactory, MediaEncoder, OutputStream};
use crate::geometry::resolve_geometry;
use crate::snapshot::{FrameSnapshotter, RasterTemplate};

/// Recorder tunables.
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    /// Used when the job does not carry its own frame rate.
    pub frame_rate: u32,
    pub codec_preference: Vec<VideoFormat>,
    pub metadata_timeout: Duration,
    pub seek_timeout: Duration,
    pub finalize_timeout: Duration,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self::from_config(&ExportDefaults::default())
    }
}

impl RecorderSettings {
    pub fn from_config(defaults: &ExportDefaults) -> Self {
        Self {
            frame_rate: defaults.frame_rate.max(1),
            codec_preference: preference_from_config(&defaults.codec_preference),
            metadata_timeout: Duration::from_millis(defaults.timeouts.metadata_ms),
            seek_timeout: Duration::from_millis(defaults.timeouts.seek_ms),
            finalize_timeout: Duration::from_millis(defaults.timeouts.finalize_ms),
        }
    }
}

/// Output of a finished recording.
#[derive(Debug, Clone)]
pub struct RecordedMedia {
    pub bytes: Vec<u8>,
    /// Number of chunks the encoder produced.
    pub chunks: usize,
    pub format: VideoFormat,
    pub frames_drawn: u64,
    pub duration_secs: f64,
}

impl RecordedMedia {
    pub fn mime_type(&self) -> &'static str {
        self.format.container_mime()
    }
}

/// Records a mockup surface and its live video into an encoded stream.
pub struct CompositeRecorder {
    factory: Arc<dyn EncoderFactory>,
    clock: Arc<dyn Clock>,
    settings: RecorderSettings,
    events: Option<broadcast::Sender<ExportEvent>>,
}

impl std::fmt::Debug for CompositeRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeRecorder")
            .field("settings", &self.settings)
            .finish()
    }
}

impl CompositeRecorder {
    pub fn new(
        factory: Arc<dyn EncoderFactory>,
        clock: Arc<dyn Clock>,
        settings: RecorderSettings,
    ) -> Self {
        Self {
            factory,
            clock,
            settings,
            events: None,
        }
    }

    /// Publish job status changes on `events`.
    pub fn with_events(mut self, events: broadcast::Sender<ExportEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn settings(&self) -> &RecorderSettings {
        &self.settings
    }

    /// Record `video` composited into `surface`.
    ///
    /// `job` must be a pending video job. On success it is left in
    /// `Encoding` with the payload ready for delivery; otherwise it ends
    /// `Failed`. Setting `cancel` stops the job at the next tick.
    pub async fn record(
        &self,
        job: &mut ExportJob,
        surface: &dyn MockupSurface,
        video: &Arc<dyn MediaElement>,
        progress: Option<&ProgressCallback>,
        cancel: &AtomicBool,
    ) -> MockshotResult<RecordedMedia> {
        let mut elements = surface.media_elements();
        if !elements.iter().any(|e| e.id() == video.id()) {
            elements.push(Arc::clone(video));
        }

        tracing::info!(
            job = job.id,
            width = job.output_width,
            height = job.output_height,
            elements = elements.len(),
            "Starting video export"
        );

        let guard = MediaStateGuard::capture(&elements, RestoreMode::Usable);
        let outcome = AssertUnwindSafe(self.run(job, surface, video, &elements, progress, cancel))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(MockshotError::runtime(format!(
                "capture task panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };
        guard.restore();

        match &result {
            Ok(media) => tracing::info!(
                job = job.id,
                bytes = media.bytes.len(),
                frames = media.frames_drawn,
                format = %media.format,
                "Video export complete"
            ),
            Err(e) => {
                tracing::warn!(job = job.id, error = %e, "Video export failed");
                job.fail(e.to_string());
                self.publish(job);
                report(progress, job, 0, 0, 0.0, 0.0);
            }
        }
        result
    }

    async fn run(
        &self,
        job: &mut ExportJob,
        surface: &dyn MockupSurface,
        video: &Arc<dyn MediaElement>,
        elements: &[Arc<dyn MediaElement>],
        progress: Option<&ProgressCallback>,
        cancel: &AtomicBool,
    ) -> MockshotResult<RecordedMedia> {
        match tokio::time::timeout(self.settings.metadata_timeout, video.wait_for_metadata()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(MockshotError::acquisition(format!("media not loaded: {e}")))
            }
            Err(_) => return Err(MockshotError::acquisition("media not loaded")),
        }

        let duration = video.duration_secs();
        if !is_recordable_duration(duration) {
            tracing::warn!(job = job.id, duration, "Refusing to record clip");
            return Err(MockshotError::acquisition("invalid duration"));
        }
        if surface.element_bounds(video.id()).is_none() {
            return Err(MockshotError::acquisition(format!(
                "video element {} is not on the surface",
                video.id()
            )));
        }
        job.duration_secs = Some(duration);

        self.advance(job, JobStatus::Capturing)?;

        let (width, height) = (job.output_width, job.output_height);
        let template = FrameSnapshotter::new().capture(surface, video, width, height)?;
        let audio = AudioTrackBridge::new().acquire(video);
        silence(elements);

        let format = negotiate(&self.settings.codec_preference, |mime| {
            self.factory.is_type_supported(mime)
        })?;
        job.mime_type = Some(format.container_mime().to_string());

        let fps = job.frame_rate.unwrap_or(self.settings.frame_rate).max(1);
        let stream = OutputStream {
            width,
            height,
            fps,
            duration_secs: duration,
            audio,
            format,
        };
        let mut encoder = self.factory.create(format)?;
        encoder.start(&stream)?;

        video.set_current_time(0.0);
        if tokio::time::timeout(self.settings.seek_timeout, video.wait_for_seek())
            .await
            .is_err()
        {
            tracing::warn!(job = job.id, "Seek to start timed out; recording from current position");
        }
        video.play()?;

        let drawn = self
            .capture_frames(
                job,
                surface,
                video,
                &template,
                encoder.as_mut(),
                (duration, fps),
                progress,
                cancel,
            )
            .await;
        video.pause();
        let drawn = drawn?;

        self.advance(job, JobStatus::Encoding)?;
        let chunks = tokio::time::timeout(self.settings.finalize_timeout, encoder.stop())
            .await
            .map_err(|_| MockshotError::encoding("encoder finalize timed out"))??;

        let chunk_count = chunks.len();
        let bytes = chunks.concat();
        if chunk_count == 0 || bytes.is_empty() {
            return Err(MockshotError::encoding("no data recorded"));
        }

        report(progress, job, drawn, drawn, 1.0, 0.0);

        Ok(RecordedMedia {
            bytes,
            chunks: chunk_count,
            format,
            frames_drawn: drawn,
            duration_secs: duration,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn capture_frames(
        &self,
        job: &ExportJob,
        surface: &dyn MockupSurface,
        video: &Arc<dyn MediaElement>,
        template: &RasterTemplate,
        encoder: &mut dyn MediaEncoder,
        (duration, fps): (f64, u32),
        progress: Option<&ProgressCallback>,
        cancel: &AtomicBool,
    ) -> MockshotResult<u64> {
        let pacer = FramePacer::new(fps);
        let budget = pacer.frame_budget(duration);
        let (width, height) = template.dimensions();
        let mut canvas = RgbaImage::new(width, height);
        let mut drawer = ClippedFrameDrawer::new();
        let chrome = surface.chrome();

        let start = self.clock.now();
        let mut drawn = 0u64;
        tracing::debug!(job = job.id, budget, fps, "Capture loop started");

        loop {
            if cancel.load(Ordering::Relaxed) {
                tracing::info!(job = job.id, frames = drawn, "Export cancelled");
                return Err(MockshotError::Cancelled);
            }

            let elapsed = self.clock.now().saturating_sub(start);
            let elapsed_secs = elapsed.as_secs_f64();
            if elapsed_secs >= duration || drawn >= budget {
                break;
            }

            // Re-read boxes every tick so a container resize is picked up.
            let video_box = surface.element_bounds(video.id()).ok_or_else(|| {
                MockshotError::acquisition(format!("video element {} left the surface", video.id()))
            })?;
            let (rect, radius) =
                resolve_geometry(&surface.bounding_box(), &video_box, width, height, &chrome)?;
            let frame = video.current_frame();
            drawer.draw_frame(&mut canvas, template.image(), frame.as_deref(), rect, radius)?;
            encoder.push_frame(&canvas, elapsed)?;
            drawn += 1;

            let fraction = (elapsed_secs / duration).min(1.0);
            report(
                progress,
                job,
                drawn,
                budget,
                fraction,
                (duration - elapsed_secs).max(0.0),
            );

            self.clock.sleep_until(pacer.deadline(start, drawn)).await;
        }

        tracing::debug!(job = job.id, frames = drawn, budget, "Capture loop finished");
        Ok(drawn)
    }

    /// Mark a recorded job `Done` after its payload was delivered.
    pub fn complete(&self, job: &mut ExportJob) -> MockshotResult<()> {
        self.advance(job, JobStatus::Done)
    }

    /// Mark a recorded job `Failed` when its payload could not be delivered.
    pub fn abandon(&self, job: &mut ExportJob, error: &MockshotError) {
        tracing::warn!(job = job.id, error = %error, "Recorded video was not delivered");
        job.fail(error.to_string());
        self.publish(job);
    }

    fn advance(&self, job: &mut ExportJob, next: JobStatus) -> MockshotResult<()> {
        job.transition(next)?;
        self.publish(job);
        Ok(())
    }

    fn publish(&self, job: &ExportJob) {
        if let Some(events) = &self.events {
            let _ = events.send(ExportEvent::StatusChanged {
                job_id: job.id,
                kind: job.kind,
                status: job.status,
            });
        }
    }
}

fn report(
    progress: Option<&ProgressCallback>,
    job: &ExportJob,
    frames_rendered: u64,
    total_frames: u64,
    fraction: f64,
    eta_secs: f64,
) {
    if let Some(cb) = progress {
        cb(ExportProgress {
            progress: fraction,
            frames_rendered,
            total_frames,
            eta_secs,
            status: job.status,
        });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
