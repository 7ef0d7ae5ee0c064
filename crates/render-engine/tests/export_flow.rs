use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use mockshot_common::clock::{Clock, ManualClock};
use mockshot_common::error::{MockshotError, MockshotResult};
use mockshot_mockup_model::job::{ExportEvent, JobStatus, StillFormat};
use mockshot_mockup_model::media::{AudioTrack, MediaElement};
use mockshot_mockup_model::memory::MemoryClip;
use mockshot_mockup_model::surface::ChromeKind;
use mockshot_render_engine::codec::VideoFormat;
use mockshot_render_engine::encoder::{EncoderFactory, MediaEncoder, OutputStream};
use mockshot_render_engine::sink::{ClipboardWriter, DirectoryDownloads, DownloadTarget};
use mockshot_render_engine::{
    CompositeRecorder, Compositor, Delivery, ExportContext, ExportSink, LayerContent,
    LayeredSurface, RecorderSettings,
};

#[derive(Default)]
struct CountingFactory {
    created: AtomicUsize,
    frames: Arc<AtomicUsize>,
}

struct CountingEncoder {
    frames: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaEncoder for CountingEncoder {
    fn start(&mut self, _stream: &OutputStream) -> MockshotResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, _frame: &RgbaImage, _timestamp: Duration) -> MockshotResult<()> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> MockshotResult<Vec<Vec<u8>>> {
        let frames = self.frames.load(Ordering::SeqCst);
        Ok(vec![vec![7u8; frames.max(1) * 4]])
    }
}

impl EncoderFactory for CountingFactory {
    fn is_type_supported(&self, mime: &str) -> bool {
        mime == "video/webm;codecs=vp9"
    }

    fn create(&self, _format: VideoFormat) -> MockshotResult<Box<dyn MediaEncoder>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingEncoder {
            frames: Arc::clone(&self.frames),
        }))
    }
}

struct RejectingClipboard {
    attempts: Mutex<u32>,
}

#[async_trait]
impl ClipboardWriter for RejectingClipboard {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn supports(&self, _mime: &str) -> bool {
        true
    }

    async fn write(&self, _payload: &[u8], _mime: &str) -> MockshotResult<()> {
        *self.attempts.lock().unwrap() += 1;
        Err(MockshotError::permission("clipboard write denied"))
    }
}

struct FullDisk;

#[async_trait]
impl DownloadTarget for FullDisk {
    async fn save(&self, _file_name: &str, _payload: &[u8]) -> MockshotResult<PathBuf> {
        Err(MockshotError::Io(std::io::Error::other("disk full")))
    }
}

struct Harness {
    clock: Arc<ManualClock>,
    compositor: Compositor,
    factory: Arc<CountingFactory>,
    clipboard: Arc<RejectingClipboard>,
    video: Arc<dyn MediaElement>,
    ctx: ExportContext,
    downloads: PathBuf,
}

fn harness(name: &str, duration: f64) -> Harness {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let video: Arc<dyn MediaElement> = Arc::new(
        MemoryClip::new("video", duration, clock.clone() as Arc<dyn Clock>)
            .with_solid_frames(64, 36, 24)
            .with_audio(AudioTrack {
                id: "audio-0".to_string(),
                label: "Stereo".to_string(),
                source: None,
            }),
    );
    let surface = Arc::new(LayeredSurface::framed(
        ChromeKind::Device,
        640.0,
        360.0,
        LayerContent::Media(Arc::clone(&video)),
    ));

    let downloads = std::env::temp_dir().join(format!(
        "mockshot-export-flow-{name}-{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&downloads);

    let factory = Arc::new(CountingFactory::default());
    let clipboard = Arc::new(RejectingClipboard {
        attempts: Mutex::new(0),
    });
    let recorder = CompositeRecorder::new(
        factory.clone(),
        clock.clone(),
        RecorderSettings::default(),
    );
    let sink = ExportSink::new(
        "mockshot",
        Arc::new(DirectoryDownloads::new(&downloads)),
        clock.clone(),
    )
    .with_clipboard(clipboard.clone());

    Harness {
        clock,
        compositor: Compositor::new(recorder, sink),
        factory,
        clipboard,
        ctx: ExportContext::new(surface, 640, 360).with_video(Arc::clone(&video)),
        video,
        downloads,
    }
}

#[tokio::test]
async fn video_export_falls_back_to_download_when_clipboard_rejects() {
    let h = harness("fallback", 3.0);

    let outcome = h
        .compositor
        .export_video(&h.ctx, None)
        .await
        .expect("export should succeed via the download fallback");

    assert_eq!(h.factory.frames.load(Ordering::SeqCst), 90);
    assert_eq!(*h.clipboard.attempts.lock().unwrap(), 1);
    assert_eq!(outcome.job.status, JobStatus::Done);
    assert_eq!(outcome.mime_type, "video/webm");

    let Delivery::Downloaded(path) = &outcome.delivery else {
        panic!("expected a download, got {:?}", outcome.delivery);
    };
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some("mockshot-video-1700000003000.webm")
    );
    assert_eq!(std::fs::read(path).unwrap().len(), outcome.bytes);

    assert!(!h.video.is_muted());
    assert!(h.video.volume() > 0.0);
    let _ = std::fs::remove_dir_all(&h.downloads);
}

#[tokio::test]
async fn infinite_duration_fails_before_any_encoder_exists() {
    let h = harness("infinite", f64::INFINITY);

    let err = h
        .compositor
        .export_video(&h.ctx, None)
        .await
        .expect_err("an unbounded clip cannot be recorded");

    assert!(matches!(err, MockshotError::Acquisition { .. }));
    assert_eq!(h.factory.created.load(Ordering::SeqCst), 0);
    assert!(!h.compositor.is_busy());
    assert!(!h.video.is_muted());
}

#[tokio::test]
async fn second_export_while_capturing_is_busy() {
    let h = harness("busy", 1.0);

    let (first, second) = tokio::join!(h.compositor.export_video(&h.ctx, None), async {
        tokio::task::yield_now().await;
        h.compositor.export_still(&h.ctx, StillFormat::Png).await
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(MockshotError::Busy)));
    let _ = std::fs::remove_dir_all(&h.downloads);
}

#[tokio::test]
async fn download_mode_brackets_every_export() {
    let h = harness("events", 0.5);
    let mut events = h.compositor.subscribe();

    h.compositor
        .export_still(&h.ctx, StillFormat::Svg)
        .await
        .expect("still export should succeed");

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.first(), Some(&ExportEvent::DownloadMode { active: true }));
    assert_eq!(seen.last(), Some(&ExportEvent::DownloadMode { active: false }));
    assert!(seen.iter().any(|e| matches!(
        e,
        ExportEvent::StatusChanged {
            status: JobStatus::Done,
            ..
        }
    )));

    let svg = std::fs::read_to_string(h.downloads.join("mockshot.svg")).unwrap();
    assert!(svg.contains("data:image/png;base64,"));
    let _ = std::fs::remove_dir_all(&h.downloads);
}

#[tokio::test]
async fn cancel_stops_running_export_and_restores_media() {
    let h = harness("cancel", 3.0);
    let cancel = h.compositor.cancel_handle();

    let (result, _) = tokio::join!(h.compositor.export_video(&h.ctx, None), async {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        cancel.store(true, Ordering::SeqCst);
    });

    assert!(matches!(result, Err(MockshotError::Cancelled)));
    assert!(h.factory.frames.load(Ordering::SeqCst) < 90);
    assert!(!h.video.is_muted());
    assert!(h.video.controls_enabled());
}

#[tokio::test]
async fn failed_delivery_marks_video_job_failed() {
    let h = harness("undelivered", 1.0);
    let recorder = CompositeRecorder::new(
        h.factory.clone(),
        h.clock.clone(),
        RecorderSettings::default(),
    );
    let sink = ExportSink::new("mockshot", Arc::new(FullDisk), h.clock.clone())
        .with_clipboard(h.clipboard.clone());
    let compositor = Compositor::new(recorder, sink);
    let mut events = compositor.subscribe();

    let err = compositor
        .export_video(&h.ctx, None)
        .await
        .expect_err("nowhere to put the video");
    assert!(err.to_string().contains("disk full"));

    let mut statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ExportEvent::StatusChanged { status, .. } = event {
            statuses.push(status);
        }
    }
    assert_eq!(statuses.last(), Some(&JobStatus::Failed));
    assert!(!statuses.contains(&JobStatus::Done));
    assert!(!compositor.is_busy());
    assert!(!h.video.is_muted());
}
