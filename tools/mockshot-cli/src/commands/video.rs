//! Record a video mockup.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use mockshot_capture_engine::ffmpeg::FileClip;
use mockshot_common::clock::{Clock, SystemClock};
use mockshot_common::config::AppConfig;
use mockshot_mockup_model::job::{ExportProgress, ProgressCallback};
use mockshot_mockup_model::media::MediaElement;
use mockshot_mockup_model::surface::MockupSurface;
use mockshot_render_engine::{ExportContext, LayerContent, LayeredSurface};

use super::{build_compositor, describe_delivery, output_size, ChromeArg};

pub async fn run(
    config: &AppConfig,
    input: PathBuf,
    chrome: ChromeArg,
    size: (Option<u32>, Option<u32>),
    fps: Option<u32>,
    use_clipboard: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::start());
    let fps = fps.unwrap_or(config.export.frame_rate).max(1);

    let clip = FileClip::open("video", &input, fps, clock.clone())?;
    let probe = clip.probe().clone();
    let video: Arc<dyn MediaElement> = Arc::new(clip);

    let surface = LayeredSurface::framed(
        chrome.into(),
        probe.width as f64,
        probe.height as f64,
        LayerContent::Media(Arc::clone(&video)),
    );
    let (out_w, out_h) = output_size(surface.bounding_box(), size);

    println!("Recording mockup of: {}", input.display());
    println!("  Chrome: {chrome:?}");
    println!("  Duration: {:.2}s", probe.duration_secs);
    println!("  Resolution: {out_w}x{out_h} @ {fps} fps");
    println!("  Audio: {}", if probe.has_audio { "yes" } else { "none" });

    let compositor = build_compositor(config, clock, output, use_clipboard, Some(fps));

    let cancel = compositor.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling export");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let progress_cb: ProgressCallback = Box::new(|p: ExportProgress| {
        print!(
            "\r  Progress: {:>3}% ({}/{} frames, ETA: {:.0}s)  ",
            p.percent(),
            p.frames_rendered,
            p.total_frames,
            p.eta_secs,
        );
        let _ = std::io::stdout().flush();
    });

    let ctx = ExportContext::new(Arc::new(surface), out_w, out_h).with_video(video);
    let result = compositor.export_video(&ctx, Some(progress_cb)).await;
    ctrl_c.abort();

    match result {
        Ok(outcome) => {
            println!(
                "\nExport complete: {} ({}, {} bytes)",
                describe_delivery(&outcome.delivery),
                outcome.mime_type,
                outcome.bytes
            );
            Ok(())
        }
        Err(e) => {
            println!("\nExport failed: {e}");
            Err(e.into())
        }
    }
}
