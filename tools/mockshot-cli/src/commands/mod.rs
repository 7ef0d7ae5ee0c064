//! Subcommand implementations and the wiring they share.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use mockshot_common::clock::Clock;
use mockshot_common::config::AppConfig;
use mockshot_mockup_model::geometry::BoundingBox;
use mockshot_mockup_model::surface::ChromeKind;
use mockshot_render_engine::encoder::FfmpegEncoderFactory;
use mockshot_render_engine::sink::{CommandClipboard, DirectoryDownloads};
use mockshot_render_engine::{
    CompositeRecorder, Compositor, Delivery, ExportSink, RecorderSettings,
};

pub mod check;
pub mod codecs;
pub mod still;
pub mod video;

/// Chrome styles selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChromeArg {
    Device,
    Browser,
    Plain,
}

impl From<ChromeArg> for ChromeKind {
    fn from(arg: ChromeArg) -> Self {
        match arg {
            ChromeArg::Device => ChromeKind::Device,
            ChromeArg::Browser => ChromeKind::Browser,
            ChromeArg::Plain => ChromeKind::Plain,
        }
    }
}

/// Build a compositor from configuration and command-line overrides.
pub fn build_compositor(
    config: &AppConfig,
    clock: Arc<dyn Clock>,
    output: Option<PathBuf>,
    use_clipboard: bool,
    frame_rate: Option<u32>,
) -> Compositor {
    let mut settings = RecorderSettings::from_config(&config.export);
    if let Some(fps) = frame_rate {
        settings.frame_rate = fps.max(1);
    }

    let recorder = CompositeRecorder::new(
        Arc::new(FfmpegEncoderFactory::default()),
        clock.clone(),
        settings,
    );

    let downloads = output.unwrap_or_else(|| config.output_dir.clone());
    let mut sink = ExportSink::new(
        config.export.product_name.clone(),
        Arc::new(DirectoryDownloads::new(downloads)),
        clock,
    )
    .with_clipboard_timeout(Duration::from_millis(config.export.timeouts.clipboard_ms));

    if use_clipboard && config.export.use_clipboard {
        if let Some(clipboard) = CommandClipboard::detect() {
            sink = sink.with_clipboard(Arc::new(clipboard));
        }
    }

    Compositor::new(recorder, sink)
}

/// Output size: explicit dimensions win, a single one keeps the aspect
/// ratio of `natural`, neither means the natural size.
pub fn output_size(natural: BoundingBox, requested: (Option<u32>, Option<u32>)) -> (u32, u32) {
    let aspect = natural.width / natural.height;
    match requested {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, (w as f64 / aspect).round().max(1.0) as u32),
        (None, Some(h)) => ((h as f64 * aspect).round().max(1.0) as u32, h),
        (None, None) => (
            natural.width.round().max(1.0) as u32,
            natural.height.round().max(1.0) as u32,
        ),
    }
}

pub fn describe_delivery(delivery: &Delivery) -> String {
    match delivery {
        Delivery::Clipboard => "copied to clipboard".to_string(),
        Delivery::Downloaded(path) => format!("saved to {}", path.display()),
    }
}
