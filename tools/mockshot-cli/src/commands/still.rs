//! Export a framed screenshot.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use mockshot_common::clock::SystemClock;
use mockshot_common::config::AppConfig;
use mockshot_mockup_model::job::StillFormat;
use mockshot_mockup_model::surface::MockupSurface;
use mockshot_render_engine::{ExportContext, LayerContent, LayeredSurface};

use super::{build_compositor, describe_delivery, output_size, ChromeArg};

pub async fn run(
    config: &AppConfig,
    input: PathBuf,
    chrome: ChromeArg,
    format: Option<String>,
    size: (Option<u32>, Option<u32>),
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let format: StillFormat = format
        .as_deref()
        .unwrap_or(&config.export.still_format)
        .parse()?;

    let screenshot = image::open(&input)
        .with_context(|| format!("Failed to open image {}", input.display()))?
        .to_rgba8();
    let (w, h) = screenshot.dimensions();

    let surface = LayeredSurface::framed(
        chrome.into(),
        w as f64,
        h as f64,
        LayerContent::Image(Arc::new(screenshot)),
    );
    let (out_w, out_h) = output_size(surface.bounding_box(), size);

    println!("Framing screenshot: {}", input.display());
    println!("  Chrome: {chrome:?}");
    println!("  Format: {}", format.extension());
    println!("  Resolution: {out_w}x{out_h}");

    let compositor = build_compositor(config, Arc::new(SystemClock::start()), output, false, None);
    let ctx = ExportContext::new(Arc::new(surface), out_w, out_h);
    let outcome = compositor.export_still(&ctx, format).await?;

    println!(
        "Export complete: {} ({} bytes)",
        describe_delivery(&outcome.delivery),
        outcome.bytes
    );
    Ok(())
}
