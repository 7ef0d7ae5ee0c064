//! Show output codec negotiation.

use mockshot_common::config::AppConfig;
use mockshot_render_engine::codec::{negotiate, preference_from_config};
use mockshot_render_engine::encoder::{EncoderFactory, FfmpegEncoderFactory};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let factory = FfmpegEncoderFactory::default();
    let preference = preference_from_config(&config.export.codec_preference);

    println!("Output codecs (in preference order)");
    println!("{}", "=".repeat(50));
    for format in &preference {
        let supported = factory.is_type_supported(format.mime_type());
        println!(
            "[{}] {:<24} .{}",
            if supported { "OK" } else { "--" },
            format.mime_type(),
            format.extension()
        );
    }

    println!();
    match negotiate(&preference, |mime| factory.is_type_supported(mime)) {
        Ok(format) => println!("Video exports will use {format}"),
        Err(e) => println!("Video export unavailable: {e}"),
    }
    Ok(())
}
