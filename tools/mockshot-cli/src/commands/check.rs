//! Check system capabilities.

use mockshot_capture_engine::ffmpeg::command_exists;
use mockshot_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Mockshot System Check");
    println!("{}", "=".repeat(50));

    let required = [("ffmpeg", "video encoding and decoding"), ("ffprobe", "clip metadata")];
    let optional = [("wl-copy", "Wayland clipboard"), ("xclip", "X11 clipboard")];

    let mut all_required_ok = true;
    for (binary, purpose) in required {
        if command_exists(binary) {
            println!("[OK] {binary}: {purpose}");
        } else {
            all_required_ok = false;
            println!("[MISSING] {binary}: {purpose}");
        }
    }
    for (binary, purpose) in optional {
        let status = if command_exists(binary) { "OK" } else { "--" };
        println!("[{status}] {binary}: {purpose} (optional)");
    }

    let session = if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        "Wayland"
    } else if std::env::var_os("DISPLAY").is_some() {
        "X11"
    } else {
        "none (video exports will be downloaded)"
    };
    println!("[OK] Display session: {session}");

    println!();
    println!("Config file: {}", config_file_path().display());
    println!("Downloads:   {}", config.output_dir.display());
    println!("{}", serde_json::to_string_pretty(&config.export)?);

    println!();
    if all_required_ok {
        println!("All required capabilities are available. Mockshot is ready.");
    } else {
        println!("Some required capabilities are missing. Still exports work; video exports need ffmpeg.");
    }
    Ok(())
}
