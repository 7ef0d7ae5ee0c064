//! Mockshot CLI — frame screenshots and screen recordings in device chrome.
//!
//! Usage:
//!   mockshot still <IMAGE>     Export a framed still image
//!   mockshot video <VIDEO>     Record a framed video mockup
//!   mockshot codecs            Show output codec negotiation
//!   mockshot check             Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mockshot_common::config::AppConfig;

mod commands;

use commands::ChromeArg;

#[derive(Parser)]
#[command(
    name = "mockshot",
    about = "Device and browser mockups for screenshots and screen recordings",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Frame a screenshot and export it as an image
    Still {
        /// Screenshot to frame
        input: PathBuf,

        /// Chrome drawn around the screenshot
        #[arg(long, value_enum, default_value = "device")]
        chrome: ChromeArg,

        /// Image format: png, jpeg, svg (defaults to the configured format)
        #[arg(short, long)]
        format: Option<String>,

        /// Output width (defaults to the mockup's natural size)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (defaults to the mockup's natural size)
        #[arg(long)]
        height: Option<u32>,

        /// Download directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Record a video clip inside a mockup
    Video {
        /// Clip to record
        input: PathBuf,

        /// Chrome drawn around the clip
        #[arg(long, value_enum, default_value = "device")]
        chrome: ChromeArg,

        /// Output width (defaults to the mockup's natural size)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (defaults to the mockup's natural size)
        #[arg(long)]
        height: Option<u32>,

        /// Target FPS (defaults to the configured frame rate)
        #[arg(long)]
        fps: Option<u32>,

        /// Always download instead of trying the clipboard first
        #[arg(long)]
        no_clipboard: bool,

        /// Download directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show which output codecs are available and which one is picked
    Codecs,

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    mockshot_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Still {
            input,
            chrome,
            format,
            width,
            height,
            output,
        } => commands::still::run(&config, input, chrome, format, (width, height), output).await,
        Commands::Video {
            input,
            chrome,
            width,
            height,
            fps,
            no_clipboard,
            output,
        } => {
            commands::video::run(
                &config,
                input,
                chrome,
                (width, height),
                fps,
                !no_clipboard,
                output,
            )
            .await
        }
        Commands::Codecs => commands::codecs::run(&config),
        Commands::Check => commands::check::run(&config),
    }
}
