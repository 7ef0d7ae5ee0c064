//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where downloaded exports are written.
    pub output_dir: PathBuf,

    /// Default export settings.
    pub export: ExportDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDefaults {
    /// Product name used as the output file stem.
    pub product_name: String,

    /// Frame rate of video mockups.
    pub frame_rate: u32,

    /// Still image format ("png", "jpeg" or "svg").
    pub still_format: String,

    /// Video mime types in negotiation order.
    pub codec_preference: Vec<String>,

    /// Try the system clipboard before falling back to a download.
    pub use_clipboard: bool,

    /// Upper bounds for awaited steps.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Timeouts for the awaitable steps of an export, in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub metadata_ms: u64,
    pub seek_ms: u64,
    pub finalize_ms: u64,
    pub clipboard_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "mockshot=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            export: ExportDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            product_name: "mockshot".to_string(),
            frame_rate: 30,
            still_format: "png".to_string(),
            codec_preference: vec![
                "video/mp4;codecs=avc1".to_string(),
                "video/webm;codecs=vp9".to_string(),
                "video/webm".to_string(),
            ],
            use_clipboard: true,
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            metadata_ms: 10_000,
            seek_ms: 5_000,
            finalize_ms: 60_000,
            clipboard_ms: 5_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("mockshot").join("config.json")
}

/// Default download directory.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_DOWNLOAD_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join("Downloads")
        });
    base.join("mockshot")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_codec_order_prefers_mp4() {
        let defaults = ExportDefaults::default();
        assert_eq!(defaults.frame_rate, 30);
        assert_eq!(defaults.codec_preference[0], "video/mp4;codecs=avc1");
        assert_eq!(defaults.codec_preference.len(), 3);
    }

    #[test]
    fn test_missing_timeouts_fall_back_to_defaults() {
        let json = r#"{
            "product_name": "shots",
            "frame_rate": 24,
            "still_format": "jpeg",
            "codec_preference": ["video/webm"],
            "use_clipboard": false
        }"#;
        let parsed: ExportDefaults = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.product_name, "shots");
        assert_eq!(parsed.timeouts.seek_ms, TimeoutConfig::default().seek_ms);
    }
}
