//! Error types shared across Mockshot crates.

use std::path::PathBuf;

/// Top-level error type for Mockshot operations.
///
/// The first four variants form the export taxonomy: acquisition failures
/// happen before any encoder exists, encoding failures after capture was
/// attempted, permission failures are recoverable, and runtime failures
/// cover anything unexpected mid-capture.
#[derive(Debug, thiserror::Error)]
pub enum MockshotError {
    #[error("Acquisition error: {message}")]
    Acquisition { message: String },

    #[error("Encoding error: {message}")]
    Encoding { message: String },

    #[error("Permission denied: {message}")]
    Permission { message: String },

    #[error("Runtime error: {message}")]
    Runtime { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("An export is already running on this surface")]
    Busy,

    #[error("Export cancelled")]
    Cancelled,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using MockshotError.
pub type MockshotResult<T> = Result<T, MockshotError>;

impl MockshotError {
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition {
            message: msg.into(),
        }
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding {
            message: msg.into(),
        }
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::Permission {
            message: msg.into(),
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error must abort the job (as opposed to being
    /// substituted by an alternate successful path).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Permission { .. } | Self::Unsupported { .. })
    }
}
