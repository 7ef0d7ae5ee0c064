//! Output container/codec negotiation.

use std::fmt;
use std::str::FromStr;

use mockshot_common::error::{MockshotError, MockshotResult};
use serde::{Deserialize, Serialize};

/// A container/codec pair the recorder can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoFormat {
    /// MP4 with H.264 video.
    Mp4Avc1,
    /// WebM with VP9 video.
    WebmVp9,
    /// WebM with the VP8 baseline codec.
    Webm,
}

impl VideoFormat {
    /// Every candidate, in default preference order.
    pub const ALL: [VideoFormat; 3] = [VideoFormat::Mp4Avc1, VideoFormat::WebmVp9, VideoFormat::Webm];

    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoFormat::Mp4Avc1 => "video/mp4;codecs=avc1",
            VideoFormat::WebmVp9 => "video/webm;codecs=vp9",
            VideoFormat::Webm => "video/webm",
        }
    }

    /// Mime type of the produced file, without codec parameters.
    pub fn container_mime(&self) -> &'static str {
        match self {
            VideoFormat::Mp4Avc1 => "video/mp4",
            VideoFormat::WebmVp9 | VideoFormat::Webm => "video/webm",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Mp4Avc1 => "mp4",
            VideoFormat::WebmVp9 | VideoFormat::Webm => "webm",
        }
    }

    pub fn codec(&self) -> &'static str {
        match self {
            VideoFormat::Mp4Avc1 => "avc1",
            VideoFormat::WebmVp9 => "vp9",
            VideoFormat::Webm => "vp8",
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

impl FromStr for VideoFormat {
    type Err = MockshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        match normalized.to_ascii_lowercase().as_str() {
            "video/mp4;codecs=avc1" | "mp4" | "h264" => Ok(VideoFormat::Mp4Avc1),
            "video/webm;codecs=vp9" | "vp9" => Ok(VideoFormat::WebmVp9),
            "video/webm" | "webm" | "vp8" => Ok(VideoFormat::Webm),
            _ => Err(MockshotError::config(format!(
                "Unknown video format: {s}. Use: video/mp4;codecs=avc1, video/webm;codecs=vp9, video/webm"
            ))),
        }
    }
}

/// Parse a configured preference list, keeping only known candidates.
///
/// Unknown entries are logged and skipped; an empty result falls back to
/// [`VideoFormat::ALL`].
pub fn preference_from_config(entries: &[String]) -> Vec<VideoFormat> {
    let mut order = Vec::with_capacity(VideoFormat::ALL.len());
    for entry in entries {
        match entry.parse::<VideoFormat>() {
            Ok(format) if !order.contains(&format) => order.push(format),
            Ok(_) => {}
            Err(e) => tracing::warn!(entry = %entry, error = %e, "Ignoring codec preference"),
        }
    }
    if order.is_empty() {
        order.extend(VideoFormat::ALL);
    }
    order
}

/// Pick the first format in `preference` that `is_supported` accepts.
pub fn negotiate(
    preference: &[VideoFormat],
    is_supported: impl Fn(&str) -> bool,
) -> MockshotResult<VideoFormat> {
    for format in preference {
        if is_supported(format.mime_type()) {
            tracing::info!(format = %format, "Negotiated output format");
            return Ok(*format);
        }
        tracing::debug!(format = %format, "Output format not supported");
    }
    Err(MockshotError::encoding("no supported codec"))
}
