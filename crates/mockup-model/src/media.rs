//! Media element contract and playback snapshots.
//!
//! A media element is anything on a mockup surface that plays time-based
//! media: the live video inside a device frame, a background audio bed, and
//! so on. Elements are shared (`Arc<dyn MediaElement>`) between the surface
//! and the export pipeline, so all mutators take `&self`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;
use mockshot_common::error::MockshotResult;
use serde::{Deserialize, Serialize};

/// What kind of media an element plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

/// An audio track obtained from a capturable stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Track identifier, unique within its stream.
    pub id: String,

    /// Human-readable label.
    pub label: String,

    /// File the audio can be read from by an encoder, if any.
    pub source: Option<PathBuf>,
}

/// The result of asking an element for a capturable stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedStream {
    pub audio_tracks: Vec<AudioTrack>,
}

impl CapturedStream {
    pub fn first_audio_track(&self) -> Option<&AudioTrack> {
        self.audio_tracks.first()
    }
}

/// A live media element exposed by a mockup surface.
#[async_trait]
pub trait MediaElement: Send + Sync + std::fmt::Debug {
    /// Stable identifier of this element within its surface.
    fn id(&self) -> &str;

    fn kind(&self) -> MediaKind;

    /// Duration in seconds. `NaN` until metadata has loaded; may be
    /// infinite for live sources.
    fn duration_secs(&self) -> f64;

    /// Resolve once metadata (duration, dimensions) is available.
    async fn wait_for_metadata(&self) -> MockshotResult<()>;

    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Begin seeking to `secs`. Completion is observed with
    /// [`MediaElement::wait_for_seek`].
    fn set_current_time(&self, secs: f64);

    /// Resolve once the most recent seek has completed.
    async fn wait_for_seek(&self) -> MockshotResult<()>;

    fn is_paused(&self) -> bool;

    fn play(&self) -> MockshotResult<()>;

    fn pause(&self);

    fn is_muted(&self) -> bool;

    fn set_muted(&self, muted: bool);

    /// Volume in `[0.0, 1.0]`.
    fn volume(&self) -> f64;

    fn set_volume(&self, volume: f64);

    fn is_visible(&self) -> bool;

    fn set_visible(&self, visible: bool);

    fn controls_enabled(&self) -> bool;

    fn set_controls_enabled(&self, enabled: bool);

    /// Request a capturable stream of this element's output.
    ///
    /// Returns `Unsupported` when the element cannot be captured.
    fn capture_stream(&self) -> MockshotResult<CapturedStream>;

    /// The frame presented at the current position, if the element has
    /// video and a frame is available.
    fn current_frame(&self) -> Option<Arc<RgbaImage>>;
}

/// Playback state of one element, captured at job start.
#[derive(Debug, Clone)]
pub struct MediaState {
    pub element: Arc<dyn MediaElement>,
    pub muted: bool,
    pub volume: f64,
    pub paused: bool,
    pub position_secs: f64,
    pub visible: bool,
    pub controls_enabled: bool,
}

impl MediaState {
    /// Read the current state of `element`.
    pub fn capture(element: &Arc<dyn MediaElement>) -> Self {
        Self {
            element: Arc::clone(element),
            muted: element.is_muted(),
            volume: element.volume(),
            paused: element.is_paused(),
            position_secs: element.current_time(),
            visible: element.is_visible(),
            controls_enabled: element.controls_enabled(),
        }
    }
}

/// Whether a duration can drive a recording: finite, positive, not NaN.
pub fn is_recordable_duration(duration_secs: f64) -> bool {
    duration_secs.is_finite() && duration_secs > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recordable_duration() {
        assert!(is_recordable_duration(3.0));
        assert!(!is_recordable_duration(0.0));
        assert!(!is_recordable_duration(-1.0));
        assert!(!is_recordable_duration(f64::NAN));
        assert!(!is_recordable_duration(f64::INFINITY));
    }
}
