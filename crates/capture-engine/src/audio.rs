//! Audio track acquisition from the source clip.
//!
//! A capturable stream only carries audio while the element is unmuted, so
//! the bridge unmutes the element for the duration of the request and
//! silences it again straight after. The visible element never stays
//! audible: whether the request succeeds or not, it leaves with
//! `muted = true` and `volume = 0`.

use std::sync::Arc;

use mockshot_common::error::MockshotError;
use mockshot_mockup_model::media::{AudioTrack, MediaElement};

/// Pulls an audio track out of a media element without audible leakage.
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioTrackBridge;

impl AudioTrackBridge {
    pub fn new() -> Self {
        Self
    }

    /// Acquire the first audio track of `element`'s capturable stream.
    ///
    /// Returns `None` for silent sources and for elements that cannot be
    /// captured; neither is an error for the export.
    pub fn acquire(&self, element: &Arc<dyn MediaElement>) -> Option<AudioTrack> {
        let previous_muted = element.is_muted();
        let previous_volume = element.volume();

        element.set_muted(false);
        element.set_volume(1.0);
        let stream = element.capture_stream();
        element.set_muted(true);
        element.set_volume(0.0);

        tracing::debug!(
            element = element.id(),
            previous_muted,
            previous_volume,
            "Requested capturable stream"
        );

        match stream {
            Ok(stream) => {
                let track = stream.first_audio_track().cloned();
                match &track {
                    Some(track) => {
                        tracing::info!(element = element.id(), track = %track.id, "Audio track acquired")
                    }
                    None => {
                        tracing::info!(element = element.id(), "Source has no audio; output will be silent")
                    }
                }
                track
            }
            Err(MockshotError::Unsupported { message }) => {
                tracing::warn!(
                    element = element.id(),
                    reason = %message,
                    "Stream capture unsupported; continuing without audio"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    element = element.id(),
                    error = %e,
                    "Stream capture failed; continuing without audio"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockshot_common::clock::{Clock, ManualClock};
    use mockshot_mockup_model::memory::MemoryClip;

    fn track() -> AudioTrack {
        AudioTrack {
            id: "audio-0".to_string(),
            label: "Stereo".to_string(),
            source: None,
        }
    }

    #[test]
    fn test_returns_first_audio_track_and_silences() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let clip = Arc::new(MemoryClip::new("video", 3.0, clock).with_audio(track()));
        let element: Arc<dyn MediaElement> = clip.clone();

        let acquired = AudioTrackBridge::new().acquire(&element);

        assert_eq!(acquired, Some(track()));
        assert!(element.is_muted());
        assert_eq!(element.volume(), 0.0);
        assert_eq!(clip.capture_requests(), 1);
    }

    #[test]
    fn test_silent_source_yields_none() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let element: Arc<dyn MediaElement> = Arc::new(MemoryClip::new("video", 3.0, clock));
        assert_eq!(AudioTrackBridge::new().acquire(&element), None);
        assert!(element.is_muted());
    }

    #[test]
    fn test_unsupported_capture_degrades_to_none() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let element: Arc<dyn MediaElement> = Arc::new(
            MemoryClip::new("video", 3.0, clock)
                .with_audio(track())
                .without_capture(),
        );
        assert_eq!(AudioTrackBridge::new().acquire(&element), None);
        assert!(element.is_muted());
        assert_eq!(element.volume(), 0.0);
    }

    #[tokio::test]
    async fn test_no_audible_leakage_while_playing() {
        let clock = Arc::new(ManualClock::new(0));
        let clip = Arc::new(
            MemoryClip::new("video", 3.0, clock.clone() as Arc<dyn Clock>).with_audio(track()),
        );
        let element: Arc<dyn MediaElement> = clip.clone();
        element.set_muted(true);
        element.play().unwrap();

        AudioTrackBridge::new().acquire(&element);
        clock.advance(std::time::Duration::from_secs(2));

        assert_eq!(clip.audible_duration(), std::time::Duration::ZERO);
    }
}
