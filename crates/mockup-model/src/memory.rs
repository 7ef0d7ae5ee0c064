//! In-memory media element.
//!
//! [`MemoryClip`] plays a fixed list of frames spread evenly over its
//! duration. Playback position is driven by an injected [`Clock`], which
//! makes it suitable both for live previews built from decoded frames and
//! for deterministic export tests on a manual clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use mockshot_common::clock::Clock;
use mockshot_common::error::{MockshotError, MockshotResult};

use crate::media::{AudioTrack, CapturedStream, MediaElement, MediaKind};

#[derive(Debug)]
struct ClipState {
    muted: bool,
    volume: f64,
    paused: bool,
    visible: bool,
    controls_enabled: bool,
    /// Position at the last play/pause/seek.
    position_secs: f64,
    /// Clock time playback last (re)started, when playing.
    play_anchor: Option<Duration>,
    /// Start of the current audible stretch, if audible.
    audible_since: Option<Duration>,
    audible_total: Duration,
    capture_requests: u32,
}

/// A clip held entirely in memory.
pub struct MemoryClip {
    id: String,
    kind: MediaKind,
    duration_secs: f64,
    frames: Vec<Arc<RgbaImage>>,
    audio: Option<AudioTrack>,
    capture_supported: bool,
    metadata_loads: bool,
    clock: Arc<dyn Clock>,
    state: Mutex<ClipState>,
}

impl std::fmt::Debug for MemoryClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryClip")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("duration_secs", &self.duration_secs)
            .field("frames", &self.frames.len())
            .field("audio", &self.audio.is_some())
            .finish()
    }
}

impl MemoryClip {
    /// A paused, unmuted video clip with no frames.
    pub fn new(id: impl Into<String>, duration_secs: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            id: id.into(),
            kind: MediaKind::Video,
            duration_secs,
            frames: Vec::new(),
            audio: None,
            capture_supported: true,
            metadata_loads: true,
            clock,
            state: Mutex::new(ClipState {
                muted: false,
                volume: 1.0,
                paused: true,
                visible: true,
                controls_enabled: true,
                position_secs: 0.0,
                play_anchor: None,
                audible_since: None,
                audible_total: Duration::ZERO,
                capture_requests: 0,
            }),
        }
    }

    pub fn with_frames(mut self, frames: Vec<RgbaImage>) -> Self {
        self.frames = frames.into_iter().map(Arc::new).collect();
        self
    }

    /// Fill the clip with `count` solid frames whose red channel encodes
    /// the frame index.
    pub fn with_solid_frames(self, width: u32, height: u32, count: usize) -> Self {
        let frames = (0..count)
            .map(|i| RgbaImage::from_pixel(width, height, Rgba([(i % 256) as u8, 64, 128, 255])))
            .collect();
        self.with_frames(frames)
    }

    pub fn with_audio(mut self, track: AudioTrack) -> Self {
        self.audio = Some(track);
        self
    }

    /// An element that only carries audio.
    pub fn audio_only(mut self) -> Self {
        self.kind = MediaKind::Audio;
        self
    }

    /// Make `capture_stream` report the operation as unsupported.
    pub fn without_capture(mut self) -> Self {
        self.capture_supported = false;
        self
    }

    /// Make `wait_for_metadata` fail.
    pub fn without_metadata(mut self) -> Self {
        self.metadata_loads = false;
        self
    }

    /// Total clock time this clip spent playing while unmuted with a
    /// non-zero volume.
    pub fn audible_duration(&self) -> Duration {
        let state = self.lock();
        let open = state
            .audible_since
            .map(|since| self.clock.now().saturating_sub(since))
            .unwrap_or_default();
        state.audible_total + open
    }

    /// How many times a capturable stream was requested.
    pub fn capture_requests(&self) -> u32 {
        self.lock().capture_requests
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClipState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn position_at(&self, state: &ClipState, now: Duration) -> f64 {
        let pos = match state.play_anchor {
            Some(anchor) => state.position_secs + now.saturating_sub(anchor).as_secs_f64(),
            None => state.position_secs,
        };
        if self.duration_secs.is_finite() {
            pos.clamp(0.0, self.duration_secs.max(0.0))
        } else {
            pos.max(0.0)
        }
    }

    /// Apply a mutation and keep the audible-time ledger consistent.
    fn update(&self, f: impl FnOnce(&mut ClipState)) {
        let now = self.clock.now();
        let mut state = self.lock();
        f(&mut state);
        let audible = !state.muted && state.volume > 0.0 && !state.paused;
        match (audible, state.audible_since) {
            (true, None) => state.audible_since = Some(now),
            (false, Some(since)) => {
                state.audible_total += now.saturating_sub(since);
                state.audible_since = None;
            }
            _ => {}
        }
    }
}

#[async_trait]
impl MediaElement for MemoryClip {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn duration_secs(&self) -> f64 {
        if self.metadata_loads {
            self.duration_secs
        } else {
            f64::NAN
        }
    }

    async fn wait_for_metadata(&self) -> MockshotResult<()> {
        if self.metadata_loads {
            Ok(())
        } else {
            Err(MockshotError::acquisition(format!(
                "metadata for {} never loaded",
                self.id
            )))
        }
    }

    fn current_time(&self) -> f64 {
        let state = self.lock();
        self.position_at(&state, self.clock.now())
    }

    fn set_current_time(&self, secs: f64) {
        let now = self.clock.now();
        self.update(|s| {
            s.position_secs = secs.max(0.0);
            if s.play_anchor.is_some() {
                s.play_anchor = Some(now);
            }
        });
    }

    async fn wait_for_seek(&self) -> MockshotResult<()> {
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn play(&self) -> MockshotResult<()> {
        let now = self.clock.now();
        self.update(|s| {
            if s.paused {
                s.paused = false;
                s.play_anchor = Some(now);
            }
        });
        Ok(())
    }

    fn pause(&self) {
        let position = self.current_time();
        self.update(|s| {
            if !s.paused {
                s.paused = true;
                s.position_secs = position;
                s.play_anchor = None;
            }
        });
    }

    fn is_muted(&self) -> bool {
        self.lock().muted
    }

    fn set_muted(&self, muted: bool) {
        self.update(|s| s.muted = muted);
    }

    fn volume(&self) -> f64 {
        self.lock().volume
    }

    fn set_volume(&self, volume: f64) {
        self.update(|s| s.volume = volume.clamp(0.0, 1.0));
    }

    fn is_visible(&self) -> bool {
        self.lock().visible
    }

    fn set_visible(&self, visible: bool) {
        self.update(|s| s.visible = visible);
    }

    fn controls_enabled(&self) -> bool {
        self.lock().controls_enabled
    }

    fn set_controls_enabled(&self, enabled: bool) {
        self.update(|s| s.controls_enabled = enabled);
    }

    fn capture_stream(&self) -> MockshotResult<CapturedStream> {
        self.update(|s| s.capture_requests += 1);
        if !self.capture_supported {
            return Err(MockshotError::unsupported(format!(
                "{} does not support stream capture",
                self.id
            )));
        }
        Ok(CapturedStream {
            audio_tracks: self.audio.iter().cloned().collect(),
        })
    }

    fn current_frame(&self) -> Option<Arc<RgbaImage>> {
        if self.kind != MediaKind::Video || self.frames.is_empty() {
            return None;
        }
        let index = if self.duration_secs.is_finite() && self.duration_secs > 0.0 {
            let t = self.current_time() / self.duration_secs;
            ((t * self.frames.len() as f64).floor() as usize).min(self.frames.len() - 1)
        } else {
            0
        };
        Some(Arc::clone(&self.frames[index]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockshot_common::clock::ManualClock;

    fn clip(clock: &Arc<ManualClock>) -> MemoryClip {
        MemoryClip::new("video", 4.0, clock.clone() as Arc<dyn Clock>).with_solid_frames(2, 2, 4)
    }

    #[tokio::test]
    async fn test_position_follows_clock_while_playing() {
        let clock = Arc::new(ManualClock::new(0));
        let clip = clip(&clock);
        clip.play().unwrap();
        clock.advance(Duration::from_millis(1500));
        assert!((clip.current_time() - 1.5).abs() < 1e-9);

        clip.pause();
        clock.advance(Duration::from_secs(1));
        assert!((clip.current_time() - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_position_clamps_at_end() {
        let clock = Arc::new(ManualClock::new(0));
        let clip = clip(&clock);
        clip.play().unwrap();
        clock.advance(Duration::from_secs(10));
        assert!((clip.current_time() - 4.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_frame_selection_tracks_position() {
        let clock = Arc::new(ManualClock::new(0));
        let clip = clip(&clock);
        clip.set_current_time(2.5);
        let frame = clip.current_frame().unwrap();
        assert_eq!(frame.get_pixel(0, 0)[0], 2);
    }

    #[tokio::test]
    async fn test_audible_time_only_counts_unmuted_playback() {
        let clock = Arc::new(ManualClock::new(0));
        let clip = clip(&clock);
        clip.set_muted(true);
        clip.play().unwrap();
        clock.advance(Duration::from_secs(1));
        assert_eq!(clip.audible_duration(), Duration::ZERO);

        clip.set_muted(false);
        clock.advance(Duration::from_millis(250));
        clip.pause();
        clock.advance(Duration::from_secs(1));
        assert_eq!(clip.audible_duration(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_capture_unsupported() {
        let clock = Arc::new(ManualClock::new(0));
        let clip = clip(&clock).without_capture();
        assert!(matches!(
            clip.capture_stream(),
            Err(MockshotError::Unsupported { .. })
        ));
        assert_eq!(clip.capture_requests(), 1);
    }
}
