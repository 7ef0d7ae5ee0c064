//! Snapshot and restoration of media playback state around an export.
//!
//! Exports mute, hide, seek and play the elements of a mockup surface. The
//! guard records what every element looked like before the job touched it
//! and puts the surface back into a usable state afterwards, on every exit
//! path. Restoration is not a bit-exact rewind: the `Usable` policy favors a
//! working control surface (audible, seekable, controls enabled) over
//! reproducing a muted or zero-volume state.

use std::sync::Arc;

use mockshot_mockup_model::media::{MediaElement, MediaState};

/// Volume applied on restore when the element was at zero volume.
pub const FALLBACK_VOLUME: f64 = 0.5;

/// How captured states are written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// Unmute, restore a non-zero volume, seek back, re-enable controls,
    /// restore visibility, and resume playback only if it was playing.
    Usable,
    /// Restore visibility, mute and volume verbatim without touching
    /// playback position or state.
    Presentation,
}

/// Summary of a restore pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub elements: usize,
    pub resumed: usize,
}

/// Capture the current state of every element.
pub fn snapshot(elements: &[Arc<dyn MediaElement>]) -> Vec<MediaState> {
    elements.iter().map(MediaState::capture).collect()
}

/// Write `states` back to their elements according to `mode`.
pub fn restore(states: &[MediaState], mode: RestoreMode) -> RestoreSummary {
    let mut summary = RestoreSummary {
        elements: states.len(),
        resumed: 0,
    };

    for state in states {
        let element = &state.element;
        match mode {
            RestoreMode::Usable => {
                element.set_muted(false);
                element.set_volume(if state.volume > 0.0 {
                    state.volume
                } else {
                    FALLBACK_VOLUME
                });
                element.set_current_time(state.position_secs);
                element.set_controls_enabled(true);
                element.set_visible(state.visible);
                if state.paused {
                    element.pause();
                } else {
                    match element.play() {
                        Ok(()) => summary.resumed += 1,
                        Err(e) => tracing::warn!(
                            element = element.id(),
                            error = %e,
                            "Failed to resume playback after export"
                        ),
                    }
                }
            }
            RestoreMode::Presentation => {
                element.set_visible(state.visible);
                element.set_muted(state.muted);
                element.set_volume(state.volume);
            }
        }
    }

    summary
}

/// Force every element silent: muted with zero volume.
pub fn silence(elements: &[Arc<dyn MediaElement>]) {
    for element in elements {
        element.set_muted(true);
        element.set_volume(0.0);
    }
}

/// Scoped acquisition of media state with guaranteed release.
///
/// [`MediaStateGuard::restore`] consumes the guard. If the guard is dropped
/// without an explicit restore (early return, panic unwinding, a cancelled
/// future) the same restoration runs from `Drop`, so it happens exactly once.
#[derive(Debug)]
pub struct MediaStateGuard {
    states: Vec<MediaState>,
    mode: RestoreMode,
    restored: bool,
}

impl MediaStateGuard {
    /// Snapshot `elements`; the guard restores them with `mode`.
    pub fn capture(elements: &[Arc<dyn MediaElement>], mode: RestoreMode) -> Self {
        let states = snapshot(elements);
        tracing::debug!(elements = states.len(), ?mode, "Media state captured");
        Self {
            states,
            mode,
            restored: false,
        }
    }

    /// Restore now.
    pub fn restore(mut self) -> RestoreSummary {
        self.restore_once()
    }

    fn restore_once(&mut self) -> RestoreSummary {
        if self.restored {
            return RestoreSummary::default();
        }
        self.restored = true;
        let summary = restore(&self.states, self.mode);
        tracing::debug!(
            elements = summary.elements,
            resumed = summary.resumed,
            mode = ?self.mode,
            "Media state restored"
        );
        summary
    }
}

impl Drop for MediaStateGuard {
    fn drop(&mut self) {
        if !self.restored {
            tracing::debug!("Media state guard dropped without explicit restore");
            self.restore_once();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockshot_common::clock::{Clock, ManualClock};
    use mockshot_mockup_model::memory::MemoryClip;

    fn element(clock: &Arc<ManualClock>, id: &str) -> Arc<dyn MediaElement> {
        Arc::new(MemoryClip::new(id, 10.0, clock.clone() as Arc<dyn Clock>))
    }

    #[test]
    fn test_usable_restore_unmutes_and_falls_back_volume() {
        let clock = Arc::new(ManualClock::new(0));
        let video = element(&clock, "video");
        video.set_muted(true);
        video.set_volume(0.0);
        video.set_current_time(4.0);
        video.set_controls_enabled(false);

        let guard = MediaStateGuard::capture(&[video.clone()], RestoreMode::Usable);
        silence(&[video.clone()]);
        video.set_current_time(0.0);
        video.set_visible(false);
        let summary = guard.restore();

        assert_eq!(summary.elements, 1);
        assert!(!video.is_muted());
        assert!((video.volume() - FALLBACK_VOLUME).abs() < 1e-9);
        assert!((video.current_time() - 4.0).abs() < 1e-9);
        assert!(video.controls_enabled());
        assert!(video.is_visible());
        assert!(video.is_paused());
    }

    #[test]
    fn test_usable_restore_keeps_positive_volume_and_resumes() {
        let clock = Arc::new(ManualClock::new(0));
        let video = element(&clock, "video");
        video.set_volume(0.8);
        video.play().unwrap();

        let guard = MediaStateGuard::capture(&[video.clone()], RestoreMode::Usable);
        video.pause();
        let summary = guard.restore();

        assert_eq!(summary.resumed, 1);
        assert!(!video.is_paused());
        assert!((video.volume() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_presentation_restore_is_verbatim() {
        let clock = Arc::new(ManualClock::new(0));
        let video = element(&clock, "video");
        video.set_muted(true);
        video.set_volume(0.3);

        let guard = MediaStateGuard::capture(&[video.clone()], RestoreMode::Presentation);
        video.set_muted(false);
        video.set_volume(1.0);
        video.set_visible(false);
        video.set_current_time(2.0);
        guard.restore();

        assert!(video.is_muted());
        assert!((video.volume() - 0.3).abs() < 1e-9);
        assert!(video.is_visible());
        // Position is untouched.
        assert!((video.current_time() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_drop_restores_exactly_once() {
        let clock = Arc::new(ManualClock::new(0));
        let video = element(&clock, "video");
        {
            let _guard = MediaStateGuard::capture(&[video.clone()], RestoreMode::Usable);
            silence(&[video.clone()]);
        }
        assert!(!video.is_muted());
        assert!(video.volume() > 0.0);
    }

    #[test]
    fn test_restore_runs_when_unwinding() {
        let clock = Arc::new(ManualClock::new(0));
        let video = element(&clock, "video");
        let inner = video.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = MediaStateGuard::capture(&[inner.clone()], RestoreMode::Usable);
            silence(&[inner]);
            panic!("encoder exploded");
        }));
        assert!(result.is_err());
        assert!(!video.is_muted());
        assert!(video.volume() > 0.0);
    }
}
