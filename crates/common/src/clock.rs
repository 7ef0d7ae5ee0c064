//! Clock and timing utilities for the render loop.
//!
//! The recorder never reads the system time directly. It asks a [`Clock`]
//! for the elapsed time since the clock's epoch and sleeps until absolute
//! deadlines on that same clock. This module provides:
//! - [`SystemClock`], anchored to a tokio monotonic instant
//! - [`ManualClock`], whose time only moves when a task sleeps or a test
//!   advances it
//! - [`FramePacer`], the frame budget and deadline arithmetic

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// Source of monotonic time plus wall-clock timestamps.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's epoch.
    fn now(&self) -> Duration;

    /// Suspend until `now() >= deadline`.
    async fn sleep_until(&self, deadline: Duration);

    /// Milliseconds since the Unix epoch, used for output file names.
    fn wall_millis(&self) -> i64;
}

/// Real clock anchored to the moment it was created.
#[derive(Debug, Clone)]
pub struct SystemClock {
    /// The instant the clock started.
    epoch: tokio::time::Instant,
}

impl SystemClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: tokio::time::Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::start()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    async fn sleep_until(&self, deadline: Duration) {
        tokio::time::sleep_until(self.epoch + deadline).await;
    }

    fn wall_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Deterministic clock for tests and offline rendering.
///
/// Sleeping jumps the clock forward to the deadline instead of waiting,
/// so a render loop over a ten second clip finishes immediately while
/// still observing exactly the timestamps it asked for.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Duration>,
    wall_epoch_millis: i64,
    /// Extra delay added to every sleep, to simulate scheduler jitter.
    jitter: Duration,
}

impl ManualClock {
    pub fn new(wall_epoch_millis: i64) -> Self {
        Self {
            now: Mutex::new(Duration::ZERO),
            wall_epoch_millis,
            jitter: Duration::ZERO,
        }
    }

    /// Make every sleep overshoot its deadline by `jitter`.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sleep_until(&self, deadline: Duration) {
        {
            let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
            if deadline > *now {
                *now = deadline + self.jitter;
            }
        }
        tokio::task::yield_now().await;
    }

    fn wall_millis(&self) -> i64 {
        self.wall_epoch_millis + self.now().as_millis() as i64
    }
}

/// Frame budget and deadline arithmetic for a fixed frame rate.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    fps: u32,
}

impl FramePacer {
    /// Create a pacer targeting the given frame rate (at least 1).
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    /// Number of frames covering `duration_secs`, i.e. `ceil(D * F)`.
    ///
    /// Any positive finite duration gets at least one frame.
    pub fn frame_budget(&self, duration_secs: f64) -> u64 {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return 0;
        }
        let exact = duration_secs * self.fps as f64;
        // Relative tolerance so 3.0 * 30 stays 90 rather than 91.
        (exact - exact * 1e-12).ceil().max(1.0) as u64
    }

    /// Deadline of frame `index` relative to `start`.
    ///
    /// Deadlines are computed from the frame index rather than accumulated,
    /// so rounding in the interval never drifts the schedule.
    pub fn deadline(&self, start: Duration, index: u64) -> Duration {
        start + Duration::from_secs_f64(index as f64 / self.fps as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_jumps_to_deadline() {
        let clock = ManualClock::new(1_700_000_000_000);
        assert_eq!(clock.now(), Duration::ZERO);
        clock.sleep_until(Duration::from_millis(500)).await;
        assert_eq!(clock.now(), Duration::from_millis(500));
        assert_eq!(clock.wall_millis(), 1_700_000_000_500);

        // Sleeping into the past is a no-op.
        clock.sleep_until(Duration::from_millis(100)).await;
        assert_eq!(clock.now(), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_manual_clock_jitter_overshoots() {
        let clock = ManualClock::new(0).with_jitter(Duration::from_millis(3));
        clock.sleep_until(Duration::from_millis(10)).await;
        assert_eq!(clock.now(), Duration::from_millis(13));
    }

    #[test]
    fn test_frame_budget_is_ceil() {
        let pacer = FramePacer::new(30);
        assert_eq!(pacer.frame_budget(3.0), 90);
        assert_eq!(pacer.frame_budget(3.01), 91);
        assert_eq!(pacer.frame_budget(0.0), 0);
        assert_eq!(pacer.frame_budget(f64::INFINITY), 0);
        assert_eq!(pacer.frame_budget(f64::NAN), 0);
    }

    #[test]
    fn test_frame_budget_never_rounds_a_positive_clip_to_zero() {
        let pacer = FramePacer::new(30);
        assert_eq!(pacer.frame_budget(1e-11), 1);
        assert_eq!(pacer.frame_budget(1e-3), 1);
        assert_eq!(pacer.frame_budget(0.1), 3);
        assert_eq!(pacer.frame_budget(1000.0), 30_000);
    }

    #[test]
    fn test_deadlines_do_not_drift() {
        let pacer = FramePacer::new(30);
        let start = Duration::from_millis(250);
        assert_eq!(pacer.deadline(start, 90), start + Duration::from_secs(3));
        assert_eq!(pacer.deadline(start, 0), start);
    }

    #[tokio::test]
    async fn test_system_clock_is_monotonic() {
        let clock = SystemClock::start();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(clock.wall_millis() > 0);
    }
}
