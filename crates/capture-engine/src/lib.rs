//! Mockshot Capture Engine
//!
//! Everything that touches live media elements during an export:
//!
//! - [`guard`]: snapshot/restore of playback state around a job
//! - [`audio`]: acquisition of the source clip's audio track without
//!   audible leakage
//! - [`ffmpeg`]: media elements backed by files on disk
//!
//! ```text
//! ┌──────────────────── export job ────────────────────┐
//! │ MediaStateGuard::capture(all elements)             │
//! │   AudioTrackBridge::acquire(video) ──► AudioTrack? │
//! │   silence(all elements)                            │
//! │   ... draw loop / encoder ...                      │
//! │ MediaStateGuard::restore()   (or Drop)             │
//! └────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod ffmpeg;
pub mod guard;

pub use audio::AudioTrackBridge;
pub use ffmpeg::{command_exists, probe_media, FileClip, MediaProbe};
pub use guard::{restore, silence, snapshot, MediaStateGuard, RestoreMode, RestoreSummary};
