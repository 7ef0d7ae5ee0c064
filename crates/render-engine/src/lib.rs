//! Mockshot Render Engine
//!
//! Composites a mockup surface with its live video into still images and
//! recorded video files.
//!
//! # Pipeline Architecture
//!
//! ```text
//! surface ──► FrameSnapshotter (media hidden) ──► template
//!                                                    │
//! video element ── current_frame ──┐                 │
//!                                  ├── ClippedFrameDrawer (per tick)
//! bounding boxes ── resolve_geometry ┘                │
//!                                                    ▼
//! AudioTrackBridge ──► audio track ──────────► MediaEncoder (negotiated codec)
//!                                                    │
//!                                                    ▼
//!                                        ExportSink (clipboard / download)
//! ```
//!
//! A [`MediaStateGuard`](mockshot_capture_engine::MediaStateGuard) wraps
//! every job so playback state is restored however the job ends.

pub mod codec;
pub mod compositor;
pub mod encoder;
pub mod export;
pub mod geometry;
pub mod recorder;
pub mod sink;
pub mod snapshot;
pub mod surface;

pub use codec::{negotiate, VideoFormat};
pub use compositor::{ClippedFrameDrawer, RoundedRectPath};
pub use encoder::{EncoderFactory, FfmpegEncoderFactory, MediaEncoder, OutputStream};
pub use export::{Compositor, ExportContext, ExportOutcome};
pub use geometry::resolve_geometry;
pub use recorder::{CompositeRecorder, RecordedMedia, RecorderSettings};
pub use sink::{ClipboardWriter, Delivery, DownloadTarget, ExportSink};
pub use snapshot::{FrameSnapshotter, RasterTemplate};
pub use surface::{Layer, LayerContent, LayeredSurface};
