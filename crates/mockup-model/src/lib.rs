//! Mockshot Mockup Model
//!
//! Defines the core data contracts shared by the capture and render crates:
//! - **Geometry:** Bounding boxes in surface space, placement rects in output space
//! - **Media:** The media element contract and per-element playback snapshots
//! - **Surface:** The mockup surface contract, chrome metadata, and layer kinds
//! - **Job:** Export jobs, their status machine, progress, and events
//! - **Memory:** An in-memory clip for previews and deterministic tests

pub mod geometry;
pub mod job;
pub mod media;
pub mod memory;
pub mod surface;

pub use geometry::*;
pub use job::*;
pub use media::*;
pub use memory::*;
pub use surface::*;
