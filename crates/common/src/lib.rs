//! Mockshot Common Utilities
//!
//! Shared infrastructure for all Mockshot crates:
//! - Error types and result aliases
//! - Injectable clocks for the render loop and file naming
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
