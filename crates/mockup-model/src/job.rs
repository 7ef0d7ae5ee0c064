//! Export jobs, their status machine, progress reports, and events.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use mockshot_common::error::{MockshotError, MockshotResult};
use serde::{Deserialize, Serialize};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// What an export produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    StillImage,
    VideoMockup,
}

/// Lifecycle of an export job.
///
/// `Pending -> Capturing -> Encoding -> Done`, or `-> Failed` from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Capturing,
    Encoding,
    Done,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Capturing) | (Capturing, Encoding) | (Encoding, Done)
        ) || (!self.is_terminal() && next == Failed)
    }
}

/// One end-to-end export operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: u64,

    pub kind: ExportKind,

    /// Source clip duration (video only).
    pub duration_secs: Option<f64>,

    /// Output frame rate (video only).
    pub frame_rate: Option<u32>,

    pub output_width: u32,
    pub output_height: u32,

    pub status: JobStatus,

    /// Mime type of the produced payload, once known.
    pub mime_type: Option<String>,

    /// Human-readable failure reason when `status == Failed`.
    pub failure: Option<String>,
}

impl ExportJob {
    fn new(kind: ExportKind, output_width: u32, output_height: u32) -> Self {
        Self {
            id: NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            duration_secs: None,
            frame_rate: None,
            output_width,
            output_height,
            status: JobStatus::Pending,
            mime_type: None,
            failure: None,
        }
    }

    /// A pending still-image job.
    pub fn still(output_width: u32, output_height: u32) -> Self {
        Self::new(ExportKind::StillImage, output_width, output_height)
    }

    /// A pending video-mockup job at `frame_rate`.
    pub fn video(output_width: u32, output_height: u32, frame_rate: u32) -> Self {
        let mut job = Self::new(ExportKind::VideoMockup, output_width, output_height);
        job.frame_rate = Some(frame_rate.max(1));
        job
    }

    /// Move to `next`, rejecting transitions the status machine forbids.
    pub fn transition(&mut self, next: JobStatus) -> MockshotResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(MockshotError::runtime(format!(
                "illegal job transition {:?} -> {:?}",
                self.status, next
            )));
        }
        tracing::debug!(job = self.id, from = ?self.status, to = ?next, "Job transition");
        self.status = next;
        Ok(())
    }

    /// Mark the job failed with `reason`. No-op once terminal.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.failure = Some(reason.into());
    }
}

/// Still image output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StillFormat {
    #[default]
    Png,
    Jpeg,
    /// SVG document wrapping the PNG raster.
    Svg,
}

impl StillFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            StillFormat::Png => "image/png",
            StillFormat::Jpeg => "image/jpeg",
            StillFormat::Svg => "image/svg+xml",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            StillFormat::Png => "png",
            StillFormat::Jpeg => "jpg",
            StillFormat::Svg => "svg",
        }
    }
}

impl FromStr for StillFormat {
    type Err = MockshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(StillFormat::Png),
            "jpg" | "jpeg" => Ok(StillFormat::Jpeg),
            "svg" => Ok(StillFormat::Svg),
            other => Err(MockshotError::config(format!(
                "Unknown still format: {other}. Use: png, jpeg, svg"
            ))),
        }
    }
}

/// Progress callback invoked on every draw tick.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Export progress report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames drawn so far.
    pub frames_rendered: u64,

    /// Total frames to draw.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    pub status: JobStatus,
}

impl ExportProgress {
    /// Progress as a whole percentage in `0..=100`.
    pub fn percent(&self) -> u8 {
        (self.progress.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

/// Notifications published by the compositor for UI collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportEvent {
    /// Editing affordances (selection handles, overlays) should be hidden
    /// while `active` is true.
    DownloadMode { active: bool },

    StatusChanged {
        job_id: u64,
        kind: ExportKind,
        status: JobStatus,
    },
}
