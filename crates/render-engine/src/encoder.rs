//! Encoder contract and the ffmpeg subprocess encoder.
//!
//! The recorder only talks to [`MediaEncoder`] and [`EncoderFactory`]; it
//! never knows which backend turns canvas frames into bytes. The shipped
//! backend pipes raw RGBA frames into `ffmpeg` and muxes the source clip's
//! audio from its file.

use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use mockshot_common::clock::FramePacer;
use mockshot_common::error::{MockshotError, MockshotResult};
use mockshot_mockup_model::media::AudioTrack;

use crate::codec::VideoFormat;

/// Size of the chunks returned by [`FfmpegEncoder::stop`].
const CHUNK_SIZE: usize = 1024 * 1024;

/// How often `stop` checks whether ffmpeg has exited.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

static NEXT_OUTPUT_ID: AtomicU64 = AtomicU64::new(0);

/// Description of the stream an encoder records.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputStream {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration_secs: f64,
    /// Audio muxed alongside the canvas frames.
    pub audio: Option<AudioTrack>,
    pub format: VideoFormat,
}

impl OutputStream {
    /// Frames the stream must contain to cover its duration.
    pub fn frame_budget(&self) -> u64 {
        FramePacer::new(self.fps).frame_budget(self.duration_secs)
    }
}

/// Consumes canvas frames and produces encoded chunks.
#[async_trait]
pub trait MediaEncoder: Send {
    fn start(&mut self, stream: &OutputStream) -> MockshotResult<()>;

    /// Push the canvas as it looks at `timestamp` since the recording start.
    fn push_frame(&mut self, frame: &RgbaImage, timestamp: Duration) -> MockshotResult<()>;

    /// Finish the stream and return the encoded data as chunks.
    async fn stop(&mut self) -> MockshotResult<Vec<Vec<u8>>>;
}

/// Creates encoders and answers codec support queries.
pub trait EncoderFactory: Send + Sync {
    fn is_type_supported(&self, mime: &str) -> bool;

    fn create(&self, format: VideoFormat) -> MockshotResult<Box<dyn MediaEncoder>>;
}

/// Name of the ffmpeg encoder used for a format.
fn video_encoder_name(format: VideoFormat) -> &'static str {
    match format {
        VideoFormat::Mp4Avc1 => "libx264",
        VideoFormat::WebmVp9 => "libvpx-vp9",
        VideoFormat::Webm => "libvpx",
    }
}

fn codec_args(format: VideoFormat) -> Vec<String> {
    let args: &[&str] = match format {
        VideoFormat::Mp4Avc1 => &[
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-profile:v",
            "high",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-b:a",
            "160k",
            "-movflags",
            "+faststart",
        ],
        VideoFormat::WebmVp9 => &[
            "-c:v",
            "libvpx-vp9",
            "-b:v",
            "4M",
            "-deadline",
            "realtime",
            "-cpu-used",
            "8",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "libopus",
            "-b:a",
            "128k",
        ],
        VideoFormat::Webm => &[
            "-c:v",
            "libvpx",
            "-b:v",
            "4M",
            "-deadline",
            "realtime",
            "-cpu-used",
            "8",
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "libopus",
            "-b:a",
            "128k",
        ],
    };
    args.iter().map(|s| s.to_string()).collect()
}

/// Full ffmpeg argument list for recording `stream` into `output`.
fn build_args(stream: &OutputStream, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push("-s".to_string());
    args.push(format!("{}x{}", stream.width, stream.height));
    args.push("-r".to_string());
    args.push(stream.fps.to_string());
    args.push("-i".to_string());
    args.push("pipe:0".to_string());

    let audio_source = stream.audio.as_ref().and_then(|a| a.source.as_ref());
    if let Some(source) = audio_source {
        args.push("-i".to_string());
        args.push(source.display().to_string());
    }

    args.push("-map".to_string());
    args.push("0:v:0".to_string());
    if audio_source.is_some() {
        args.push("-map".to_string());
        args.push("1:a:0?".to_string());
    }

    // yuv420p needs even dimensions.
    args.push("-vf".to_string());
    args.push("scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string());
    args.extend(codec_args(stream.format));
    args.push("-t".to_string());
    args.push(format!("{:.6}", stream.duration_secs));
    args.push(output.display().to_string());
    args
}

/// Number of frame slots to write so the stream reaches `timestamp`.
///
/// Frames are placed on a fixed `fps` grid; a late frame is repeated to
/// fill the slots it missed. Never exceeds `budget` in total.
fn slots_to_write(written: u64, timestamp: Duration, fps: u32, budget: u64) -> u64 {
    let slot = (timestamp.as_secs_f64() * fps as f64).round() as u64;
    let target = (slot + 1).min(budget);
    target.saturating_sub(written)
}

fn parse_encoder_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            // Encoder rows start with a six-character capability column.
            let is_codec_row =
                flags.len() == 6 && (flags.starts_with('V') || flags.starts_with('A'));
            (is_codec_row && name != "=").then(|| name.to_string())
        })
        .collect()
}

/// Encoder backed by an `ffmpeg` child process.
pub struct FfmpegEncoder {
    format: VideoFormat,
    output_path: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<std::thread::JoinHandle<String>>,
    stream: Option<OutputStream>,
    budget: u64,
    frames_written: u64,
    last_frame: Vec<u8>,
}

impl std::fmt::Debug for FfmpegEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegEncoder")
            .field("format", &self.format)
            .field("output_path", &self.output_path)
            .field("frames_written", &self.frames_written)
            .field("budget", &self.budget)
            .finish()
    }
}

impl FfmpegEncoder {
    pub fn new(format: VideoFormat, work_dir: &Path) -> Self {
        let id = NEXT_OUTPUT_ID.fetch_add(1, Ordering::Relaxed);
        let output_path = work_dir.join(format!(
            "mockshot-{}-{id}.{}",
            std::process::id(),
            format.extension()
        ));
        Self {
            format,
            output_path,
            child: None,
            stdin: None,
            stderr_task: None,
            stream: None,
            budget: 0,
            frames_written: 0,
            last_frame: Vec::new(),
        }
    }

    fn write_slots(&mut self, bytes: Option<&[u8]>, count: u64) -> MockshotResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MockshotError::encoding("encoder is not started"))?;
        let data = bytes.unwrap_or(&self.last_frame);
        for _ in 0..count {
            stdin
                .write_all(data)
                .map_err(|e| MockshotError::encoding(format!("Failed writing frame to ffmpeg: {e}")))?;
        }
        self.frames_written += count;
        Ok(())
    }

    async fn wait_for_exit(&mut self) -> std::io::Result<ExitStatus> {
        loop {
            let Some(child) = self.child.as_mut() else {
                return Err(std::io::Error::other("ffmpeg process already reaped"));
            };
            match child.try_wait()? {
                Some(status) => return Ok(status),
                None => tokio::time::sleep(EXIT_POLL_INTERVAL).await,
            }
        }
    }
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    fn start(&mut self, stream: &OutputStream) -> MockshotResult<()> {
        if self.child.is_some() {
            return Err(MockshotError::encoding("encoder already started"));
        }
        let args = build_args(stream, &self.output_path);
        tracing::debug!(args = ?args, "Running ffmpeg");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MockshotError::encoding(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(
            pid = child.id(),
            format = %stream.format,
            width = stream.width,
            height = stream.height,
            fps = stream.fps,
            audio = stream.audio.is_some(),
            "ffmpeg encoder started"
        );

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MockshotError::encoding("Failed to capture ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MockshotError::encoding("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        self.stderr_task = Some(std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        }));

        self.budget = stream.frame_budget();
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stream = Some(stream.clone());
        Ok(())
    }

    fn push_frame(&mut self, frame: &RgbaImage, timestamp: Duration) -> MockshotResult<()> {
        let Some(stream) = &self.stream else {
            return Err(MockshotError::encoding("encoder is not started"));
        };
        if frame.dimensions() != (stream.width, stream.height) {
            return Err(MockshotError::encoding(format!(
                "frame is {}x{} but the stream is {}x{}",
                frame.width(),
                frame.height(),
                stream.width,
                stream.height
            )));
        }
        let count = slots_to_write(self.frames_written, timestamp, stream.fps, self.budget);
        if count == 0 {
            return Ok(());
        }
        self.write_slots(Some(frame.as_raw()), count)?;
        self.last_frame.clear();
        self.last_frame.extend_from_slice(frame.as_raw());
        Ok(())
    }

    async fn stop(&mut self) -> MockshotResult<Vec<Vec<u8>>> {
        if self.child.is_none() {
            return Err(MockshotError::encoding("encoder is not started"));
        }

        let missing = self.budget.saturating_sub(self.frames_written);
        if missing > 0 && !self.last_frame.is_empty() {
            tracing::debug!(missing, "Padding stream to its duration");
            self.write_slots(None, missing)?;
        }
        // Closing stdin lets ffmpeg flush and exit.
        drop(self.stdin.take());

        // The child stays owned by `self` until it exits, so a caller that
        // gives up on this future still kills it from `Drop`.
        let status = self.wait_for_exit().await;
        if status.is_ok() {
            self.child = None;
        }

        let stderr_task = self.stderr_task.take();
        let stderr_output = tokio::task::spawn_blocking(move || {
            stderr_task
                .map(|task| {
                    task.join()
                        .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
                })
                .unwrap_or_default()
        })
        .await
        .unwrap_or_default();

        let status =
            status.map_err(|e| MockshotError::encoding(format!("Failed to wait on ffmpeg: {e}")))?;
        if !status.success() {
            let _ = tokio::fs::remove_file(&self.output_path).await;
            return Err(MockshotError::encoding(format!(
                "ffmpeg export failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }

        let read = tokio::fs::read(&self.output_path).await;
        let _ = tokio::fs::remove_file(&self.output_path).await;
        let bytes = match read {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            frames = self.frames_written,
            bytes = bytes.len(),
            "ffmpeg encoder finished"
        );
        Ok(bytes.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            let _ = std::fs::remove_file(&self.output_path);
        }
    }
}

/// Factory for [`FfmpegEncoder`]s.
///
/// Codec support is answered from `ffmpeg -encoders`, queried once.
#[derive(Debug)]
pub struct FfmpegEncoderFactory {
    work_dir: PathBuf,
    encoders: OnceLock<Vec<String>>,
}

impl Default for FfmpegEncoderFactory {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl FfmpegEncoderFactory {
    /// Encoders write their intermediate files under `work_dir`.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            encoders: OnceLock::new(),
        }
    }

    fn available_encoders(&self) -> &[String] {
        self.encoders.get_or_init(|| {
            let output = Command::new("ffmpeg")
                .args(["-hide_banner", "-encoders"])
                .stdin(Stdio::null())
                .output();
            match output {
                Ok(output) if output.status.success() => {
                    let encoders = parse_encoder_list(&String::from_utf8_lossy(&output.stdout));
                    tracing::debug!(count = encoders.len(), "Queried ffmpeg encoders");
                    encoders
                }
                Ok(output) => {
                    tracing::warn!(status = %output.status, "ffmpeg -encoders failed");
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ffmpeg not available");
                    Vec::new()
                }
            }
        })
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn is_type_supported(&self, mime: &str) -> bool {
        let Ok(format) = mime.parse::<VideoFormat>() else {
            return false;
        };
        let name = video_encoder_name(format);
        self.available_encoders().iter().any(|e| e == name)
    }

    fn create(&self, format: VideoFormat) -> MockshotResult<Box<dyn MediaEncoder>> {
        Ok(Box::new(FfmpegEncoder::new(format, &self.work_dir)))
    }
}
