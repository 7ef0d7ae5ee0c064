//! File-backed media elements decoded through ffmpeg.
//!
//! [`FileClip`] exposes a video file as a [`MediaElement`]. Metadata comes
//! from `ffprobe`; frames are decoded lazily by an `ffmpeg` child process
//! writing raw RGBA at a fixed rate, so presenting frame `n` only requires
//! reading forward from the previous one. Backward or long forward seeks
//! restart the decoder at the new position.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbaImage;
use mockshot_common::clock::Clock;
use mockshot_common::error::{MockshotError, MockshotResult};
use mockshot_mockup_model::media::{AudioTrack, CapturedStream, MediaElement, MediaKind};
use serde::Deserialize;

/// Forward jumps longer than this many seconds restart the decoder instead
/// of decoding every intermediate frame.
const MAX_DECODE_AHEAD_SECS: f64 = 2.0;

/// Metadata of a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    /// Container duration; `NaN` when the container does not report one.
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
    pub has_audio: bool,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Run `ffprobe` on `path`.
pub fn probe_media(path: &Path) -> MockshotResult<MediaProbe> {
    if !path.exists() {
        return Err(MockshotError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration:stream=codec_type,width,height",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| MockshotError::acquisition(format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(MockshotError::acquisition(format!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(raw: &[u8]) -> MockshotResult<MediaProbe> {
    let parsed: ProbeOutput = serde_json::from_slice(raw)?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MockshotError::acquisition("Media file has no video stream"))?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(MockshotError::acquisition("Video stream has no dimensions")),
    };

    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(f64::NAN);

    Ok(MediaProbe {
        duration_secs,
        width,
        height,
        has_audio: parsed
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio")),
    })
}

/// Check whether `binary` is on the PATH.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Sequential raw RGBA reader over an ffmpeg child process.
struct FrameReader {
    child: Child,
    stdout: BufReader<ChildStdout>,
    frame_len: usize,
    width: u32,
    height: u32,
    /// Index of the next frame `read_frame` returns.
    next_index: u64,
}

impl FrameReader {
    fn spawn(path: &Path, start_index: u64, fps: u32, width: u32, height: u32) -> MockshotResult<Self> {
        let start_secs = start_index as f64 / fps as f64;
        let mut child = Command::new("ffmpeg")
            .args(["-hide_banner", "-loglevel", "error", "-ss"])
            .arg(format!("{start_secs:.6}"))
            .arg("-i")
            .arg(path)
            .args([
                "-vf",
                &format!("fps={fps},scale={width}:{height}"),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MockshotError::acquisition(format!("Failed to start ffmpeg decoder: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MockshotError::acquisition("Failed to capture ffmpeg decoder stdout"))?;
        let frame_len = width as usize * height as usize * 4;

        tracing::debug!(
            path = %path.display(),
            start_secs,
            fps,
            "ffmpeg decoder started"
        );

        Ok(Self {
            child,
            stdout: BufReader::with_capacity(frame_len * 2, stdout),
            frame_len,
            width,
            height,
            next_index: start_index,
        })
    }

    /// Read the next frame, or `None` at end of stream.
    fn read_frame(&mut self) -> Option<RgbaImage> {
        let mut buf = vec![0u8; self.frame_len];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => {
                self.next_index += 1;
                RgbaImage::from_raw(self.width, self.height, buf)
            }
            Err(_) => None,
        }
    }
}

impl Drop for FrameReader {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[derive(Default)]
struct Decoder {
    reader: Option<FrameReader>,
    last: Option<(u64, Arc<RgbaImage>)>,
}

#[derive(Debug)]
struct PlaybackState {
    muted: bool,
    volume: f64,
    paused: bool,
    visible: bool,
    controls_enabled: bool,
    position_secs: f64,
    play_anchor: Option<Duration>,
}

/// A media element backed by a file on disk.
pub struct FileClip {
    id: String,
    path: PathBuf,
    probe: MediaProbe,
    decode_fps: u32,
    clock: Arc<dyn Clock>,
    state: Mutex<PlaybackState>,
    decoder: Mutex<Decoder>,
}

impl std::fmt::Debug for FileClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileClip")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("probe", &self.probe)
            .field("decode_fps", &self.decode_fps)
            .finish()
    }
}

impl FileClip {
    /// Probe `path` and wrap it as a paused, unmuted element.
    pub fn open(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        decode_fps: u32,
        clock: Arc<dyn Clock>,
    ) -> MockshotResult<Self> {
        let path = path.into();
        let probe = probe_media(&path)?;
        tracing::info!(
            path = %path.display(),
            duration_secs = probe.duration_secs,
            width = probe.width,
            height = probe.height,
            has_audio = probe.has_audio,
            "Opened media file"
        );
        Ok(Self {
            id: id.into(),
            path,
            probe,
            decode_fps: decode_fps.max(1),
            clock,
            state: Mutex::new(PlaybackState {
                muted: false,
                volume: 1.0,
                paused: true,
                visible: true,
                controls_enabled: true,
                position_secs: 0.0,
                play_anchor: None,
            }),
            decoder: Mutex::new(Decoder::default()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn probe(&self) -> &MediaProbe {
        &self.probe
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PlaybackState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn position(&self, state: &PlaybackState) -> f64 {
        let pos = match state.play_anchor {
            Some(anchor) => {
                state.position_secs + self.clock.now().saturating_sub(anchor).as_secs_f64()
            }
            None => state.position_secs,
        };
        if self.probe.duration_secs.is_finite() {
            pos.clamp(0.0, self.probe.duration_secs)
        } else {
            pos.max(0.0)
        }
    }

    fn frame_at(&self, secs: f64) -> MockshotResult<Option<Arc<RgbaImage>>> {
        let target = (secs * self.decode_fps as f64).floor().max(0.0) as u64;
        let mut decoder = self.decoder.lock().unwrap_or_else(|e| e.into_inner());

        if let Some((index, frame)) = &decoder.last {
            if *index == target {
                return Ok(Some(Arc::clone(frame)));
            }
        }

        let max_ahead = (MAX_DECODE_AHEAD_SECS * self.decode_fps as f64) as u64;
        let restart = match &decoder.reader {
            None => true,
            Some(reader) => target < reader.next_index || target > reader.next_index + max_ahead,
        };
        if restart {
            decoder.reader = Some(FrameReader::spawn(
                &self.path,
                target,
                self.decode_fps,
                self.probe.width,
                self.probe.height,
            )?);
        }

        let Decoder { reader, last } = &mut *decoder;
        if let Some(reader) = reader.as_mut() {
            while reader.next_index <= target {
                let index = reader.next_index;
                match reader.read_frame() {
                    Some(frame) => *last = Some((index, Arc::new(frame))),
                    // Past the last decodable frame: keep presenting the previous one.
                    None => break,
                }
            }
        }

        Ok(last.as_ref().map(|(_, frame)| Arc::clone(frame)))
    }
}

#[async_trait]
impl MediaElement for FileClip {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaKind {
        MediaKind::Video
    }

    fn duration_secs(&self) -> f64 {
        self.probe.duration_secs
    }

    async fn wait_for_metadata(&self) -> MockshotResult<()> {
        // Probing happens in `open`.
        Ok(())
    }

    fn current_time(&self) -> f64 {
        let state = self.lock();
        self.position(&state)
    }

    fn set_current_time(&self, secs: f64) {
        let now = self.clock.now();
        let mut state = self.lock();
        state.position_secs = secs.max(0.0);
        if state.play_anchor.is_some() {
            state.play_anchor = Some(now);
        }
    }

    async fn wait_for_seek(&self) -> MockshotResult<()> {
        // The decoder repositions lazily on the next frame request.
        Ok(())
    }

    fn is_paused(&self) -> bool {
        self.lock().paused
    }

    fn play(&self) -> MockshotResult<()> {
        let now = self.clock.now();
        let mut state = self.lock();
        if state.paused {
            state.paused = false;
            state.play_anchor = Some(now);
        }
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.lock();
        if !state.paused {
            state.position_secs = self.position(&state);
            state.paused = true;
            state.play_anchor = None;
        }
    }

    fn is_muted(&self) -> bool {
        self.lock().muted
    }

    fn set_muted(&self, muted: bool) {
        self.lock().muted = muted;
    }

    fn volume(&self) -> f64 {
        self.lock().volume
    }

    fn set_volume(&self, volume: f64) {
        self.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn is_visible(&self) -> bool {
        self.lock().visible
    }

    fn set_visible(&self, visible: bool) {
        self.lock().visible = visible;
    }

    fn controls_enabled(&self) -> bool {
        self.lock().controls_enabled
    }

    fn set_controls_enabled(&self, enabled: bool) {
        self.lock().controls_enabled = enabled;
    }

    fn capture_stream(&self) -> MockshotResult<CapturedStream> {
        let audio_tracks = if self.probe.has_audio {
            vec![AudioTrack {
                id: format!("{}-audio-0", self.id),
                label: "audio".to_string(),
                source: Some(self.path.clone()),
            }]
        } else {
            Vec::new()
        };
        Ok(CapturedStream { audio_tracks })
    }

    fn current_frame(&self) -> Option<Arc<RgbaImage>> {
        let secs = self.current_time();
        match self.frame_at(secs) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(element = %self.id, error = %e, "Failed to decode frame");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_with_audio() {
        let raw = br#"{
            "streams": [
                {"codec_type": "video", "width": 1280, "height": 720},
                {"codec_type": "audio"}
            ],
            "format": {"duration": "3.040000"}
        }"#;
        let probe = parse_probe_output(raw).unwrap();
        assert_eq!(probe.width, 1280);
        assert_eq!(probe.height, 720);
        assert!(probe.has_audio);
        assert!((probe.duration_secs - 3.04).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_without_duration_is_nan() {
        let raw = br#"{"streams": [{"codec_type": "video", "width": 10, "height": 10}]}"#;
        let probe = parse_probe_output(raw).unwrap();
        assert!(probe.duration_secs.is_nan());
        assert!(!probe.has_audio);
    }

    #[test]
    fn test_parse_probe_requires_video() {
        let raw = br#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "1.0"}}"#;
        assert!(matches!(
            parse_probe_output(raw),
            Err(MockshotError::Acquisition { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = probe_media(Path::new("/nonexistent/clip.mp4")).unwrap_err();
        assert!(matches!(err, MockshotError::FileNotFound { .. }));
    }
}
