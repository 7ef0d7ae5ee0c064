//! Delivery of export payloads to the clipboard or the downloads folder.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockshot_capture_engine::ffmpeg::command_exists;
use mockshot_common::clock::Clock;
use mockshot_common::error::{MockshotError, MockshotResult};
use mockshot_mockup_model::job::ExportKind;
use tokio::io::AsyncWriteExt;

/// A system clipboard that accepts arbitrary mime payloads.
#[async_trait]
pub trait ClipboardWriter: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the clipboard can hold a payload of `mime`.
    fn supports(&self, mime: &str) -> bool;

    /// Write `payload`. Rejections are reported as `Permission` errors.
    async fn write(&self, payload: &[u8], mime: &str) -> MockshotResult<()>;
}

/// Where downloaded files end up.
#[async_trait]
pub trait DownloadTarget: Send + Sync {
    /// Store `payload` under `file_name` and return the final path.
    async fn save(&self, file_name: &str, payload: &[u8]) -> MockshotResult<PathBuf>;
}

/// Clipboard backed by `wl-copy` (Wayland) or `xclip` (X11).
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: &'static str,
}

impl CommandClipboard {
    /// Pick a clipboard tool for the current session, if one is usable.
    pub fn detect() -> Option<Self> {
        if std::env::var_os("WAYLAND_DISPLAY").is_some() && command_exists("wl-copy") {
            return Some(Self { program: "wl-copy" });
        }
        if std::env::var_os("DISPLAY").is_some() && command_exists("xclip") {
            return Some(Self { program: "xclip" });
        }
        tracing::debug!("No clipboard tool available");
        None
    }

    fn args(&self, mime: &str) -> Vec<String> {
        match self.program {
            "wl-copy" => vec!["--type".to_string(), mime.to_string()],
            _ => vec![
                "-selection".to_string(),
                "clipboard".to_string(),
                "-t".to_string(),
                mime.to_string(),
                "-i".to_string(),
            ],
        }
    }
}

#[async_trait]
impl ClipboardWriter for CommandClipboard {
    fn name(&self) -> &str {
        self.program
    }

    fn supports(&self, mime: &str) -> bool {
        mime.starts_with("image/") || mime.starts_with("video/")
    }

    async fn write(&self, payload: &[u8], mime: &str) -> MockshotResult<()> {
        let mut child = tokio::process::Command::new(self.program)
            .args(self.args(mime))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MockshotError::permission(format!("Failed to start {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| MockshotError::permission("Failed to open clipboard stdin"))?;
        stdin
            .write_all(payload)
            .await
            .map_err(|e| MockshotError::permission(format!("Clipboard write failed: {e}")))?;
        drop(stdin);

        let status = child.wait().await?;
        if !status.success() {
            return Err(MockshotError::permission(format!(
                "{} rejected the payload (status {status})",
                self.program
            )));
        }
        Ok(())
    }
}

/// Downloads written into a directory, with browser-style de-duplication
/// (`name (1).ext`) when a file already exists.
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (file_name, String::new()),
    };
    (1u32..)
        .map(|n| dir.join(format!("{stem} ({n}){ext}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[async_trait]
impl DownloadTarget for DirectoryDownloads {
    async fn save(&self, file_name: &str, payload: &[u8]) -> MockshotResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = unique_path(&self.dir, file_name);
        tokio::fs::write(&path, payload).await?;
        tracing::info!(path = %path.display(), bytes = payload.len(), "Saved download");
        Ok(path)
    }
}

/// How a payload reached the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Clipboard,
    Downloaded(PathBuf),
}

/// File extension for a payload mime type.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        _ => "bin",
    }
}

/// Hands finished exports to the user.
pub struct ExportSink {
    product_name: String,
    clipboard: Option<Arc<dyn ClipboardWriter>>,
    downloads: Arc<dyn DownloadTarget>,
    clipboard_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ExportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportSink")
            .field("product_name", &self.product_name)
            .field("clipboard", &self.clipboard.as_ref().map(|c| c.name().to_string()))
            .field("clipboard_timeout", &self.clipboard_timeout)
            .finish()
    }
}

impl ExportSink {
    pub fn new(
        product_name: impl Into<String>,
        downloads: Arc<dyn DownloadTarget>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            clipboard: None,
            downloads,
            clipboard_timeout: Duration::from_secs(5),
            clock,
        }
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn ClipboardWriter>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    pub fn with_clipboard_timeout(mut self, timeout: Duration) -> Self {
        self.clipboard_timeout = timeout;
        self
    }

    /// File name a payload of `kind` and `mime` is downloaded as.
    pub fn file_name(&self, kind: ExportKind, mime: &str) -> String {
        let ext = extension_for_mime(mime);
        match kind {
            ExportKind::StillImage => format!("{}.{ext}", self.product_name),
            ExportKind::VideoMockup => format!(
                "{}-video-{}.{ext}",
                self.product_name,
                self.clock.wall_millis()
            ),
        }
    }

    /// Deliver `payload`.
    ///
    /// Stills are always downloaded. Videos go to the clipboard first; when
    /// the clipboard is missing, refuses the mime type, rejects the write, or
    /// times out, the payload is downloaded instead and delivery still
    /// succeeds.
    pub async fn deliver(
        &self,
        payload: &[u8],
        kind: ExportKind,
        mime: &str,
    ) -> MockshotResult<Delivery> {
        if payload.is_empty() {
            return Err(MockshotError::encoding("no data recorded"));
        }

        if kind == ExportKind::VideoMockup {
            if let Some(clipboard) = &self.clipboard {
                match self.try_clipboard(clipboard.as_ref(), payload, mime).await {
                    Ok(()) => {
                        tracing::info!(clipboard = clipboard.name(), mime, "Copied export to clipboard");
                        return Ok(Delivery::Clipboard);
                    }
                    Err(e) => {
                        tracing::info!(reason = %e, "Clipboard unavailable; downloading instead");
                    }
                }
            }
        }

        let path = self.downloads.save(&self.file_name(kind, mime), payload).await?;
        Ok(Delivery::Downloaded(path))
    }

    async fn try_clipboard(
        &self,
        clipboard: &dyn ClipboardWriter,
        payload: &[u8],
        mime: &str,
    ) -> MockshotResult<()> {
        if !clipboard.supports(mime) {
            return Err(MockshotError::unsupported(format!(
                "{} cannot hold {mime}",
                clipboard.name()
            )));
        }
        tokio::time::timeout(self.clipboard_timeout, clipboard.write(payload, mime))
            .await
            .map_err(|_| MockshotError::permission("clipboard write timed out"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use mockshot_common::clock::ManualClock;

    struct FakeClipboard {
        accept: bool,
        writes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ClipboardWriter for FakeClipboard {
        fn name(&self) -> &str {
            "fake"
        }

        fn supports(&self, mime: &str) -> bool {
            mime != "video/webm"
        }

        async fn write(&self, _payload: &[u8], mime: &str) -> MockshotResult<()> {
            self.writes.lock().unwrap().push(mime.to_string());
            if self.accept {
                Ok(())
            } else {
                Err(MockshotError::permission("denied"))
            }
        }
    }

    #[derive(Default)]
    struct MemoryDownloads {
        saved: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl DownloadTarget for MemoryDownloads {
        async fn save(&self, file_name: &str, payload: &[u8]) -> MockshotResult<PathBuf> {
            self.saved
                .lock()
                .unwrap()
                .push((file_name.to_string(), payload.len()));
            Ok(PathBuf::from(file_name))
        }
    }

    fn sink(downloads: Arc<MemoryDownloads>) -> ExportSink {
        ExportSink::new("mockshot", downloads, Arc::new(ManualClock::new(1_700_000_000_000)))
    }

    fn clipboard(accept: bool) -> Arc<FakeClipboard> {
        Arc::new(FakeClipboard {
            accept,
            writes: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_still_is_downloaded_with_product_name() {
        let downloads = Arc::new(MemoryDownloads::default());
        let clip = clipboard(true);
        let delivery = sink(Arc::clone(&downloads))
            .with_clipboard(clip.clone())
            .deliver(b"png", ExportKind::StillImage, "image/png")
            .await
            .unwrap();

        assert_eq!(delivery, Delivery::Downloaded(PathBuf::from("mockshot.png")));
        assert!(clip.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_video_prefers_clipboard() {
        let downloads = Arc::new(MemoryDownloads::default());
        let delivery = sink(Arc::clone(&downloads))
            .with_clipboard(clipboard(true))
            .deliver(b"mp4", ExportKind::VideoMockup, "video/mp4")
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Clipboard);
        assert!(downloads.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clipboard_rejection_falls_back_to_download() {
        let downloads = Arc::new(MemoryDownloads::default());
        let delivery = sink(Arc::clone(&downloads))
            .with_clipboard(clipboard(false))
            .deliver(b"mp4", ExportKind::VideoMockup, "video/mp4")
            .await
            .unwrap();
        assert_eq!(
            delivery,
            Delivery::Downloaded(PathBuf::from("mockshot-video-1700000000000.mp4"))
        );
    }

    #[tokio::test]
    async fn test_unsupported_mime_skips_clipboard_write() {
        let downloads = Arc::new(MemoryDownloads::default());
        let clip = clipboard(true);
        let delivery = sink(Arc::clone(&downloads))
            .with_clipboard(clip.clone())
            .deliver(b"webm", ExportKind::VideoMockup, "video/webm")
            .await
            .unwrap();
        assert!(matches!(delivery, Delivery::Downloaded(_)));
        assert!(clip.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_clipboard_downloads_video() {
        let downloads = Arc::new(MemoryDownloads::default());
        let delivery = sink(Arc::clone(&downloads))
            .deliver(b"webm", ExportKind::VideoMockup, "video/webm;codecs=vp9")
            .await
            .unwrap();
        assert_eq!(
            delivery,
            Delivery::Downloaded(PathBuf::from("mockshot-video-1700000000000.webm"))
        );
    }

    #[tokio::test]
    async fn test_directory_downloads_do_not_overwrite() {
        let dir = std::env::temp_dir().join(format!("mockshot-sink-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let downloads = DirectoryDownloads::new(&dir);
        let first = downloads.save("mockshot.png", b"a").await.unwrap();
        let second = downloads.save("mockshot.png", b"b").await.unwrap();

        assert_eq!(first.file_name().unwrap(), "mockshot.png");
        assert_eq!(second.file_name().unwrap(), "mockshot (1).png");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_extension_for_mime() {
        assert_eq!(extension_for_mime("video/mp4;codecs=avc1"), "mp4");
        assert_eq!(extension_for_mime("image/svg+xml"), "svg");
        assert_eq!(extension_for_mime("application/octet-stream"), "bin");
    }
}
