//! OCR over raster images via the Tesseract CLI.
//!
//! The engine is split into two halves so the request scope can own the
//! lifecycle: an [`OcrEngine`] is shared by all requests and only knows how
//! to start a session; each [`OcrSession`] belongs to exactly one request and
//! is released by that request's cleanup.
//!
//! Tesseract runs as a child process per image (`tesseract <img> stdout -l
//! <lang>`). The child is killed if the request future is dropped, so an
//! abandoned request never leaves an OCR process behind.

use crate::error::AnalyzerError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Starts per-request OCR sessions.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Start a session. Fails if the engine cannot run at all.
    async fn initialize(&self) -> Result<Box<dyn OcrSession>, AnalyzerError>;
}

/// One request's handle on the OCR engine.
#[async_trait]
pub trait OcrSession: Send {
    /// Recognise the text in one image.
    async fn recognize(&mut self, image: &Path) -> Result<String, AnalyzerError>;

    /// Give back whatever the session holds. Must not fail.
    async fn release(&mut self);
}

/// [`OcrEngine`] backed by the `tesseract` binary.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    /// Probe `tesseract --version` so a missing install surfaces once, as
    /// `OcrUnavailable`, instead of as a failure on every page.
    async fn initialize(&self) -> Result<Box<dyn OcrSession>, AnalyzerError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AnalyzerError::OcrUnavailable {
                detail: format!("cannot run '{}': {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(AnalyzerError::OcrUnavailable {
                detail: format!(
                    "'{} --version' exited with {}",
                    self.binary.display(),
                    output.status.code().unwrap_or(-1)
                ),
            });
        }

        // Tesseract 4 prints its banner on stderr, 5 on stdout.
        let banner = if output.stdout.is_empty() {
            &output.stderr
        } else {
            &output.stdout
        };
        let version = String::from_utf8_lossy(banner)
            .lines()
            .next()
            .unwrap_or("tesseract")
            .to_string();
        debug!("OCR engine ready: {}", version);

        Ok(Box::new(TesseractSession {
            binary: self.binary.clone(),
            language: self.language.clone(),
            images_read: 0,
        }))
    }
}

/// A request's Tesseract session.
struct TesseractSession {
    binary: PathBuf,
    language: String,
    images_read: usize,
}

#[async_trait]
impl OcrSession for TesseractSession {
    async fn recognize(&mut self, image: &Path) -> Result<String, AnalyzerError> {
        let target = image
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| image.display().to_string());

        let output = Command::new(&self.binary)
            .arg(image.as_os_str())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AnalyzerError::OcrFailed {
                target: target.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalyzerError::OcrFailed {
                target,
                detail: format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            });
        }

        self.images_read += 1;
        let text = String::from_utf8_lossy(&output.stdout).to_string();
        debug!("OCR {} → {} chars", target, text.len());
        Ok(text)
    }

    async fn release(&mut self) {
        debug!("Tesseract session done after {} image(s)", self.images_read);
        self.images_read = 0;
    }
}

/// Check whether a tesseract binary can be started at `binary`.
pub async fn is_tesseract_available(binary: &Path) -> bool {
    Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}
