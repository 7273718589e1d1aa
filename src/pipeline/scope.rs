//! Request-scoped scratch storage and resource release.
//!
//! Every request gets one [`RequestScope`]: a private temporary directory, a
//! registry of every file path the pipeline creates inside it, and the OCR
//! session if one was opened. Stages register a path *before* they write to
//! it, so a failure halfway through a stage still leaves the path on the
//! list. [`RequestScope::release`] drains everything exactly once; dropping
//! an unreleased scope (the request future was cancelled) removes the files
//! synchronously.

use crate::error::AnalyzerError;
use crate::pipeline::ocr::{OcrEngine, OcrSession};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Scratch directory, artifact registry and OCR session for one request.
pub struct RequestScope {
    dir: Option<TempDir>,
    root: PathBuf,
    artifacts: Vec<PathBuf>,
    ocr: Option<Box<dyn OcrSession>>,
}

impl RequestScope {
    /// Create a fresh scratch directory, under `parent` if given.
    pub fn open(parent: Option<&Path>) -> Result<Self, AnalyzerError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("analysis-");
        let dir = match parent {
            Some(p) => builder.tempdir_in(p),
            None => builder.tempdir(),
        }
        .map_err(|e| AnalyzerError::Internal(format!("scratch dir: {e}")))?;

        let root = dir.path().to_path_buf();
        debug!("Opened request scope at {}", root.display());

        Ok(Self {
            dir: Some(dir),
            root,
            artifacts: Vec::new(),
            ocr: None,
        })
    }

    /// The request's scratch directory.
    pub fn dir(&self) -> &Path {
        &self.root
    }

    /// Register a path for removal at release time and hand it back.
    pub fn track(&mut self, path: PathBuf) -> PathBuf {
        self.artifacts.push(path.clone());
        path
    }

    /// Paths registered so far, in registration order.
    pub fn tracked(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// The request's OCR session, initialising it on first use.
    ///
    /// Requests that never need OCR never start the engine.
    pub async fn ocr_session(
        &mut self,
        engine: &dyn OcrEngine,
    ) -> Result<&mut dyn OcrSession, AnalyzerError> {
        let session = match self.ocr.take() {
            Some(session) => session,
            None => {
                debug!("Starting OCR session");
                engine.initialize().await?
            }
        };
        Ok(self.ocr.insert(session).as_mut())
    }

    /// Whether an OCR session is currently held.
    pub fn has_ocr_session(&self) -> bool {
        self.ocr.is_some()
    }

    /// Release the OCR session and remove every registered file.
    ///
    /// Never fails: a file that is already gone is skipped silently, any
    /// other removal error is logged. Returns how many files were removed.
    /// Calling it again is a no-op.
    pub async fn release(&mut self) -> usize {
        if let Some(mut session) = self.ocr.take() {
            session.release().await;
            debug!("OCR session released");
        }

        let mut removed = 0;
        for path in self.artifacts.drain(..) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }

        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!("Could not remove scratch dir {}: {}", self.root.display(), e);
            }
        }

        removed
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        if self.artifacts.is_empty() && self.ocr.is_none() {
            return;
        }
        warn!(
            "Request scope dropped before release; removing {} file(s)",
            self.artifacts.len()
        );
        for path in self.artifacts.drain(..) {
            let _ = std::fs::remove_file(&path);
        }
        // The TempDir removes the directory itself when it drops right after.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ocr::OcrSession;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        started: AtomicUsize,
        released: AtomicUsize,
    }

    struct CountingEngine(Arc<Counters>);
    struct CountingSession(Arc<Counters>);

    #[async_trait]
    impl OcrEngine for CountingEngine {
        async fn initialize(&self) -> Result<Box<dyn OcrSession>, AnalyzerError> {
            self.0.started.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingSession(Arc::clone(&self.0))))
        }
    }

    #[async_trait]
    impl OcrSession for CountingSession {
        async fn recognize(&mut self, _image: &Path) -> Result<String, AnalyzerError> {
            Ok(String::new())
        }

        async fn release(&mut self) {
            self.0.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn release_removes_tracked_files_and_dir() {
        let parent = tempfile::tempdir().unwrap();
        let mut scope = RequestScope::open(Some(parent.path())).unwrap();
        let a = scope.track(scope.dir().join("upload.pdf"));
        let b = scope.track(scope.dir().join("upload.page-1.png"));
        std::fs::write(&a, b"%PDF").unwrap();
        std::fs::write(&b, b"png").unwrap();

        assert_eq!(scope.release().await, 2);
        assert!(!a.exists());
        assert!(!b.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }

    #[test]
    fn release_twice_is_harmless() {
        let mut scope = RequestScope::open(None).unwrap();
        let path = scope.track(scope.dir().join("upload.png"));
        std::fs::write(&path, b"x").unwrap();

        assert_eq!(tokio_test::block_on(scope.release()), 1);
        assert_eq!(tokio_test::block_on(scope.release()), 0);
    }

    #[tokio::test]
    async fn missing_files_are_not_errors() {
        let mut scope = RequestScope::open(None).unwrap();
        let path = scope.track(scope.dir().join("never-written.png"));
        assert!(!path.exists());
        assert_eq!(scope.release().await, 0);
        assert!(scope.tracked().is_empty());
    }

    #[tokio::test]
    async fn ocr_session_is_lazy_single_and_released() {
        let counters = Arc::new(Counters::default());
        let engine = CountingEngine(Arc::clone(&counters));
        let mut scope = RequestScope::open(None).unwrap();
        assert!(!scope.has_ocr_session());

        scope.ocr_session(&engine).await.unwrap();
        scope.ocr_session(&engine).await.unwrap();
        assert_eq!(counters.started.load(Ordering::SeqCst), 1);

        scope.release().await;
        scope.release().await;
        assert_eq!(counters.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_without_release_removes_files() {
        let parent = tempfile::tempdir().unwrap();
        let path;
        {
            let mut scope = RequestScope::open(Some(parent.path())).unwrap();
            path = scope.track(scope.dir().join("upload.jpg"));
            std::fs::write(&path, b"jpeg").unwrap();
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }
}
