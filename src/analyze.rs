//! Request orchestration: one upload in, one [`AnalysisResult`] or error out.
//!
//! Every request gets its own [`RequestScope`]. Whatever happens between
//! intake and analysis, the scope is released before the outcome is
//! returned, so no scratch file outlives the request that created it.

use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::pipeline::analysis::{AnalysisClient, AnalysisResult};
use crate::pipeline::extract::{extract_text, ExtractionTools};
use crate::pipeline::intake::{check_policy, persist, Upload};
use crate::pipeline::scope::RequestScope;
use crate::service::{resolve_service, AnalysisService};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs the extraction and analysis pipeline for uploads.
///
/// Cheap to share: the tools and the service are reference-counted and the
/// analyzer itself holds no per-request state.
#[derive(Clone)]
pub struct Analyzer {
    config: AnalyzerConfig,
    tools: ExtractionTools,
    client: AnalysisClient,
}

impl Analyzer {
    /// Assemble an analyzer from explicit parts. Tests inject mocks here.
    pub fn new(config: AnalyzerConfig, tools: ExtractionTools, service: Arc<dyn AnalysisService>) -> Self {
        let client = AnalysisClient::new(service, config.analysis_timeout(), config.language.clone());
        Self {
            config,
            tools,
            client,
        }
    }

    /// pdfium, tesseract and the service resolved from `config`.
    pub fn from_config(config: AnalyzerConfig) -> Result<Self, AnalyzerError> {
        let tools = ExtractionTools::from_config(&config);
        let service = resolve_service(&config)?;
        Ok(Self::new(config, tools, service))
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Name of the analysis backend in use.
    pub fn service_name(&self) -> &str {
        self.client.service_name()
    }

    /// Analyse one upload.
    ///
    /// `None` (or an empty file part) is rejected before any storage is
    /// created. Otherwise the scratch directory is always released, on
    /// success and on every error path alike.
    pub async fn analyze(&self, upload: Option<Upload>) -> Result<AnalysisResult, AnalyzerError> {
        let upload = match upload {
            Some(u) if !u.is_blank() => u,
            _ => return Err(AnalyzerError::NoFileUploaded),
        };

        check_policy(&upload, &self.config.intake)?;

        info!(
            "Analysing upload {:?} ({} bytes, {})",
            upload.file_name.as_deref().unwrap_or("<unnamed>"),
            upload.bytes.len(),
            upload.mime().as_deref().unwrap_or("no content type")
        );

        let start = Instant::now();
        let mut scope = RequestScope::open(self.config.scratch_root.as_deref())?;

        let outcome = self.run(&mut scope, upload).await;

        let removed = scope.release().await;
        debug!("Released {} scratch file(s)", removed);

        match &outcome {
            Ok(_) => info!("Request finished in {}ms", start.elapsed().as_millis()),
            Err(e) if e.is_service_error() => warn!(
                "Analysis via {} failed after {}ms: {}",
                self.client.service_name(),
                start.elapsed().as_millis(),
                e
            ),
            Err(e) => warn!("Request failed after {}ms: {}", start.elapsed().as_millis(), e),
        }

        outcome
    }

    async fn run(&self, scope: &mut RequestScope, upload: Upload) -> Result<AnalysisResult, AnalyzerError> {
        // ── Step 1: Persist ──────────────────────────────────────────────
        let file = persist(scope, upload).await?;
        debug!(
            "Stored {} as {:?} upload at {} ({} bytes, declared {})",
            file.original_name.as_deref().unwrap_or("<unnamed>"),
            file.kind,
            file.path.display(),
            file.size,
            file.mime.as_deref().unwrap_or("no content type")
        );

        // ── Step 2: Extract ──────────────────────────────────────────────
        let extract_start = Instant::now();
        let text = extract_text(&file, scope, &self.tools, &self.config).await?;
        info!(
            "Extracted {} chars via {:?} in {}ms",
            text.content.len(),
            text.route,
            extract_start.elapsed().as_millis()
        );

        // ── Step 3: Analyse ──────────────────────────────────────────────
        self.client.analyze(&text).await
    }
}
