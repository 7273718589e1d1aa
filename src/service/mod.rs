//! Analysis service backends.
//!
//! An [`AnalysisService`] takes an [`AnalysisRequest`] and returns the
//! model's raw JSON verdict. Validation against the result schema happens in
//! [`crate::pipeline::analysis`], not here, so every backend is held to the
//! same contract.
//!
//! * [`GeminiService`]: Gemini `generateContent` with a response schema.
//! * [`ProviderService`]: any chat provider from `edgequake-llm`.

mod gemini;
mod provider;

pub use gemini::{GeminiService, DEFAULT_GEMINI_ENDPOINT};
pub use provider::ProviderService;

use crate::config::{AnalysisBackend, AnalyzerConfig, DEFAULT_GEMINI_MODEL};
use crate::error::AnalyzerError;
use crate::pipeline::analysis::AnalysisRequest;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// A remote content-analysis service.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Short name for logs ("gemini", "openai", …).
    fn name(&self) -> &str;

    /// Submit one request and return the service's JSON verdict.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<serde_json::Value, AnalyzerError>;
}

/// Build the analysis service described by `config`.
///
/// Resolution order, most specific first:
///
/// 1. **Named provider** (`AnalysisBackend::Provider`): created through
///    `edgequake-llm`, which reads that provider's own API key variable.
/// 2. **Gemini with an explicit key** (`config.api_key`).
/// 3. **Gemini with `GEMINI_API_KEY`** from the environment.
/// 4. **Auto-detection**: whatever provider `edgequake-llm` finds keys for.
///
/// Callers that already hold a service skip this and pass it to
/// [`crate::Analyzer::new`] directly.
pub fn resolve_service(config: &AnalyzerConfig) -> Result<Arc<dyn AnalysisService>, AnalyzerError> {
    if let AnalysisBackend::Provider(ref name) = config.backend {
        let service = ProviderService::create(name, config.model.as_deref(), config.temperature)?;
        info!("Analysis backend: {} ({})", name, service.model());
        return Ok(Arc::new(service));
    }

    let key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()));

    if let Some(key) = key {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        let endpoint = config.endpoint.as_deref().unwrap_or(DEFAULT_GEMINI_ENDPOINT);
        info!("Analysis backend: gemini ({})", model);
        return Ok(Arc::new(GeminiService::new(
            endpoint,
            key,
            model,
            config.temperature,
            config.analysis_timeout(),
        )?));
    }

    let service = ProviderService::from_env(config.temperature).map_err(|e| {
        AnalyzerError::ServiceNotConfigured {
            backend: "gemini".to_string(),
            hint: format!(
                "Set GEMINI_API_KEY (or pass --gemini-api-key), or choose another backend \
                 with --backend openai|anthropic|ollama.\nAuto-detection: {e}"
            ),
        }
    })?;
    info!("Analysis backend: auto-detected {}", service.name());
    Ok(Arc::new(service))
}
