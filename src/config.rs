//! Configuration types for the analyzer and its HTTP surface.
//!
//! Pipeline behaviour is controlled through [`AnalyzerConfig`], built via its
//! [`AnalyzerConfigBuilder`]; the listener, CORS allow-list and body limit
//! live in [`ServerConfig`]. Every policy value the pipeline relies on (text
//! threshold, raster scale, analysis deadline) is a named field here rather
//! than a literal in the stage that uses it.

use crate::error::AnalyzerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default Gemini model used when no model is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Origin of the Vite dev server the browser client runs on locally.
pub const DEV_CLIENT_ORIGIN: &str = "http://localhost:5173";

/// Configuration for the extraction + analysis pipeline.
///
/// # Example
/// ```rust
/// use content_analyzer::AnalyzerConfig;
///
/// let config = AnalyzerConfig::builder()
///     .min_text_chars(40)
///     .analysis_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.min_text_chars, 40);
/// ```
#[derive(Clone)]
pub struct AnalyzerConfig {
    /// Trimmed text-layer length a PDF must exceed to skip OCR. Default: 20.
    ///
    /// Scanned PDFs often carry a handful of stray characters (page numbers,
    /// scanner watermarks) in their text layer. Anything at or below this
    /// count is treated as "no real text" and the PDF goes through OCR.
    pub min_text_chars: usize,

    /// Upscaling factor applied when rasterising PDF pages for OCR. Range: 0.5–4.0. Default: 2.0.
    pub raster_scale: f32,

    /// Deadline for one analysis-service call in seconds. Default: 60.
    pub analysis_timeout_secs: u64,

    /// Language reported to the analysis service. Default: "English".
    pub language: String,

    /// Tesseract language pack. Default: "eng".
    pub ocr_language: String,

    /// Path to the tesseract binary. Default: "tesseract" (resolved via PATH).
    pub tesseract_path: PathBuf,

    /// Directory containing libpdfium. If None, binds to the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Parent directory for per-request scratch directories. If None, uses the OS temp dir.
    pub scratch_root: Option<PathBuf>,

    /// Server-side upload checks.
    pub intake: IntakePolicy,

    /// Which analysis service to talk to.
    pub backend: AnalysisBackend,

    /// Model identifier. If None, uses the backend default.
    pub model: Option<String>,

    /// API key for the Gemini backend. Falls back to `GEMINI_API_KEY`.
    pub api_key: Option<String>,

    /// Base URL override for the Gemini backend.
    pub endpoint: Option<String>,

    /// Sampling temperature. If None, uses the service default.
    pub temperature: Option<f32>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_text_chars: 20,
            raster_scale: 2.0,
            analysis_timeout_secs: 60,
            language: "English".to_string(),
            ocr_language: "eng".to_string(),
            tesseract_path: PathBuf::from("tesseract"),
            pdfium_lib_path: None,
            scratch_root: None,
            intake: IntakePolicy::default(),
            backend: AnalysisBackend::default(),
            model: None,
            api_key: None,
            endpoint: None,
            temperature: None,
        }
    }
}

impl fmt::Debug for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerConfig")
            .field("min_text_chars", &self.min_text_chars)
            .field("raster_scale", &self.raster_scale)
            .field("analysis_timeout_secs", &self.analysis_timeout_secs)
            .field("language", &self.language)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_path", &self.tesseract_path)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("scratch_root", &self.scratch_root)
            .field("intake", &self.intake)
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl AnalyzerConfig {
    /// Create a new builder for `AnalyzerConfig`.
    pub fn builder() -> AnalyzerConfigBuilder {
        AnalyzerConfigBuilder {
            config: Self::default(),
        }
    }

    /// The analysis deadline as a `Duration`.
    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.analysis_timeout_secs)
    }
}

/// Builder for [`AnalyzerConfig`].
#[derive(Debug)]
pub struct AnalyzerConfigBuilder {
    config: AnalyzerConfig,
}

impl AnalyzerConfigBuilder {
    pub fn min_text_chars(mut self, n: usize) -> Self {
        self.config.min_text_chars = n;
        self
    }

    pub fn raster_scale(mut self, scale: f32) -> Self {
        self.config.raster_scale = scale.clamp(0.5, 4.0);
        self
    }

    pub fn analysis_timeout_secs(mut self, secs: u64) -> Self {
        self.config.analysis_timeout_secs = secs;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn ocr_language(mut self, language: impl Into<String>) -> Self {
        self.config.ocr_language = language.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn scratch_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = Some(path.into());
        self
    }

    pub fn intake(mut self, policy: IntakePolicy) -> Self {
        self.config.intake = policy;
        self
    }

    pub fn backend(mut self, backend: AnalysisBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = Some(url.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalyzerConfig, AnalyzerError> {
        let c = &self.config;
        if c.analysis_timeout_secs == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "Analysis timeout must be ≥ 1 second".into(),
            ));
        }
        if c.language.trim().is_empty() {
            return Err(AnalyzerError::InvalidConfig(
                "Language must not be empty".into(),
            ));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(AnalyzerError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.intake.enforce && c.intake.max_upload_bytes == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "Upload size limit must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Intake policy ────────────────────────────────────────────────────────

/// Server-side checks applied to an upload before anything touches disk.
///
/// Off by default: the browser client already restricts uploads to images
/// and PDFs of at most 10 MB, and the service historically trusted it.
/// Turning `enforce` on repeats those checks on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakePolicy {
    /// Reject non-image, non-PDF types and oversized files.
    pub enforce: bool,
    /// Largest accepted upload when `enforce` is set. Default: 10 MiB.
    pub max_upload_bytes: u64,
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            enforce: false,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl IntakePolicy {
    /// Policy with server-side checks switched on.
    pub fn strict(max_upload_bytes: u64) -> Self {
        Self {
            enforce: true,
            max_upload_bytes,
        }
    }
}

// ── Backend selection ────────────────────────────────────────────────────

/// The service that turns extracted text into an [`crate::AnalysisResult`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisBackend {
    /// Gemini `generateContent` with a response schema. (default)
    #[default]
    Gemini,
    /// Any provider known to `edgequake-llm` ("openai", "anthropic", "ollama", …).
    Provider(String),
}

impl AnalysisBackend {
    /// Parse a backend name; anything other than "gemini" names a provider.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "" | "gemini" | "google" => AnalysisBackend::Gemini,
            other => AnalysisBackend::Provider(other.to_string()),
        }
    }
}

impl fmt::Display for AnalysisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisBackend::Gemini => write!(f, "gemini"),
            AnalysisBackend::Provider(name) => write!(f, "{name}"),
        }
    }
}

// ── Server ───────────────────────────────────────────────────────────────

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    /// Local development: the Vite dev server origin is always allowed. (default)
    #[default]
    Development,
    /// Production: only explicitly configured origins are allowed.
    Production,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address. Default: "0.0.0.0".
    pub host: String,
    /// Listening port. Default: 4000.
    pub port: u16,
    /// Origins allowed to call the API with credentials.
    pub allowed_origins: Vec<String>,
    /// Largest accepted request body, multipart overhead included. Default: 12 MiB.
    pub max_body_bytes: usize,
    /// Deployment environment.
    pub environment: Environment,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            allowed_origins: Vec::new(),
            max_body_bytes: 12 * 1024 * 1024,
            environment: Environment::default(),
        }
    }
}

impl ServerConfig {
    /// Configured origins plus the dev client origin in development.
    pub fn effective_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = self
            .allowed_origins
            .iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if self.environment == Environment::Development {
            origins.push(DEV_CLIENT_ORIGIN.to_string());
        }
        origins.sort();
        origins.dedup();
        origins
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy_values() {
        let c = AnalyzerConfig::default();
        assert_eq!(c.min_text_chars, 20);
        assert_eq!(c.raster_scale, 2.0);
        assert_eq!(c.analysis_timeout(), Duration::from_secs(60));
        assert_eq!(c.language, "English");
        assert!(!c.intake.enforce);
    }

    #[test]
    fn raster_scale_is_clamped() {
        let c = AnalyzerConfig::builder().raster_scale(12.0).build().unwrap();
        assert_eq!(c.raster_scale, 4.0);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = AnalyzerConfig::builder()
            .analysis_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = AnalyzerConfig::builder().api_key("AIza-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("AIza-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn backend_parse() {
        assert_eq!(AnalysisBackend::parse("Gemini"), AnalysisBackend::Gemini);
        assert_eq!(AnalysisBackend::parse(""), AnalysisBackend::Gemini);
        assert_eq!(
            AnalysisBackend::parse("openai"),
            AnalysisBackend::Provider("openai".into())
        );
    }

    #[test]
    fn development_adds_dev_origin() {
        let server = ServerConfig {
            allowed_origins: vec!["https://example.app/".into()],
            ..Default::default()
        };
        assert_eq!(
            server.effective_origins(),
            vec!["http://localhost:5173".to_string(), "https://example.app".to_string()]
        );
    }

    #[test]
    fn production_uses_only_configured_origins() {
        let server = ServerConfig {
            allowed_origins: vec!["https://example.app".into(), " ".into()],
            environment: Environment::Production,
            ..Default::default()
        };
        assert_eq!(server.effective_origins(), vec!["https://example.app".to_string()]);
    }
}
