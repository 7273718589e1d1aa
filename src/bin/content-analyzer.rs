//! HTTP server binary for content-analyzer.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `AnalyzerConfig` / `ServerConfig` and serves until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use content_analyzer::pipeline::ocr::is_tesseract_available;
use content_analyzer::{
    serve, AnalysisBackend, Analyzer, AnalyzerConfig, Environment, IntakePolicy, ServerConfig,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Development server on :4000 (allows http://localhost:5173)
  GEMINI_API_KEY=AIza... content-analyzer

  # Production, explicit client origins
  content-analyzer --env production --allowed-origins https://app.example.com

  # Use another provider for the analysis step
  OPENAI_API_KEY=sk-... content-analyzer --backend openai --model gpt-4.1-mini

  # Repeat the browser's 10 MB / image-or-PDF checks on the server
  content-analyzer --strict-intake

ENDPOINTS:
  POST /analysis       multipart form, one field named "file"
  POST /api/analysis   same handler
  GET  /health         {"status":"ok","version":"..."}

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default backend)
  OPENAI_API_KEY          OpenAI key, for --backend openai
  ANTHROPIC_API_KEY       Anthropic key, for --backend anthropic
  PDFIUM_LIB_PATH         Directory containing libpdfium
  TESSERACT_PATH          tesseract binary (default: found on PATH)
  RUST_LOG                Log filter, overrides --verbose

  Variables may also be placed in a .env file in the working directory.
"#;

/// Analyse uploaded images and PDFs as social media content.
#[derive(Parser, Debug)]
#[command(
    name = "content-analyzer",
    version,
    about = "Analyse uploaded images and PDFs as social media content",
    long_about = "HTTP service that extracts text from uploaded images and PDFs (embedded text \
layer when present, tesseract OCR otherwise) and asks an LLM for an engagement score, tone, \
platform fit, tags and suggestions.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 4000)]
    port: u16,

    /// Deployment environment: development or production.
    #[arg(long = "env", env = "APP_ENV", value_enum, default_value = "development")]
    environment: EnvArg,

    /// Comma-separated origins allowed to call the API.
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    allowed_origins: Vec<String>,

    /// Analysis backend: gemini, or any edgequake-llm provider (openai, anthropic, ollama, …).
    #[arg(long, env = "ANALYZER_BACKEND", default_value = "gemini")]
    backend: String,

    /// Model ID for the analysis backend.
    #[arg(long, env = "ANALYZER_MODEL")]
    model: Option<String>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Gemini API base URL override.
    #[arg(long, env = "ANALYSIS_ENDPOINT")]
    endpoint: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "ANALYZER_TEMPERATURE")]
    temperature: Option<f32>,

    /// Analysis deadline in seconds.
    #[arg(long, env = "ANALYSIS_TIMEOUT_SECS", default_value_t = 60)]
    analysis_timeout: u64,

    /// Text-layer characters a PDF must exceed to skip OCR.
    #[arg(long, env = "MIN_TEXT_CHARS", default_value_t = 20)]
    min_text_chars: usize,

    /// Page upscaling factor for OCR rasterisation (0.5–4.0).
    #[arg(long, env = "RASTER_SCALE", default_value_t = 2.0)]
    raster_scale: f32,

    /// Language reported to the analysis service.
    #[arg(long, env = "CONTENT_LANGUAGE", default_value = "English")]
    language: String,

    /// Tesseract language pack.
    #[arg(long, env = "OCR_LANGUAGE", default_value = "eng")]
    ocr_language: String,

    /// tesseract binary.
    #[arg(long, env = "TESSERACT_PATH", default_value = "tesseract")]
    tesseract_path: PathBuf,

    /// Directory containing libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Parent directory for per-request scratch directories.
    #[arg(long, env = "SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Reject non-image/non-PDF uploads and uploads above --max-upload-mb.
    #[arg(long, env = "STRICT_INTAKE")]
    strict_intake: bool,

    /// Upload size limit in MiB used by --strict-intake.
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 10)]
    max_upload_mb: u64,

    /// Request body limit in MiB, multipart overhead included.
    #[arg(long, env = "MAX_BODY_MB", default_value_t = 12)]
    max_body_mb: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ANALYZER_VERBOSE")]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum EnvArg {
    Development,
    Production,
}

impl From<EnvArg> for Environment {
    fn from(v: EnvArg) -> Self {
        match v {
            EnvArg::Development => Environment::Development,
            EnvArg::Production => Environment::Production,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let server = ServerConfig {
        host: cli.host.clone(),
        port: cli.port,
        allowed_origins: cli.allowed_origins.clone(),
        max_body_bytes: cli.max_body_mb * 1024 * 1024,
        environment: cli.environment.clone().into(),
    };

    if !is_tesseract_available(&config.tesseract_path).await {
        warn!(
            "tesseract not found at {}; scanned PDFs and images will fail until it is installed",
            config.tesseract_path.display()
        );
    }

    // ── Run server ───────────────────────────────────────────────────────
    let analyzer = Arc::new(
        Analyzer::from_config(config).context("Failed to set up the analysis backend")?,
    );

    serve(analyzer, &server, shutdown_signal())
        .await
        .context("Server failed")?;

    Ok(())
}

fn build_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let mut builder = AnalyzerConfig::builder()
        .min_text_chars(cli.min_text_chars)
        .raster_scale(cli.raster_scale)
        .analysis_timeout_secs(cli.analysis_timeout)
        .language(&cli.language)
        .ocr_language(&cli.ocr_language)
        .tesseract_path(&cli.tesseract_path)
        .backend(AnalysisBackend::parse(&cli.backend));

    if cli.strict_intake {
        builder = builder.intake(IntakePolicy::strict(cli.max_upload_mb * 1024 * 1024));
    }
    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path);
    }
    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_root(dir);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref key) = cli.gemini_api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref url) = cli.endpoint {
        builder = builder.endpoint(url);
    }
    if let Some(t) = cli.temperature {
        builder = builder.temperature(t);
    }

    let config = builder.build().context("Invalid configuration")?;
    info!("Configuration: {:?}", config);
    Ok(config)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Could not listen for Ctrl-C: {}", e),
    }
}
