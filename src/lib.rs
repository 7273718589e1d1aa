//! # content-analyzer
//!
//! Social media content analysis for uploaded images and PDFs.
//!
//! ## Why this crate?
//!
//! Posts arrive as screenshots, exported PDFs, or scanned flyers. This crate
//! gets the text out of whichever one was uploaded, using the PDF's own text
//! layer when it has one and OCR otherwise, and asks an analysis model for a
//! structured verdict: engagement score, tone, platform fit, tags and
//! suggestions.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Intake    persist the `file` part into a per-request scratch dir
//!  ├─ 2. Extract   PDF text layer, or rasterise + OCR, or image → PNG + OCR
//!  ├─ 3. Analyse   { content, line_count, language } → AnalysisService (60 s)
//!  ├─ 4. Validate  reply must match the result schema exactly
//!  └─ 5. Release   OCR session + every scratch file, on every path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use content_analyzer::{serve, Analyzer, AnalyzerConfig, ServerConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Backend auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let analyzer = Arc::new(Analyzer::from_config(AnalyzerConfig::default())?);
//!     let server = ServerConfig::default();
//!     serve(analyzer, &server, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `content-analyzer` binary (clap + anyhow + tracing-subscriber + dotenv) |
//!
//! ## External Tools
//!
//! | Tool | Used for | Located via |
//! |------|----------|-------------|
//! | libpdfium | PDF text layer, page rasterisation | `pdfium_lib_path`, else system library |
//! | tesseract | OCR | `tesseract_path` (default: `PATH`) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod response;
pub mod server;
pub mod service;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::Analyzer;
pub use config::{
    AnalysisBackend, AnalyzerConfig, AnalyzerConfigBuilder, Environment, IntakePolicy, ServerConfig,
};
pub use error::AnalyzerError;
pub use pipeline::analysis::{AnalysisRequest, AnalysisResult};
pub use pipeline::extract::{ExtractedText, ExtractionRoute, ExtractionTools};
pub use pipeline::intake::Upload;
pub use response::ErrorBody;
pub use server::{router, serve};
pub use service::{resolve_service, AnalysisService, GeminiService, ProviderService};
