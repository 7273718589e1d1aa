//! Text extraction: uploaded file → [`ExtractedText`].
//!
//! ```text
//!            ┌─ text layer > threshold ──────────────▶ Sufficient(text)
//!  PDF ──────┤
//!            └─ NeedsOcr ─▶ rasterise all pages ─▶ OCR page 1..n ─▶ "p1\np2\n…"
//!
//!  image ────▶ normalise to PNG ─▶ OCR once
//! ```
//!
//! Whichever branch runs, whitespace-only output ends the request with
//! [`AnalyzerError::NoTextExtracted`].

use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::pipeline::intake::{UploadKind, UploadedFile};
use crate::pipeline::normalize::{ImageNormalizer, PngNormalizer};
use crate::pipeline::ocr::{OcrEngine, TesseractEngine};
use crate::pipeline::render::{page_image_path, PdfBackend, PdfiumBackend, TextLayer};
use crate::pipeline::scope::RequestScope;
use std::sync::Arc;
use tracing::{debug, info};

/// The external tools the extraction stage drives.
#[derive(Clone)]
pub struct ExtractionTools {
    pub pdf: Arc<dyn PdfBackend>,
    pub normalizer: Arc<dyn ImageNormalizer>,
    pub ocr: Arc<dyn OcrEngine>,
}

impl ExtractionTools {
    /// pdfium + PNG normaliser + tesseract, configured from `config`.
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        Self {
            pdf: Arc::new(PdfiumBackend::new(config.pdfium_lib_path.clone())),
            normalizer: Arc::new(PngNormalizer),
            ocr: Arc::new(TesseractEngine::new(
                config.tesseract_path.clone(),
                config.ocr_language.clone(),
            )),
        }
    }
}

/// How the text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionRoute {
    /// Embedded PDF text, no OCR.
    TextLayer,
    /// PDF rasterised and OCR'd page by page.
    PdfOcr { pages: usize },
    /// Image normalised and OCR'd once.
    ImageOcr,
}

/// Text pulled out of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub content: String,
    pub route: ExtractionRoute,
}

impl ExtractedText {
    pub fn new(content: impl Into<String>, route: ExtractionRoute) -> Self {
        Self {
            content: content.into(),
            route,
        }
    }

    /// Number of non-blank lines.
    pub fn line_count(&self) -> usize {
        count_lines(&self.content)
    }
}

/// Count lines containing anything besides whitespace.
pub fn count_lines(text: &str) -> usize {
    text.split('\n').filter(|line| !line.trim().is_empty()).count()
}

/// Verdict on a PDF's embedded text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectText {
    /// Enough real text; use it as is.
    Sufficient(String),
    /// Too little text; the PDF is treated as scanned.
    NeedsOcr { page_count: usize },
}

/// Judge a text layer against the `min_chars` threshold.
///
/// The text must have *more than* `min_chars` characters after trimming.
pub fn assess_text_layer(layer: TextLayer, min_chars: usize) -> DirectText {
    if layer.text.trim().chars().count() > min_chars {
        DirectText::Sufficient(layer.text)
    } else {
        DirectText::NeedsOcr {
            page_count: layer.page_count,
        }
    }
}

/// Run the extraction branch selected by the upload's kind.
pub async fn extract_text(
    file: &UploadedFile,
    scope: &mut RequestScope,
    tools: &ExtractionTools,
    config: &AnalyzerConfig,
) -> Result<ExtractedText, AnalyzerError> {
    let extracted = match file.kind {
        UploadKind::Pdf => extract_pdf(file, scope, tools, config).await?,
        UploadKind::Image => extract_image(file, scope, tools).await?,
    };

    if extracted.content.trim().is_empty() {
        info!("No text extracted ({:?})", extracted.route);
        return Err(AnalyzerError::NoTextExtracted);
    }

    Ok(extracted)
}

async fn extract_pdf(
    file: &UploadedFile,
    scope: &mut RequestScope,
    tools: &ExtractionTools,
    config: &AnalyzerConfig,
) -> Result<ExtractedText, AnalyzerError> {
    let layer = tools.pdf.text_layer(&file.path).await?;

    let page_count = match assess_text_layer(layer, config.min_text_chars) {
        DirectText::Sufficient(text) => {
            debug!("Using embedded text layer ({} chars)", text.len());
            return Ok(ExtractedText::new(text, ExtractionRoute::TextLayer));
        }
        DirectText::NeedsOcr { page_count } => page_count,
    };

    info!("Text layer below threshold; OCR over {} page(s)", page_count);

    let stem = file.stem();
    let dir = scope.dir().to_path_buf();
    let targets: Vec<_> = (0..page_count)
        .map(|idx| scope.track(page_image_path(&dir, &stem, idx)))
        .collect();

    let pages = tools
        .pdf
        .rasterize(&file.path, config.raster_scale, &targets)
        .await?;

    let session = scope.ocr_session(tools.ocr.as_ref()).await?;
    let mut content = String::new();
    for page in &pages {
        let text = session.recognize(page).await?;
        content.push_str(&text);
        content.push('\n');
    }

    Ok(ExtractedText::new(
        content,
        ExtractionRoute::PdfOcr { pages: pages.len() },
    ))
}

async fn extract_image(
    file: &UploadedFile,
    scope: &mut RequestScope,
    tools: &ExtractionTools,
) -> Result<ExtractedText, AnalyzerError> {
    let normalized = scope.track(scope.dir().join(format!("{}.normalized.png", file.stem())));
    tools.normalizer.normalize(&file.path, &normalized).await?;

    let session = scope.ocr_session(tools.ocr.as_ref()).await?;
    let content = session.recognize(&normalized).await?;

    Ok(ExtractedText::new(content, ExtractionRoute::ImageOcr))
}
