//! PDF access via pdfium: the embedded text layer and page rasterisation.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations, preventing the Tokio worker
//! threads from stalling during CPU-heavy rendering.
//!
//! ## Why do callers choose the page file names?
//!
//! The pipeline registers every page path for cleanup before rendering
//! starts. If pdfium fails on page 3, pages 1 and 2 are already on disk and
//! already on the cleanup list.

use crate::error::AnalyzerError;
use async_trait::async_trait;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Text layer of a PDF plus its page count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLayer {
    /// Embedded text of all pages in page order, one page per line block.
    pub text: String,
    /// Number of pages in the document.
    pub page_count: usize,
}

/// Reads and rasterises PDFs.
#[async_trait]
pub trait PdfBackend: Send + Sync {
    /// Read the embedded text of every page.
    async fn text_layer(&self, pdf: &Path) -> Result<TextLayer, AnalyzerError>;

    /// Render page *i* of `pdf` to `targets[i]` as PNG, scaled by `scale`.
    ///
    /// Returns the written paths in page order. Targets beyond the page count
    /// are ignored.
    async fn rasterize(
        &self,
        pdf: &Path,
        scale: f32,
        targets: &[PathBuf],
    ) -> Result<Vec<PathBuf>, AnalyzerError>;
}

/// Deterministic file name for rasterised page `index` (0-based) of `stem`.
///
/// Page numbers in the name are 1-based: `upload.page-1.png`, `upload.page-2.png`, …
pub fn page_image_path(dir: &Path, stem: &str, index: usize) -> PathBuf {
    dir.join(format!("{stem}.page-{}.png", index + 1))
}

/// [`PdfBackend`] backed by pdfium-render.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_dir: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Bind to libpdfium in `library_dir`, or to the system library when None.
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }
}

#[async_trait]
impl PdfBackend for PdfiumBackend {
    async fn text_layer(&self, pdf: &Path) -> Result<TextLayer, AnalyzerError> {
        let path = pdf.to_path_buf();
        let lib = self.library_dir.clone();

        tokio::task::spawn_blocking(move || text_layer_blocking(lib.as_deref(), &path))
            .await
            .map_err(|e| AnalyzerError::Internal(format!("Text layer task panicked: {}", e)))?
    }

    async fn rasterize(
        &self,
        pdf: &Path,
        scale: f32,
        targets: &[PathBuf],
    ) -> Result<Vec<PathBuf>, AnalyzerError> {
        let path = pdf.to_path_buf();
        let lib = self.library_dir.clone();
        let targets = targets.to_vec();

        tokio::task::spawn_blocking(move || {
            rasterize_blocking(lib.as_deref(), &path, scale, &targets)
        })
        .await
        .map_err(|e| AnalyzerError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Bind to pdfium, preferring an explicit library directory.
fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, AnalyzerError> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| AnalyzerError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Open a PDF, classifying load failures.
///
/// Uploads are never decrypted, so any password complaint means the PDF is
/// encrypted.
fn open_document<'a>(pdfium: &'a Pdfium, pdf_path: &Path) -> Result<PdfDocument<'a>, AnalyzerError> {
    pdfium.load_pdf_from_file(pdf_path, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            AnalyzerError::PasswordRequired
        } else {
            AnalyzerError::CorruptPdf { detail: err_str }
        }
    })
}

/// Blocking implementation of text-layer extraction.
fn text_layer_blocking(library_dir: Option<&Path>, pdf_path: &Path) -> Result<TextLayer, AnalyzerError> {
    let pdfium = bind_pdfium(library_dir)?;
    let document = open_document(&pdfium, pdf_path)?;

    let pages = document.pages();
    let page_count = pages.len() as usize;

    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate() {
        let page_text = page.text().map_err(|e| AnalyzerError::CorruptPdf {
            detail: format!("text layer of page {}: {:?}", idx + 1, e),
        })?;
        text.push_str(&page_text.all());
        text.push('\n');
    }

    debug!(
        "Text layer: {} pages, {} chars",
        page_count,
        text.trim().chars().count()
    );

    Ok(TextLayer { text, page_count })
}

/// pdfium addresses pages with a `u16`.
fn page_index(idx: usize) -> Result<u16, AnalyzerError> {
    u16::try_from(idx).map_err(|_| AnalyzerError::RasterisationFailed {
        page: idx + 1,
        detail: "page index beyond pdfium's addressable range".into(),
    })
}

/// Blocking implementation of page rendering.
fn rasterize_blocking(
    library_dir: Option<&Path>,
    pdf_path: &Path,
    scale: f32,
    targets: &[PathBuf],
) -> Result<Vec<PathBuf>, AnalyzerError> {
    let pdfium = bind_pdfium(library_dir)?;
    let document = open_document(&pdfium, pdf_path)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("Rasterising {} pages at {}x", total_pages, scale);

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let mut written = Vec::with_capacity(total_pages.min(targets.len()));

    for (idx, target) in targets.iter().enumerate().take(total_pages) {
        let page_index = page_index(idx)?;
        let page = pages
            .get(page_index)
            .map_err(|e| AnalyzerError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            AnalyzerError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        image
            .save_with_format(target, ImageFormat::Png)
            .map_err(|e| AnalyzerError::RasterisationFailed {
                page: idx + 1,
                detail: format!("writing PNG: {}", e),
            })?;

        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        written.push(target.clone());
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_names_are_one_based_and_distinct() {
        let dir = Path::new("/scratch/analysis-abc");
        assert_eq!(
            page_image_path(dir, "upload", 0),
            PathBuf::from("/scratch/analysis-abc/upload.page-1.png")
        );
        assert_ne!(page_image_path(dir, "upload", 1), page_image_path(dir, "upload", 10));
    }

    #[test]
    fn page_index_rejects_out_of_range_pages() {
        assert_eq!(page_index(0).unwrap(), 0);
        assert_eq!(page_index(65_535).unwrap(), u16::MAX);
        match page_index(65_536) {
            Err(AnalyzerError::RasterisationFailed { page, .. }) => assert_eq!(page, 65_537),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_library_dir_fails_to_bind() {
        let backend = PdfiumBackend::new(Some(PathBuf::from("/definitely/not/pdfium")));
        let err = backend
            .text_layer(Path::new("/definitely/not/a.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::PdfiumBindingFailed(_)), "got: {err}");
    }
}
