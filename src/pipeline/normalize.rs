//! Image normalisation: any decodable upload → PNG on disk.
//!
//! Tesseract's accuracy varies with the input codec (JPEG artefacts, WebP
//! support depending on the leptonica build, multi-frame GIFs). Re-encoding
//! every image upload to lossless PNG first means OCR always sees the same
//! format. The format is sniffed from the bytes, not the file name, since
//! uploads are stored under a generic name.

use crate::error::AnalyzerError;
use async_trait::async_trait;
use image::{ImageFormat, ImageReader};
use std::path::Path;
use tracing::debug;

/// Converts an uploaded raster image into the canonical OCR input format.
#[async_trait]
pub trait ImageNormalizer: Send + Sync {
    /// Decode `source` and write it to `target` in the canonical format.
    async fn normalize(&self, source: &Path, target: &Path) -> Result<(), AnalyzerError>;
}

/// [`ImageNormalizer`] writing PNG with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PngNormalizer;

#[async_trait]
impl ImageNormalizer for PngNormalizer {
    async fn normalize(&self, source: &Path, target: &Path) -> Result<(), AnalyzerError> {
        let source = source.to_path_buf();
        let target = target.to_path_buf();

        tokio::task::spawn_blocking(move || normalize_blocking(&source, &target))
            .await
            .map_err(|e| AnalyzerError::Internal(format!("Normalize task panicked: {}", e)))?
    }
}

fn normalize_blocking(source: &Path, target: &Path) -> Result<(), AnalyzerError> {
    let img = ImageReader::open(source)
        .map_err(|e| AnalyzerError::NormalizationFailed {
            detail: e.to_string(),
        })?
        .with_guessed_format()
        .map_err(|e| AnalyzerError::NormalizationFailed {
            detail: e.to_string(),
        })?
        .decode()
        .map_err(|e| AnalyzerError::NormalizationFailed {
            detail: e.to_string(),
        })?;

    img.save_with_format(target, ImageFormat::Png)
        .map_err(|e| AnalyzerError::NormalizationFailed {
            detail: e.to_string(),
        })?;

    debug!(
        "Normalised image → {}x{} PNG at {}",
        img.width(),
        img.height(),
        target.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[tokio::test]
    async fn jpeg_without_extension_becomes_png() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("upload.bin");
        let target = dir.path().join("upload.normalized.png");
        RgbImage::from_pixel(12, 8, Rgb([10, 200, 30]))
            .save_with_format(&source, ImageFormat::Jpeg)
            .unwrap();

        PngNormalizer.normalize(&source, &target).await.unwrap();

        let bytes = std::fs::read(&target).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
        let back = image::open(&target).unwrap();
        assert_eq!((back.width(), back.height()), (12, 8));
    }

    #[tokio::test]
    async fn garbage_is_a_normalization_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("upload.png");
        let target = dir.path().join("upload.normalized.png");
        std::fs::write(&source, b"definitely not an image").unwrap();

        let err = PngNormalizer.normalize(&source, &target).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::NormalizationFailed { .. }), "got: {err}");
        assert!(!target.exists());
    }
}
