//! Error type for the content-analyzer library.
//!
//! A single [`AnalyzerError`] covers every way one analysis request can end
//! without a result. Variants are grouped by the stage that produced them so
//! that [`crate::response`] can map each group onto one HTTP status:
//!
//! * **Intake**: the caller sent nothing usable (400).
//! * **Extraction**: either no text at all (422, a request-level empty
//!   result) or a PDF/OCR/image tool failed (500).
//! * **Analysis service**: the remote model failed, timed out, or broke its
//!   response contract (service status, 504, 502).
//! * **Configuration / internal**: startup mistakes and I/O faults. Internal
//!   details are logged, never sent to clients.
//!
//! Cleanup failures have no variant: they are logged and swallowed.

use thiserror::Error;

/// All errors returned by the content-analyzer library.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    // ── Intake errors ─────────────────────────────────────────────────────
    /// The request carried no `file` field (or was not multipart at all).
    #[error("No file uploaded")]
    NoFileUploaded,

    /// The multipart body could not be parsed.
    #[error("Malformed upload: {detail}")]
    MalformedUpload { detail: String },

    /// The upload exceeds the configured size limit.
    #[error("Uploaded file exceeds the size limit of {limit_bytes} bytes")]
    UploadTooLarge { limit_bytes: u64 },

    /// The declared type is neither an image nor a PDF (strict intake only).
    #[error("Only PDF and image files are accepted, got '{mime}'")]
    UnsupportedUpload { mime: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// Extraction finished but produced only whitespace.
    #[error("No text could be extracted from the uploaded file")]
    NoTextExtracted,

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("The uploaded PDF could not be read: {detail}")]
    CorruptPdf { detail: String },

    /// PDF requires a password; uploads are never decrypted.
    #[error("The uploaded PDF is encrypted and cannot be read")]
    PasswordRequired,

    /// pdfium-render failed on a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The uploaded image could not be decoded or re-encoded as PNG.
    #[error("Image conversion failed: {detail}")]
    NormalizationFailed { detail: String },

    /// The OCR engine could not be started.
    #[error("OCR engine unavailable: {detail}")]
    OcrUnavailable { detail: String },

    /// The OCR engine ran but failed on an image.
    #[error("OCR failed on {target}: {detail}")]
    OcrFailed { target: String, detail: String },

    /// Could not bind to a pdfium library.
    #[error("Failed to bind to pdfium library: {0}")]
    PdfiumBindingFailed(String),

    // ── Analysis service errors ───────────────────────────────────────────
    /// The analysis service answered with an error.
    ///
    /// `message` is the service's own structured message when it sent one.
    #[error("{message}")]
    ServiceError { status: Option<u16>, message: String },

    /// The analysis call exceeded its deadline.
    #[error("Analysis service timed out after {secs}s")]
    ServiceTimeout { secs: u64 },

    /// The service answered, but not with the agreed result schema.
    #[error("Analysis service returned an invalid result: {detail}")]
    MalformedResponse { detail: String },

    /// No analysis backend could be constructed (missing API key etc.).
    #[error("Analysis backend '{backend}' is not configured.\n{hint}")]
    ServiceNotConfigured { backend: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (I/O on the scratch directory, task panic).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalyzerError {
    /// True for errors caused by what the caller sent.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AnalyzerError::NoFileUploaded
                | AnalyzerError::MalformedUpload { .. }
                | AnalyzerError::UploadTooLarge { .. }
                | AnalyzerError::UnsupportedUpload { .. }
        )
    }

    /// True for errors raised by the remote analysis service.
    pub fn is_service_error(&self) -> bool {
        matches!(
            self,
            AnalyzerError::ServiceError { .. }
                | AnalyzerError::ServiceTimeout { .. }
                | AnalyzerError::MalformedResponse { .. }
        )
    }

    /// Message safe to hand to an HTTP client.
    ///
    /// Internal errors and host library faults collapse to a generic
    /// message; everything else is already phrased for the caller.
    pub fn public_message(&self) -> String {
        match self {
            AnalyzerError::Internal(_) => "Analysis failed".to_string(),
            AnalyzerError::PdfiumBindingFailed(_) => "PDF engine unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for AnalyzerError {
    fn from(err: std::io::Error) -> Self {
        AnalyzerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_file_display_matches_client_contract() {
        assert_eq!(AnalyzerError::NoFileUploaded.to_string(), "No file uploaded");
    }

    #[test]
    fn service_error_displays_service_message_verbatim() {
        let e = AnalyzerError::ServiceError {
            status: Some(429),
            message: "Resource has been exhausted".into(),
        };
        assert_eq!(e.to_string(), "Resource has been exhausted");
        assert!(e.is_service_error());
        assert!(!e.is_user_error());
    }

    #[test]
    fn internal_error_is_hidden_from_clients() {
        let e = AnalyzerError::Internal("/tmp/analysis-x1/upload.pdf: disk full".into());
        assert_eq!(e.public_message(), "Analysis failed");
        assert!(e.to_string().contains("disk full"));
    }

    #[test]
    fn pdfium_binding_details_stay_in_logs() {
        let e = AnalyzerError::PdfiumBindingFailed(
            "LoadLibraryError(\"/opt/pdfium/lib/libpdfium.so: cannot open\")".into(),
        );
        assert_eq!(e.public_message(), "PDF engine unavailable");
        assert!(e.to_string().contains("/opt/pdfium"));
    }

    #[test]
    fn timeout_display() {
        let e = AnalyzerError::ServiceTimeout { secs: 60 };
        assert!(e.to_string().contains("60s"));
    }

    #[test]
    fn rasterisation_display_names_page() {
        let e = AnalyzerError::RasterisationFailed {
            page: 3,
            detail: "bitmap allocation".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"), "got: {msg}");
    }

    #[test]
    fn intake_errors_are_user_errors() {
        assert!(AnalyzerError::NoFileUploaded.is_user_error());
        assert!(AnalyzerError::UnsupportedUpload { mime: "text/plain".into() }.is_user_error());
        assert!(!AnalyzerError::NoTextExtracted.is_user_error());
    }
}
