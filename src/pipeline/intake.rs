//! File intake: turn an uploaded multipart field into a file in the request scope.
//!
//! pdfium and tesseract both need a file-system path, so the upload bytes are
//! written into the request's scratch directory under a generic name
//! (`upload.pdf`, `upload.img`). The client-supplied file name is kept for
//! logging only and never becomes part of a path.

use crate::config::IntakePolicy;
use crate::error::AnalyzerError;
use crate::pipeline::scope::RequestScope;
use std::path::PathBuf;

/// MIME type the service treats as PDF.
pub const PDF_MIME: &str = "application/pdf";

/// One `file` field as received over HTTP.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-side file name, if any.
    pub file_name: Option<String>,
    /// Declared content type, if any.
    pub content_type: Option<String>,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: Option<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    /// Whether this looks like the empty part a browser sends when no file was chosen.
    pub fn is_blank(&self) -> bool {
        self.bytes.is_empty() && self.file_name.as_deref().map_or(true, str::is_empty)
    }

    /// Declared MIME type, lowercased and stripped of parameters.
    pub fn mime(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
    }

    /// Decide which extraction branch this upload takes.
    ///
    /// The declared type decides. Only a missing or generic
    /// `application/octet-stream` type falls back to sniffing `%PDF`.
    pub fn kind(&self) -> UploadKind {
        match self.mime().as_deref() {
            Some(PDF_MIME) => UploadKind::Pdf,
            None | Some("application/octet-stream") if self.bytes.starts_with(b"%PDF") => {
                UploadKind::Pdf
            }
            _ => UploadKind::Image,
        }
    }
}

/// Extraction branch selected for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Pdf,
    Image,
}

impl UploadKind {
    fn extension(self) -> &'static str {
        match self {
            UploadKind::Pdf => "pdf",
            UploadKind::Image => "img",
        }
    }
}

/// An upload persisted into the request scope.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Location inside the request's scratch directory.
    pub path: PathBuf,
    /// Declared MIME type (normalised), if any.
    pub mime: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Extraction branch.
    pub kind: UploadKind,
    /// Client-side file name, if any.
    pub original_name: Option<String>,
}

impl UploadedFile {
    /// File stem used to name derived artifacts.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string())
    }
}

/// Apply the intake policy. Runs before any storage is created.
pub fn check_policy(upload: &Upload, policy: &IntakePolicy) -> Result<(), AnalyzerError> {
    if !policy.enforce {
        return Ok(());
    }

    if upload.bytes.len() as u64 > policy.max_upload_bytes {
        return Err(AnalyzerError::UploadTooLarge {
            limit_bytes: policy.max_upload_bytes,
        });
    }

    let mime = upload.mime().unwrap_or_default();
    if mime != PDF_MIME && !mime.starts_with("image/") {
        return Err(AnalyzerError::UnsupportedUpload {
            mime: if mime.is_empty() { "unknown".into() } else { mime },
        });
    }

    Ok(())
}

/// Write the upload into the request scope.
///
/// The path is registered for cleanup before the write starts.
pub async fn persist(scope: &mut RequestScope, upload: Upload) -> Result<UploadedFile, AnalyzerError> {
    let kind = upload.kind();
    let mime = upload.mime();
    let path = scope.track(scope.dir().join(format!("upload.{}", kind.extension())));

    tokio::fs::write(&path, &upload.bytes)
        .await
        .map_err(|e| AnalyzerError::Internal(format!("Failed to write upload: {}", e)))?;

    Ok(UploadedFile {
        path,
        mime,
        size: upload.bytes.len() as u64,
        kind,
        original_name: upload.file_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(ct: Option<&str>, bytes: &[u8]) -> Upload {
        Upload::new(Some("post.bin".into()), ct.map(String::from), bytes.to_vec())
    }

    #[test]
    fn declared_pdf_takes_pdf_branch() {
        assert_eq!(upload(Some("application/pdf"), b"anything").kind(), UploadKind::Pdf);
        assert_eq!(
            upload(Some("Application/PDF; charset=binary"), b"").kind(),
            UploadKind::Pdf
        );
    }

    #[test]
    fn declared_image_wins_over_magic_bytes() {
        assert_eq!(upload(Some("image/png"), b"%PDF-1.7").kind(), UploadKind::Image);
    }

    #[test]
    fn untyped_upload_is_sniffed() {
        assert_eq!(upload(None, b"%PDF-1.4 ...").kind(), UploadKind::Pdf);
        assert_eq!(
            upload(Some("application/octet-stream"), b"%PDF-1.4").kind(),
            UploadKind::Pdf
        );
        assert_eq!(upload(None, b"\x89PNG").kind(), UploadKind::Image);
    }

    #[test]
    fn blank_part_counts_as_no_file() {
        assert!(Upload::new(Some(String::new()), None, vec![]).is_blank());
        assert!(Upload::new(None, None, vec![]).is_blank());
        assert!(!Upload::new(Some("a.png".into()), None, vec![]).is_blank());
    }

    #[test]
    fn lenient_policy_accepts_anything() {
        let policy = IntakePolicy::default();
        assert!(check_policy(&upload(Some("text/plain"), &[0; 64]), &policy).is_ok());
    }

    #[test]
    fn strict_policy_rejects_type_and_size() {
        let policy = IntakePolicy::strict(16);
        let err = check_policy(&upload(Some("text/plain"), b"hi"), &policy).unwrap_err();
        assert!(matches!(err, AnalyzerError::UnsupportedUpload { .. }));

        let err = check_policy(&upload(Some("image/jpeg"), &[0; 17]), &policy).unwrap_err();
        assert!(matches!(err, AnalyzerError::UploadTooLarge { limit_bytes: 16 }));

        assert!(check_policy(&upload(Some("image/jpeg"), &[0; 16]), &policy).is_ok());
        assert!(check_policy(&upload(Some("application/pdf"), b"%PDF"), &policy).is_ok());
    }

    #[tokio::test]
    async fn persist_writes_and_tracks_upload() {
        let mut scope = RequestScope::open(None).unwrap();
        let file = persist(&mut scope, upload(Some("application/pdf"), b"%PDF-1.7"))
            .await
            .unwrap();

        assert_eq!(file.kind, UploadKind::Pdf);
        assert_eq!(file.size, 8);
        assert_eq!(file.stem(), "upload");
        assert_eq!(file.mime.as_deref(), Some("application/pdf"));
        assert_eq!(file.original_name.as_deref(), Some("post.bin"));
        assert!(file.path.starts_with(scope.dir()));
        assert_eq!(scope.tracked(), &[file.path.clone()]);
        assert_eq!(std::fs::read(&file.path).unwrap(), b"%PDF-1.7");

        scope.release().await;
        assert!(!file.path.exists());
    }
}
