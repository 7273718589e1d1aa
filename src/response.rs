//! HTTP mapping for [`AnalyzerError`].
//!
//! Every failure reaches the client as `{"error": "<message>"}` with a status
//! chosen by the stage that failed. Internal details are logged here and
//! replaced with a generic message.

use crate::error::AnalyzerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// HTTP status for an error.
pub fn status_for(err: &AnalyzerError) -> StatusCode {
    match err {
        AnalyzerError::NoFileUploaded
        | AnalyzerError::MalformedUpload { .. }
        | AnalyzerError::UploadTooLarge { .. }
        | AnalyzerError::UnsupportedUpload { .. } => StatusCode::BAD_REQUEST,

        AnalyzerError::NoTextExtracted => StatusCode::UNPROCESSABLE_ENTITY,

        // Forward the service's own status when it is a real error status.
        AnalyzerError::ServiceError { status, .. } => status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),

        AnalyzerError::ServiceTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        AnalyzerError::MalformedResponse { .. } => StatusCode::BAD_GATEWAY,

        AnalyzerError::CorruptPdf { .. }
        | AnalyzerError::PasswordRequired
        | AnalyzerError::RasterisationFailed { .. }
        | AnalyzerError::NormalizationFailed { .. }
        | AnalyzerError::OcrUnavailable { .. }
        | AnalyzerError::OcrFailed { .. }
        | AnalyzerError::PdfiumBindingFailed(_)
        | AnalyzerError::ServiceNotConfigured { .. }
        | AnalyzerError::InvalidConfig(_)
        | AnalyzerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AnalyzerError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "Analysis request failed: {}", self);
        }

        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
