//! HTTP surface: router, multipart handler and listener lifecycle.
//!
//! ```text
//! POST /analysis      ─┐
//! POST /api/analysis  ─┴─▶ read `file` part ─▶ Analyzer::analyze ─▶ JSON
//! GET  /health        ───▶ {"status":"ok","version":…}
//! ```
//!
//! Layers, outermost first: request tracing, CORS, body limit.

use crate::analyze::Analyzer;
use crate::config::ServerConfig;
use crate::error::AnalyzerError;
use crate::pipeline::analysis::AnalysisResult;
use crate::pipeline::intake::Upload;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Name of the multipart field carrying the upload.
pub const FILE_FIELD: &str = "file";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    max_body_bytes: usize,
}

/// Build the application router.
pub fn router(analyzer: Arc<Analyzer>, config: &ServerConfig) -> Router {
    let state = AppState {
        analyzer,
        max_body_bytes: config.max_body_bytes,
    };

    Router::new()
        .route("/analysis", post(analyze_upload))
        .route("/api/analysis", post(analyze_upload))
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

/// CORS for the browser client: explicit origins, credentials allowed.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .effective_origins()
        .into_iter()
        .filter_map(|o| match HeaderValue::from_str(&o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    debug!("CORS origins: {:?}", origins);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn analyze_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResult>, AnalyzerError> {
    let upload = match multipart {
        Ok(multipart) => read_upload(multipart, state.max_body_bytes).await?,
        // Not multipart at all: same as a form without a file.
        Err(rejection) => {
            debug!("Request is not multipart: {}", rejection.body_text());
            None
        }
    };

    let result = state.analyzer.analyze(upload).await?;
    Ok(Json(result))
}

/// Pull the first `file` part out of the form; other parts are skipped.
async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<Option<Upload>, AnalyzerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;

        return Ok(Some(Upload::new(file_name, content_type, bytes.to_vec())));
    }
    Ok(None)
}

fn multipart_error(err: MultipartError, limit: usize) -> AnalyzerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AnalyzerError::UploadTooLarge {
            limit_bytes: limit as u64,
        }
    } else {
        AnalyzerError::MalformedUpload {
            detail: err.body_text(),
        }
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(analyzer: Arc<Analyzer>, config: &ServerConfig, shutdown: F) -> Result<(), AnalyzerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AnalyzerError::Internal(format!("Failed to bind {addr}: {e}")))?;

    info!(
        "Listening on http://{} (backend: {}, environment: {:?})",
        addr,
        analyzer.service_name(),
        config.environment
    );

    axum::serve(listener, router(analyzer, config))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AnalyzerError::Internal(format!("Server error: {e}")))?;

    info!("Server stopped");
    Ok(())
}
