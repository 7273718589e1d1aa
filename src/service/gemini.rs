//! Gemini `generateContent` backend.
//!
//! The request carries the system instruction, the serialised
//! [`AnalysisRequest`] as the single user turn, and a `responseSchema` so
//! the reply text is already the result JSON. The API key travels in the
//! `x-goog-api-key` header, never in the URL, and transport errors are
//! stripped of their URL before they can reach a log line or a client.

use super::AnalysisService;
use crate::error::AnalyzerError;
use crate::pipeline::analysis::AnalysisRequest;
use crate::prompts::{gemini_response_schema, SYSTEM_INSTRUCTION};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Public Gemini API base URL.
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Upper bound on establishing the connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`AnalysisService`] for the Gemini API.
#[derive(Clone)]
pub struct GeminiService {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
    deadline: Duration,
}

impl std::fmt::Debug for GeminiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiService")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl GeminiService {
    /// `timeout` is the analysis deadline.
    ///
    /// The analysis client enforces it around the whole call, so the HTTP
    /// client only bounds the connect phase. Any transport timeout is still
    /// reported as [`AnalyzerError::ServiceTimeout`].
    pub fn new(
        endpoint: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: Option<f32>,
        timeout: Duration,
    ) -> Result<Self, AnalyzerError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| AnalyzerError::ServiceNotConfigured {
                backend: "gemini".into(),
                hint: e.without_url().to_string(),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            deadline: timeout,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> AnalyzerError {
        if e.is_timeout() {
            return AnalyzerError::ServiceTimeout {
                secs: self.deadline.as_secs(),
            };
        }
        AnalyzerError::ServiceError {
            status: e.status().map(|s| s.as_u16()),
            message: format!("Analysis service unreachable: {}", e.without_url()),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    /// Build the `generateContent` body for one request.
    fn body(&self, request: &AnalysisRequest) -> Result<Value, AnalyzerError> {
        let prompt = serde_json::to_string(request)
            .map_err(|e| AnalyzerError::Internal(format!("serialising request: {e}")))?;

        let mut generation = json!({
            "responseMimeType": "application/json",
            "responseSchema": gemini_response_schema(),
        });
        if let Some(t) = self.temperature {
            generation["temperature"] = json!(t);
        }

        Ok(json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": generation,
        }))
    }
}

#[async_trait]
impl AnalysisService for GeminiService {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<Value, AnalyzerError> {
        let body = self.body(request)?;

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        debug!("Gemini responded {} ({} bytes)", status, bytes.len());

        if !status.is_success() {
            return Err(service_error(status.as_u16(), &bytes));
        }

        parse_generate_content(&bytes)
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}

/// Map a non-2xx reply, preferring Gemini's structured `{error: {code, message}}`.
fn service_error(status: u16, body: &[u8]) -> AnalyzerError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => AnalyzerError::ServiceError {
            status: Some(envelope.error.code.unwrap_or(status)),
            message: envelope.error.message,
        },
        Err(_) => AnalyzerError::ServiceError {
            status: Some(status),
            message: format!("Analysis service returned HTTP {status}"),
        },
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Pull the structured result out of a successful `generateContent` reply.
fn parse_generate_content(body: &[u8]) -> Result<Value, AnalyzerError> {
    let reply: GenerateContentResponse =
        serde_json::from_slice(body).map_err(|e| AnalyzerError::MalformedResponse {
            detail: format!("unexpected response envelope: {e}"),
        })?;

    if let Some(reason) = reply.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(AnalyzerError::MalformedResponse {
            detail: format!("prompt blocked: {reason}"),
        });
    }

    let candidate = reply
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AnalyzerError::MalformedResponse {
            detail: "no candidates in response".into(),
        })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AnalyzerError::MalformedResponse {
            detail: format!(
                "empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        });
    }

    serde_json::from_str(&text).map_err(|e| AnalyzerError::MalformedResponse {
        detail: format!("result is not JSON: {e}"),
    })
}
