//! Analysis client: extracted text → validated [`AnalysisResult`].
//!
//! The client owns the request contract and the deadline; the transport is an
//! injected [`AnalysisService`]. Services hand back raw JSON and this module
//! alone decides whether it satisfies the result schema, so a half-formed
//! reply never reaches the caller.

use crate::error::AnalyzerError;
use crate::pipeline::extract::ExtractedText;
use crate::service::AnalysisService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What the analysis service is asked to assess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub content: String,
    pub line_count: usize,
    pub language: String,
}

impl AnalysisRequest {
    pub fn from_text(text: &ExtractedText, language: &str) -> Self {
        Self {
            content: text.content.clone(),
            line_count: text.line_count(),
            language: language.to_string(),
        }
    }
}

/// The service's verdict on a piece of social media content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub engagement_score: f64,
    pub tone: String,
    pub platform_fit: String,
    pub tags: Vec<String>,
    pub suggestions: Vec<String>,
}

impl AnalysisResult {
    /// Check raw service output against the result schema.
    ///
    /// Extra fields are ignored; missing or mistyped fields and a
    /// non-finite score are contract violations.
    pub fn from_service_value(value: serde_json::Value) -> Result<Self, AnalyzerError> {
        let result: AnalysisResult =
            serde_json::from_value(value).map_err(|e| AnalyzerError::MalformedResponse {
                detail: e.to_string(),
            })?;

        if !result.engagement_score.is_finite() {
            return Err(AnalyzerError::MalformedResponse {
                detail: "engagement_score is not a finite number".into(),
            });
        }

        Ok(result)
    }
}

/// Sends extracted text to the analysis service under a deadline.
#[derive(Clone)]
pub struct AnalysisClient {
    service: Arc<dyn AnalysisService>,
    timeout: Duration,
    language: String,
}

impl AnalysisClient {
    pub fn new(service: Arc<dyn AnalysisService>, timeout: Duration, language: impl Into<String>) -> Self {
        Self {
            service,
            timeout,
            language: language.into(),
        }
    }

    /// Name of the backing service, for logs.
    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Analyse `text`. All-or-nothing: either a validated result or an error.
    pub async fn analyze(&self, text: &ExtractedText) -> Result<AnalysisResult, AnalyzerError> {
        let request = AnalysisRequest::from_text(text, &self.language);
        debug!(
            "Analysis request: {} chars, {} lines, via {}",
            request.content.len(),
            request.line_count,
            self.service.name()
        );

        let start = Instant::now();
        let raw = match tokio::time::timeout(self.timeout, self.service.analyze(&request)).await {
            Ok(outcome) => outcome?,
            Err(_) => {
                warn!(
                    "Analysis via {} exceeded {}s",
                    self.service.name(),
                    self.timeout.as_secs()
                );
                return Err(AnalyzerError::ServiceTimeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let result = AnalysisResult::from_service_value(raw)?;
        info!(
            "Analysis complete in {}ms (score {})",
            start.elapsed().as_millis(),
            result.engagement_score
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::ExtractionRoute;
    use async_trait::async_trait;
    use serde_json::json;

    struct Fixed(serde_json::Value);

    #[async_trait]
    impl AnalysisService for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn analyze(&self, _request: &AnalysisRequest) -> Result<serde_json::Value, AnalyzerError> {
            Ok(self.0.clone())
        }
    }

    struct Stalled;

    #[async_trait]
    impl AnalysisService for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn analyze(&self, _request: &AnalysisRequest) -> Result<serde_json::Value, AnalyzerError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!({}))
        }
    }

    fn sample() -> serde_json::Value {
        json!({
            "engagement_score": 7.5,
            "tone": "upbeat",
            "platform_fit": "Instagram",
            "tags": ["launch", "product"],
            "suggestions": ["Add a call to action"]
        })
    }

    #[test]
    fn request_serialises_with_fixed_field_names() {
        let text = ExtractedText::new("Hello world\n", ExtractionRoute::PdfOcr { pages: 1 });
        let req = AnalysisRequest::from_text(&text, "English");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({ "content": "Hello world\n", "line_count": 1, "language": "English" })
        );
    }

    #[test]
    fn extra_fields_are_ignored() {
        let mut v = sample();
        v["confidence"] = json!("high");
        let r = AnalysisResult::from_service_value(v).unwrap();
        assert_eq!(r.tags, vec!["launch", "product"]);
    }

    #[test]
    fn missing_field_is_malformed() {
        let mut v = sample();
        v.as_object_mut().unwrap().remove("tone");
        let err = AnalysisResult::from_service_value(v).unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedResponse { .. }), "got: {err}");
    }

    #[test]
    fn mistyped_score_is_malformed() {
        let mut v = sample();
        v["engagement_score"] = json!("eight");
        assert!(AnalysisResult::from_service_value(v).is_err());
    }

    #[tokio::test]
    async fn client_returns_validated_result() {
        let client = AnalysisClient::new(Arc::new(Fixed(sample())), Duration::from_secs(60), "English");
        let text = ExtractedText::new("Big launch today!", ExtractionRoute::TextLayer);
        let r = client.analyze(&text).await.unwrap();
        assert_eq!(r.platform_fit, "Instagram");
        assert_eq!(client.service_name(), "fixed");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_service_times_out() {
        let client = AnalysisClient::new(Arc::new(Stalled), Duration::from_secs(60), "English");
        let text = ExtractedText::new("Big launch today!", ExtractionRoute::TextLayer);
        let err = client.analyze(&text).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::ServiceTimeout { secs: 60 }), "got: {err}");
    }
}
