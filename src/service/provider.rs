//! Chat-provider backend via `edgequake-llm`.
//!
//! Providers without a response-schema option are told the reply format in
//! the system message; the reply is unwrapped from any Markdown fence before
//! it is parsed.

use super::AnalysisService;
use crate::error::AnalyzerError;
use crate::pipeline::analysis::AnalysisRequest;
use crate::prompts::{extract_json_block, json_reply_instruction};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const MAX_REPLY_TOKENS: usize = 1024;

/// [`AnalysisService`] backed by any `edgequake-llm` chat provider.
#[derive(Clone)]
pub struct ProviderService {
    provider: Arc<dyn LLMProvider>,
    name: String,
    model: String,
    temperature: Option<f32>,
}

impl ProviderService {
    /// Wrap an already-built provider.
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        name: impl Into<String>,
        model: impl Into<String>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            provider,
            name: name.into(),
            model: model.into(),
            temperature,
        }
    }

    /// Instantiate a named provider; its API key is read from the environment.
    pub fn create(name: &str, model: Option<&str>, temperature: Option<f32>) -> Result<Self, AnalyzerError> {
        let model = model.unwrap_or_else(|| default_model(name));
        let provider = ProviderFactory::create_llm_provider(name, model).map_err(|e| {
            AnalyzerError::ServiceNotConfigured {
                backend: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        Ok(Self::new(provider, name, model, temperature))
    }

    /// Use whichever provider the environment has keys for.
    pub fn from_env(temperature: Option<f32>) -> Result<Self, AnalyzerError> {
        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| AnalyzerError::ServiceNotConfigured {
                backend: "auto".to_string(),
                hint: format!("{e}"),
            })?;
        Ok(Self::new(provider, "auto", "default", temperature))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: self.temperature,
            max_tokens: Some(MAX_REPLY_TOKENS),
            ..Default::default()
        }
    }
}

fn default_model(provider: &str) -> &'static str {
    match provider {
        "anthropic" => "claude-3-5-haiku-latest",
        "ollama" => "llama3.2",
        "gemini" => crate::config::DEFAULT_GEMINI_MODEL,
        _ => "gpt-4.1-nano",
    }
}

#[async_trait]
impl AnalysisService for ProviderService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<Value, AnalyzerError> {
        let prompt = serde_json::to_string(request)
            .map_err(|e| AnalyzerError::Internal(format!("serialising request: {e}")))?;

        let messages = vec![
            ChatMessage::system(json_reply_instruction()),
            ChatMessage::user_with_images(prompt, Vec::new()),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| AnalyzerError::ServiceError {
                status: None,
                message: format!("{} request failed: {e}", self.name),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );

        parse_reply(&response.content)
    }
}

fn parse_reply(reply: &str) -> Result<Value, AnalyzerError> {
    let body = extract_json_block(reply);
    if body.is_empty() {
        return Err(AnalyzerError::MalformedResponse {
            detail: "empty reply".into(),
        });
    }
    serde_json::from_str(body).map_err(|e| AnalyzerError::MalformedResponse {
        detail: format!("reply is not JSON: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_reply_is_parsed() {
        let v = parse_reply("```json\n{\"tone\": \"dry\"}\n```").unwrap();
        assert_eq!(v["tone"], "dry");
    }

    #[test]
    fn prose_reply_is_malformed() {
        let err = parse_reply("Sure! Here is my analysis.").unwrap_err();
        assert!(matches!(err, AnalyzerError::MalformedResponse { .. }));
    }

    #[test]
    fn empty_reply_is_malformed() {
        assert!(parse_reply("   ").is_err());
    }

    #[test]
    fn default_models() {
        assert_eq!(default_model("openai"), "gpt-4.1-nano");
        assert_eq!(default_model("gemini"), "gemini-2.0-flash");
    }
}
