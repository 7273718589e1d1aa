//! Instructions and the result schema sent to the analysis service.
//!
//! Both backends share the same system instruction. Gemini additionally gets
//! [`gemini_response_schema`] so the model is constrained server-side; chat
//! providers without schema support get [`json_reply_instruction`] appended
//! and their reply is unwrapped with [`extract_json_block`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

/// System instruction for social media content analysis.
pub const SYSTEM_INSTRUCTION: &str = "You are a social media expert that analyzes social media content and provides insights based on the content. You will be given a prompt containing the content, line count, and language of the content. Based on this information, you will provide insights and analysis of the content.";

/// Response schema in Gemini's OpenAPI subset.
pub fn gemini_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "engagement_score": { "type": "NUMBER" },
            "tone":             { "type": "STRING" },
            "platform_fit":     { "type": "STRING" },
            "tags":             { "type": "ARRAY", "items": { "type": "STRING" } },
            "suggestions":      { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["engagement_score", "tone", "platform_fit", "tags", "suggestions"],
        "propertyOrdering": ["engagement_score", "tone", "platform_fit", "tags", "suggestions"]
    })
}

/// Reply-format rules for providers without structured output.
pub fn json_reply_instruction() -> String {
    format!(
        "{SYSTEM_INSTRUCTION}\n\n\
Reply with a single JSON object and nothing else, using exactly these fields:\n\
{{\n  \"engagement_score\": number,\n  \"tone\": string,\n  \"platform_fit\": string,\n  \"tags\": [string],\n  \"suggestions\": [string]\n}}"
    )
}

static FENCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n(.*?)\n?\s*```\s*$").unwrap());

/// Strip a Markdown code fence around a JSON reply, if present.
pub fn extract_json_block(reply: &str) -> &str {
    match FENCED.captures(reply).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => reply.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_every_result_field() {
        let schema = gemini_response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        for field in ["engagement_score", "tone", "platform_fit", "tags", "suggestions"] {
            assert!(required.contains(&field), "missing {field}");
            assert!(schema["properties"].get(field).is_some());
        }
    }

    #[test]
    fn reply_instruction_names_fields() {
        let s = json_reply_instruction();
        assert!(s.starts_with(SYSTEM_INSTRUCTION));
        assert!(s.contains("\"platform_fit\": string"));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let reply = "```json\n{\"tone\": \"calm\"}\n```\n";
        assert_eq!(extract_json_block(reply), "{\"tone\": \"calm\"}");
    }

    #[test]
    fn bare_json_passes_through() {
        assert_eq!(extract_json_block("  {\"a\": 1}\n"), "{\"a\": 1}");
    }
}
