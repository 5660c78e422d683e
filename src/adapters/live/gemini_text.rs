//! Live adapter for Gemini text generation, used by the scene planner.

use reqwest::Client;
use serde::Deserialize;

use crate::error::PlanError;
use crate::ports::text_generator::{CompleteFuture, TextGenerator, TextRequest};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Calls `generateContent` and returns the concatenated text parts.
pub struct GeminiTextGenerator {
    client: Client,
    api_key: String,
}

impl GeminiTextGenerator {
    /// Create a new Gemini text generator with the given API key.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self { client: Client::new(), api_key }
    }
}

/// Join every text part of the first candidate.
pub(crate) fn parse_response(body: &str) -> Result<String, PlanError> {
    let parsed: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| PlanError::Unknown { status: 200, message: format!("Failed to parse response: {e}") })?;
    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .map(|candidate| candidate.content.parts.into_iter().filter_map(|part| part.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(PlanError::Unknown {
            status: 200,
            message: "The model returned no text".to_string(),
        });
    }
    Ok(text)
}

impl TextGenerator for GeminiTextGenerator {
    fn complete(&self, request: &TextRequest) -> CompleteFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let url = format!("{GEMINI_API_BASE}/{}:generateContent", request.model);
            let body = serde_json::json!({
                "contents": [{ "parts": [{ "text": request.prompt }] }]
            });

            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let response_text = response.text().await?;
            if !status.is_success() {
                return Err(PlanError::from_status(status.as_u16(), response_text));
            }
            parse_response(&response_text)
        })
    }
}

// --- Gemini API response types ---

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"[{\"page\":"},{"text":"1}]"}]}}]}"#;
        assert_eq!(parse_response(body).unwrap(), "[{\"page\":1}]");
    }

    #[test]
    fn empty_candidates_is_an_error() {
        assert!(matches!(parse_response(r#"{"candidates":[]}"#), Err(PlanError::Unknown { .. })));
        assert!(matches!(parse_response("oops"), Err(PlanError::Unknown { status: 200, .. })));
    }
}
