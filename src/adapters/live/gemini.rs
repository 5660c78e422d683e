//! Live adapter for Gemini multimodal image output.

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{no_image, read_success_body, unparseable};
use crate::data_url;
use crate::model::ImageProvider;
use crate::ports::image_generator::{
    GenerateFuture, GeneratedImage, ImageGenerator, ImageRequest,
};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Live Gemini image generator that calls the Google AI API.
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
}

impl GeminiGenerator {
    /// Create a new Gemini generator with the given API key.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self { client: Client::new(), api_key }
    }
}

/// Build the `generateContent` body: one text part, then one inline part per reference image.
pub(crate) fn request_body(request: &ImageRequest) -> Value {
    let mut text = String::new();
    let mut modes = Vec::new();
    for reference in &request.reference_images {
        if !modes.contains(&reference.mode) {
            modes.push(reference.mode);
        }
    }
    for mode in modes {
        text.push_str(mode.instruction());
        text.push('\n');
    }
    text.push_str(&request.resolution.enhance_prompt(&request.prompt));
    text.push_str(", ");
    text.push_str(request.aspect_ratio.composition_hint());

    let mut parts = vec![json!({ "text": text })];
    for reference in &request.reference_images {
        parts.push(json!({
            "inlineData": {
                "mimeType": reference.mime_type,
                "data": base64::engine::general_purpose::STANDARD.encode(&reference.data),
            }
        }));
    }

    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] }
    })
}

/// Pull the first image out of a `generateContent` response.
pub(crate) fn parse_response(body: &str) -> Result<GeneratedImage, crate::error::ImageError> {
    let parsed: GeminiResponse = serde_json::from_str(body).map_err(|e| unparseable(&e))?;
    let parts = parsed.candidates.into_iter().flat_map(|candidate| candidate.content.parts);
    for part in parts {
        if let Some(inline) = part.inline_data {
            return Ok(GeneratedImage { url: data_url::from_base64(&inline.mime_type, &inline.data) });
        }
        if let Some(file) = part.file_data {
            return Ok(GeneratedImage { url: file.file_uri });
        }
    }
    Err(no_image(body))
}

impl ImageGenerator for GeminiGenerator {
    fn name(&self) -> &'static str {
        ImageProvider::Gemini.name()
    }

    fn generate(&self, request: &ImageRequest) -> GenerateFuture<'_> {
        let body = request_body(request);
        Box::pin(async move {
            let url = format!("{GEMINI_API_BASE}/{}:generateContent", ImageProvider::Gemini.model());
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await?;
            let text = read_success_body(response).await?;
            parse_response(&text)
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
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    inline_data: Option<GeminiInlineData>,
    file_data: Option<GeminiFileData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFileData {
    file_uri: String,
}
