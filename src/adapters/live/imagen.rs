//! Imagen `:predict` request and response mapping, and the Google AI Imagen adapter.
//!
//! Vertex AI serves the same Imagen envelope; see [`super::vertex`].

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{no_image, read_success_body, unparseable};
use crate::data_url;
use crate::error::ImageError;
use crate::model::ImageProvider;
use crate::ports::image_generator::{
    GenerateFuture, GeneratedImage, ImageGenerator, ImageRequest,
};

const GOOGLE_AI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Build an Imagen `:predict` body. Reference images are not part of this API.
pub(crate) fn predict_body(request: &ImageRequest, safety_filter: Option<&str>) -> Value {
    if !request.reference_images.is_empty() {
        tracing::debug!(
            count = request.reference_images.len(),
            "Imagen does not take reference images; ignoring them"
        );
    }
    let mut parameters = json!({
        "sampleCount": 1,
        "aspectRatio": request.aspect_ratio.as_str(),
        "personGeneration": "allow_adult",
    });
    if let Some(level) = safety_filter {
        parameters["safetyFilterLevel"] = json!(level);
    }
    json!({
        "instances": [{ "prompt": request.resolution.enhance_prompt(&request.prompt) }],
        "parameters": parameters,
    })
}

/// Pull the first prediction out of an Imagen `:predict` response.
pub(crate) fn parse_predictions(body: &str) -> Result<GeneratedImage, ImageError> {
    let parsed: PredictResponse = serde_json::from_str(body).map_err(|e| unparseable(&e))?;
    parsed
        .predictions
        .into_iter()
        .find_map(|prediction| {
            prediction.bytes_base64_encoded.map(|data| {
                let mime_type = prediction.mime_type.as_deref().unwrap_or("image/png");
                GeneratedImage { url: data_url::from_base64(mime_type, &data) }
            })
        })
        .ok_or_else(|| no_image(body))
}

/// Imagen through the Google AI (Generative Language) API.
pub struct GoogleAiImagenGenerator {
    client: Client,
    api_key: String,
}

impl GoogleAiImagenGenerator {
    /// Create a new Google AI Imagen generator with the given API key.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self { client: Client::new(), api_key }
    }
}

impl ImageGenerator for GoogleAiImagenGenerator {
    fn name(&self) -> &'static str {
        ImageProvider::GoogleAi.name()
    }

    fn generate(&self, request: &ImageRequest) -> GenerateFuture<'_> {
        let body = predict_body(request, None);
        Box::pin(async move {
            let url = format!("{GOOGLE_AI_API_BASE}/{}:predict", ImageProvider::GoogleAi.model());
            let response = self
                .client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await?;
            let text = read_success_body(response).await?;
            parse_predictions(&text)
        })
    }
}

// --- Imagen API response types ---

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}
