//! Live adapter for `OpenAI` DALL-E 3.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{no_image, read_success_body, unparseable};
use crate::data_url;
use crate::error::ImageError;
use crate::model::ImageProvider;
use crate::params::Resolution;
use crate::ports::image_generator::{
    GenerateFuture, GeneratedImage, ImageGenerator, ImageRequest,
};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/images/generations";

/// Live DALL-E 3 generator that calls the `OpenAI` Images API.
pub struct DallEGenerator {
    client: Client,
    api_key: String,
}

impl DallEGenerator {
    /// Create a new DALL-E generator with the given API key.
    #[must_use]
    pub fn new(api_key: String) -> Self {
        Self { client: Client::new(), api_key }
    }
}

/// Build the images/generations body. DALL-E 3 takes one image per call.
pub(crate) fn request_body(request: &ImageRequest) -> Value {
    let quality = match request.resolution {
        Resolution::TwoK => "standard",
        Resolution::FourK => "hd",
    };
    json!({
        "model": ImageProvider::DallE.model(),
        "prompt": request.resolution.enhance_prompt(&request.prompt),
        "n": 1,
        "size": request.aspect_ratio.dalle_size(),
        "quality": quality,
    })
}

/// Take the hosted URL, or the inline payload when the API returned one.
pub(crate) fn parse_response(body: &str) -> Result<GeneratedImage, ImageError> {
    let parsed: OpenAiResponse = serde_json::from_str(body).map_err(|e| unparseable(&e))?;
    parsed
        .data
        .into_iter()
        .find_map(|item| match (item.url, item.b64_json) {
            (Some(url), _) => Some(GeneratedImage { url }),
            (None, Some(b64)) => Some(GeneratedImage { url: data_url::from_base64("image/png", &b64) }),
            (None, None) => None,
        })
        .ok_or_else(|| no_image(body))
}

impl ImageGenerator for DallEGenerator {
    fn name(&self) -> &'static str {
        ImageProvider::DallE.name()
    }

    fn generate(&self, request: &ImageRequest) -> GenerateFuture<'_> {
        if !request.reference_images.is_empty() {
            tracing::debug!("DALL-E 3 does not take reference images; ignoring them");
        }
        let body = request_body(request);
        Box::pin(async move {
            let response = self
                .client
                .post(OPENAI_API_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;
            let text = read_success_body(response).await?;
            parse_response(&text)
        })
    }
}

// --- OpenAI API response types ---

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    data: Vec<OpenAiImageData>,
}

#[derive(Deserialize)]
struct OpenAiImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AspectRatio;

    #[test]
    fn body_uses_dalle_sizes() {
        let request = ImageRequest {
            prompt: "a mountain".into(),
            aspect_ratio: AspectRatio::Portrait,
            resolution: Resolution::TwoK,
            reference_images: Vec::new(),
        };
        let body = request_body(&request);
        assert_eq!(body["model"], "dall-e-3");
        assert_eq!(body["size"], "1024x1792");
        assert_eq!(body["quality"], "standard");
        assert_eq!(body["n"], 1);
    }

    #[test]
    fn four_k_asks_for_hd() {
        let request = ImageRequest {
            prompt: "a mountain".into(),
            aspect_ratio: AspectRatio::Landscape,
            resolution: Resolution::FourK,
            reference_images: Vec::new(),
        };
        let body = request_body(&request);
        assert_eq!(body["size"], "1792x1024");
        assert_eq!(body["quality"], "hd");
        assert!(body["prompt"].as_str().unwrap().contains("ultra detailed"));
    }

    #[test]
    fn hosted_url_is_returned_unchanged() {
        let body = r#"{"created":1,"data":[{"url":"https://oaidalle.example/img.png","revised_prompt":"x"}]}"#;
        assert_eq!(parse_response(body).unwrap().url, "https://oaidalle.example/img.png");
    }

    #[test]
    fn inline_payload_becomes_data_url() {
        let body = r#"{"data":[{"b64_json":"QUJD"}]}"#;
        assert_eq!(parse_response(body).unwrap().url, "data:image/png;base64,QUJD");
    }

    #[test]
    fn empty_data_is_an_error() {
        assert!(parse_response(r#"{"data":[]}"#).is_err());
    }
}
