//! Image generator port for AI image generation APIs.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::ImageError;
use crate::params::{AspectRatio, ReferenceMode, Resolution};

/// A user-supplied image that conditions generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceImage {
    /// Raw image bytes.
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    /// MIME type of the image (e.g., `"image/png"`).
    pub mime_type: String,
    /// What the image conditions.
    #[serde(default)]
    pub mode: ReferenceMode,
}

impl ReferenceImage {
    /// Wrap raw bytes, sniffing the MIME type from the content.
    #[must_use]
    pub fn from_bytes(data: Vec<u8>, mode: ReferenceMode) -> Self {
        let mime_type = image::guess_format(&data)
            .map_or("image/png", |format| format.to_mime_type())
            .to_string();
        Self { data, mime_type, mode }
    }
}

/// A request to generate one scene image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    /// The English image prompt.
    pub prompt: String,
    /// Card aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Resolution tier.
    pub resolution: Resolution,
    /// Conditioning images, forwarded only to providers that accept them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_images: Vec<ReferenceImage>,
}

/// A generated image, normalized to something an `<img>` can show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Remote URL or `data:` URL.
    pub url: String,
}

/// Boxed future type returned by [`ImageGenerator::generate`].
pub type GenerateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<GeneratedImage, ImageError>> + Send + 'a>>;

/// Generates images from text prompts via an external API.
pub trait ImageGenerator: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Generate one image for the given request.
    fn generate(&self, request: &ImageRequest) -> GenerateFuture<'_>;
}

/// Serde helper for serializing `Vec<u8>` as base64 strings.
pub(crate) mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize bytes as base64 string.
    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        serializer.serialize_str(&encoded)
    }

    /// Deserialize base64 string to bytes.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
