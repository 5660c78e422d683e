//! Keyless Pollinations adapter, also used as the fallback provider.
//!
//! Pollinations renders on GET, so the image URL is the result; nothing is
//! fetched here.

use reqwest::Url;

use crate::error::ImageError;
use crate::model::ImageProvider;
use crate::ports::image_generator::{
    GenerateFuture, GeneratedImage, ImageGenerator, ImageRequest,
};

const POLLINATIONS_BASE: &str = "https://image.pollinations.ai/prompt/";

/// Builds Pollinations image URLs.
#[derive(Debug, Clone, Default)]
pub struct PollinationsGenerator;

impl PollinationsGenerator {
    /// Create a Pollinations generator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The image URL for a request: prompt in the path, pixel size and seed in the query.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt is empty.
    pub fn image_url(request: &ImageRequest) -> Result<String, ImageError> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(ImageError::InvalidArgument("image prompt is empty".into()));
        }
        let (width, height) = request.resolution.scale(request.aspect_ratio.pixel_dimensions());

        let mut url = Url::parse(POLLINATIONS_BASE)
            .map_err(|e| ImageError::Config(format!("bad Pollinations base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ImageError::Config("Pollinations base URL cannot take a path".into()))?
            .pop_if_empty()
            .push(prompt);
        url.query_pairs_mut()
            .append_pair("width", &width.to_string())
            .append_pair("height", &height.to_string())
            .append_pair("seed", &prompt_seed(prompt).to_string())
            .append_pair("nologo", "true");
        Ok(url.into())
    }
}

/// Stable seed so the same prompt yields the same picture across reloads.
fn prompt_seed(prompt: &str) -> u32 {
    let hash = prompt
        .chars()
        .fold(0i32, |hash, ch| hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(ch as i32));
    hash.unsigned_abs()
}

impl ImageGenerator for PollinationsGenerator {
    fn name(&self) -> &'static str {
        ImageProvider::Pollinations.name()
    }

    fn generate(&self, request: &ImageRequest) -> GenerateFuture<'_> {
        if !request.reference_images.is_empty() {
            tracing::debug!("Pollinations does not take reference images; ignoring them");
        }
        let result = Self::image_url(request).map(|url| GeneratedImage { url });
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{AspectRatio, Resolution};

    fn request(prompt: &str, ratio: AspectRatio, resolution: Resolution) -> ImageRequest {
        ImageRequest {
            prompt: prompt.into(),
            aspect_ratio: ratio,
            resolution,
            reference_images: Vec::new(),
        }
    }

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    #[test]
    fn url_carries_pixel_dimensions() {
        let url =
            PollinationsGenerator::image_url(&request("cat", AspectRatio::Portrait, Resolution::TwoK))
                .unwrap();
        assert!(url.starts_with("https://image.pollinations.ai/prompt/cat?"));
        let q = query(&url);
        assert!(q.contains(&("width".into(), "720".into())));
        assert!(q.contains(&("height".into(), "1280".into())));
        assert!(q.contains(&("nologo".into(), "true".into())));
    }

    #[test]
    fn four_k_doubles_dimensions() {
        let url = PollinationsGenerator::image_url(&request(
            "cat",
            AspectRatio::Landscape,
            Resolution::FourK,
        ))
        .unwrap();
        let q = query(&url);
        assert!(q.contains(&("width".into(), "2560".into())));
        assert!(q.contains(&("height".into(), "1440".into())));
    }

    #[test]
    fn prompt_is_percent_encoded_in_path() {
        let url = PollinationsGenerator::image_url(&request(
            "flat vector, a/b test?",
            AspectRatio::Square,
            Resolution::TwoK,
        ))
        .unwrap();
        let parsed = Url::parse(&url).unwrap();
        let segments: Vec<&str> = parsed.path_segments().unwrap().collect();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], "prompt");
        assert!(!segments[1].contains('/'));
        assert!(!segments[1].contains('?'));
    }

    #[test]
    fn seed_is_stable_per_prompt() {
        let a = PollinationsGenerator::image_url(&request("x", AspectRatio::Square, Resolution::TwoK));
        let b = PollinationsGenerator::image_url(&request("x", AspectRatio::Square, Resolution::TwoK));
        assert_eq!(a.unwrap(), b.unwrap());
        assert_ne!(prompt_seed("sunrise"), prompt_seed("sunset"));
    }

    #[test]
    fn empty_prompt_is_rejected() {
        assert!(matches!(
            PollinationsGenerator::image_url(&request("  ", AspectRatio::Square, Resolution::TwoK)),
            Err(ImageError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn generate_returns_the_url() {
        let req = request("cat", AspectRatio::Square, Resolution::TwoK);
        let image = PollinationsGenerator::new().generate(&req).await.unwrap();
        assert_eq!(image.url, PollinationsGenerator::image_url(&req).unwrap());
    }
}
