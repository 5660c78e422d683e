//! Timeout and fallback handling around the selected image provider.
//!
//! Every primary attempt races a client-side timer. A timed-out attempt is
//! reported as [`ImageError::Timeout`] and never retried; any other failure
//! gets exactly one retry against the free provider when a fallback is set.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};

use crate::error::ImageError;
use crate::params::{AspectRatio, Resolution};
use crate::ports::image_generator::{GeneratedImage, ImageGenerator, ImageRequest, ReferenceImage};

/// Default client-side bound on one primary attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a failed primary attempt may be retried against the free provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Retry once against the fallback provider.
    #[default]
    Enabled,
    /// Surface the primary error.
    Disabled,
}

impl From<bool> for FallbackPolicy {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

/// Outcome of one primary attempt.
#[derive(Debug)]
pub enum Attempt {
    /// The provider answered with an image.
    Success(GeneratedImage),
    /// The client-side timer fired first.
    TimedOut,
    /// The provider answered with an error.
    Failed(ImageError),
}

/// The image shown for one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    /// Remote URL or `data:` URL.
    pub url: String,
    /// Whether the fallback provider produced this image.
    pub used_fallback: bool,
}

/// Per-batch settings shared by every scene.
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    /// Card aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Resolution tier.
    pub resolution: Resolution,
    /// Conditioning images.
    pub reference_images: Vec<ReferenceImage>,
}

impl ImageOptions {
    /// The request for one scene prompt.
    #[must_use]
    pub fn request(&self, prompt: &str) -> ImageRequest {
        ImageRequest {
            prompt: prompt.to_string(),
            aspect_ratio: self.aspect_ratio,
            resolution: self.resolution,
            reference_images: self.reference_images.clone(),
        }
    }
}

/// Front door to image generation: primary provider, timer, optional fallback.
#[derive(Clone)]
pub struct Illustrator {
    primary: Arc<dyn ImageGenerator>,
    fallback: Option<Arc<dyn ImageGenerator>>,
    timeout: Duration,
}

impl Illustrator {
    /// An illustrator with no fallback.
    #[must_use]
    pub fn new(primary: Arc<dyn ImageGenerator>, timeout: Duration) -> Self {
        Self { primary, fallback: None, timeout }
    }

    /// Set the provider tried once after a non-timeout failure.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn ImageGenerator>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Name of the primary provider.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.primary.name()
    }

    /// Whether a fallback provider is configured.
    #[cfg(test)]
    pub(crate) fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    async fn attempt(&self, request: &ImageRequest) -> Attempt {
        match tokio::time::timeout(self.timeout, self.primary.generate(request)).await {
            Ok(Ok(image)) => Attempt::Success(image),
            // A replayed recording of an abandoned call.
            Ok(Err(ImageError::Timeout { .. })) => Attempt::TimedOut,
            Ok(Err(err)) => Attempt::Failed(err),
            Err(_) => Attempt::TimedOut,
        }
    }

    fn timeout_error(&self) -> ImageError {
        ImageError::Timeout { seconds: self.timeout.as_secs() }
    }

    /// Generate one image, applying the timeout and fallback rules.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Timeout`] when the primary attempt exceeds the
    /// bound, the primary error when no fallback applies, or the fallback's
    /// error when the retry also fails.
    pub async fn generate_one(&self, request: &ImageRequest) -> Result<ImageResult, ImageError> {
        let err = match self.attempt(request).await {
            Attempt::Success(image) => {
                return Ok(ImageResult { url: image.url, used_fallback: false });
            }
            Attempt::TimedOut => {
                tracing::warn!(
                    provider = self.primary.name(),
                    seconds = self.timeout.as_secs(),
                    "image request timed out"
                );
                return Err(self.timeout_error());
            }
            Attempt::Failed(err) => err,
        };

        let Some(fallback) = self.fallback.as_ref().filter(|_| err.allows_fallback()) else {
            return Err(err);
        };

        tracing::warn!(
            provider = self.primary.name(),
            fallback = fallback.name(),
            error = %err,
            "primary provider failed, retrying with fallback"
        );
        let image = tokio::time::timeout(self.timeout, fallback.generate(request))
            .await
            .map_err(|_| self.timeout_error())??;
        Ok(ImageResult { url: image.url, used_fallback: true })
    }

    /// Generate one image per prompt concurrently; all succeed or the first
    /// error is returned. Results are in prompt order.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any scene.
    pub async fn generate_many(
        &self,
        prompts: &[String],
        options: &ImageOptions,
    ) -> Result<Vec<ImageResult>, ImageError> {
        self.generate_many_with_progress(prompts, options, |_| {}).await
    }

    /// Like [`Illustrator::generate_many`], calling `on_image` with the
    /// number of finished scenes each time one resolves.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by any scene; the rest are dropped.
    pub async fn generate_many_with_progress(
        &self,
        prompts: &[String],
        options: &ImageOptions,
        mut on_image: impl FnMut(usize),
    ) -> Result<Vec<ImageResult>, ImageError> {
        let requests: Vec<ImageRequest> = prompts.iter().map(|p| options.request(p)).collect();
        tracing::info!(
            provider = self.primary.name(),
            scenes = requests.len(),
            "requesting scene images"
        );
        let mut in_flight: FuturesUnordered<_> = requests
            .iter()
            .enumerate()
            .map(|(index, request)| async move { (index, self.generate_one(request).await) })
            .collect();

        let mut results: Vec<Option<ImageResult>> = vec![None; requests.len()];
        let mut finished = 0;
        while let Some((index, result)) = in_flight.next().await {
            results[index] = Some(result?);
            finished += 1;
            on_image(finished);
        }
        Ok(results.into_iter().flatten().collect())
    }
}
