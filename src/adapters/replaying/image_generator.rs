//! Replaying adapter for the `ImageGenerator` port.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result};
use crate::cassette::format::RecordedError;
use crate::cassette::replayer::CassetteReplayer;
use crate::error::ImageError;
use crate::ports::image_generator::{GenerateFuture, GeneratedImage, ImageGenerator, ImageRequest};

/// Serves recorded image generation results from a cassette.
pub struct ReplayingImageGenerator {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingImageGenerator {
    /// Create a replaying generator backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

fn to_image_error(recorded: RecordedError) -> ImageError {
    match recorded.status {
        Some(408) => ImageError::Timeout { seconds: 0 },
        Some(status) => ImageError::from_status(status, recorded.message),
        None => ImageError::Api { status: 0, message: recorded.message },
    }
}

impl ImageGenerator for ReplayingImageGenerator {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn generate(&self, _request: &ImageRequest) -> GenerateFuture<'_> {
        // Pull the output now so concurrent calls consume the cassette in call order.
        let output = next_output(&self.replayer, "image_generator", "generate");
        Box::pin(async move {
            output.and_then(replay_result::<GeneratedImage>).map_err(to_image_error)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::{Cassette, Interaction};
    use crate::params::{AspectRatio, Resolution};
    use serde_json::{json, Value};

    fn replayer(outputs: Vec<Value>) -> Arc<Mutex<CassetteReplayer>> {
        let interactions = outputs
            .into_iter()
            .enumerate()
            .map(|(i, output)| Interaction {
                seq: i as u64,
                port: "image_generator".into(),
                method: "generate".into(),
                input: json!({}),
                output,
            })
            .collect();
        let cassette = Cassette {
            name: "t".into(),
            recorded_at: chrono::Utc::now(),
            commit: "c".into(),
            interactions,
        };
        Arc::new(Mutex::new(CassetteReplayer::new(cassette)))
    }

    fn request() -> ImageRequest {
        ImageRequest {
            prompt: "x".into(),
            aspect_ratio: AspectRatio::Square,
            resolution: Resolution::TwoK,
            reference_images: Vec::new(),
        }
    }

    #[tokio::test]
    async fn replays_urls_then_errors() {
        let generator = ReplayingImageGenerator::new(replayer(vec![
            json!({"Ok": {"url": "https://example.com/1.png"}}),
            json!({"Err": {"status": 429, "message": "quota"}}),
            json!({"Err": {"status": 408, "message": "timed out"}}),
        ]));

        assert_eq!(generator.generate(&request()).await.unwrap().url, "https://example.com/1.png");
        assert!(matches!(
            generator.generate(&request()).await,
            Err(ImageError::RateLimited { details }) if details == "quota"
        ));
        assert!(matches!(generator.generate(&request()).await, Err(ImageError::Timeout { .. })));
    }

    #[tokio::test]
    async fn exhausted_cassette_is_an_api_error() {
        let generator = ReplayingImageGenerator::new(replayer(Vec::new()));
        let err = generator.generate(&request()).await.unwrap_err();
        assert!(matches!(err, ImageError::Api { status: 0, .. }));
        assert!(err.to_string().contains("no interactions recorded"));
    }
}
