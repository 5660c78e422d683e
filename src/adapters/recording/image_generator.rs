//! Recording adapter for the `ImageGenerator` port.

use std::sync::{Arc, Mutex};

use super::begin;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::image_generator::{GenerateFuture, ImageGenerator, ImageRequest};

/// Records image generation interactions while delegating to an inner implementation.
pub struct RecordingImageGenerator {
    inner: Arc<dyn ImageGenerator>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingImageGenerator {
    /// Creates a new recording generator wrapping the given implementation.
    pub fn new(inner: Arc<dyn ImageGenerator>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl ImageGenerator for RecordingImageGenerator {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn generate(&self, request: &ImageRequest) -> GenerateFuture<'_> {
        let pending = begin(&self.recorder, "image_generator", "generate", request);
        let request = request.clone();

        Box::pin(async move {
            let result = self.inner.generate(&request).await;
            pending.complete(&result);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live::pollinations::PollinationsGenerator;
    use crate::params::{AspectRatio, Resolution};

    #[tokio::test]
    async fn records_the_request_and_url() {
        let dir = std::env::temp_dir().join("cardnews_recording_image_test");
        let path = dir.join("session.cassette.yaml");
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(&path, "t", "c")));
        let generator =
            RecordingImageGenerator::new(Arc::new(PollinationsGenerator::new()), Arc::clone(&recorder));
        let request = ImageRequest {
            prompt: "a lighthouse".into(),
            aspect_ratio: AspectRatio::Square,
            resolution: Resolution::TwoK,
            reference_images: Vec::new(),
        };

        let image = generator.generate(&request).await.unwrap();
        assert_eq!(generator.name(), "pollinations");
        drop(generator);

        let recorder = Arc::try_unwrap(recorder).unwrap().into_inner().unwrap();
        recorder.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("a lighthouse"));
        assert!(content.contains(&image.url));
        let _ = std::fs::remove_dir_all(&dir);
    }

    struct Hanging;

    impl ImageGenerator for Hanging {
        fn name(&self) -> &'static str {
            "hanging"
        }

        fn generate(&self, _request: &ImageRequest) -> GenerateFuture<'_> {
            Box::pin(std::future::pending())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recorded_timeout_still_times_out_on_replay() {
        use crate::adapters::replaying::image_generator::ReplayingImageGenerator;
        use crate::cassette::replayer::CassetteReplayer;
        use crate::error::ImageError;
        use crate::fallback::Illustrator;
        use std::time::Duration;

        let dir = std::env::temp_dir().join("cardnews_recording_timeout_test");
        let path = dir.join("session.cassette.yaml");
        let request = ImageRequest {
            prompt: "cat".into(),
            aspect_ratio: AspectRatio::Square,
            resolution: Resolution::TwoK,
            reference_images: Vec::new(),
        };

        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(&path, "t", "c")));
        let recording = RecordingImageGenerator::new(Arc::new(Hanging), Arc::clone(&recorder));
        let live = Illustrator::new(Arc::new(recording), Duration::from_secs(30))
            .with_fallback(Arc::new(PollinationsGenerator::new()));
        let err = live.generate_one(&request).await.unwrap_err();
        assert!(matches!(err, ImageError::Timeout { seconds: 30 }));
        drop(live);
        Arc::try_unwrap(recorder).unwrap().into_inner().unwrap().finish().unwrap();

        let replayer = Arc::new(Mutex::new(CassetteReplayer::load(&path).unwrap()));
        let replayed = Illustrator::new(
            Arc::new(ReplayingImageGenerator::new(replayer)),
            Duration::from_secs(30),
        )
        .with_fallback(Arc::new(PollinationsGenerator::new()));
        let err = replayed.generate_one(&request).await.unwrap_err();
        assert!(matches!(err, ImageError::Timeout { seconds: 30 }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
