//! Topic → scenes → images → cards.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CardNewsError;
use crate::fallback::{ImageOptions, ImageResult, Illustrator};
use crate::params::{ArtStyle, AspectRatio, Resolution};
use crate::planner::{validate_scene_count, validate_topic, ContentPlanner, SceneContent};
use crate::ports::image_generator::ReferenceImage;

/// Everything one generation run needs.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// What the card news is about.
    pub topic: String,
    /// Number of cards, `1..=10`.
    pub scene_count: u32,
    /// Card aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Resolution tier.
    pub resolution: Resolution,
    /// Style keywords forced into every image prompt.
    pub art_style: ArtStyle,
    /// Conditioning images for providers that accept them.
    pub reference_images: Vec<ReferenceImage>,
}

impl GenerationRequest {
    /// Reject an empty topic or an out-of-range scene count.
    ///
    /// # Errors
    ///
    /// Returns [`CardNewsError::InvalidArgument`] describing the problem.
    pub fn validate(&self) -> Result<(), CardNewsError> {
        validate_topic(&self.topic).map_err(CardNewsError::InvalidArgument)?;
        validate_scene_count(self.scene_count).map_err(CardNewsError::InvalidArgument)?;
        Ok(())
    }

    /// Settings shared by every scene's image request.
    #[must_use]
    pub fn image_options(&self) -> ImageOptions {
        ImageOptions {
            aspect_ratio: self.aspect_ratio,
            resolution: self.resolution,
            reference_images: self.reference_images.clone(),
        }
    }
}

/// A finished card: script plus image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Equal to the scene's page.
    pub id: u32,
    /// Overlay text.
    pub headline: String,
    /// Narration.
    pub script: String,
    /// Prompt the image was generated from.
    pub image_prompt: String,
    /// Remote URL or `data:` URL, unchanged from the provider.
    pub image_url: String,
    /// Whether the fallback provider drew the image.
    #[serde(default)]
    pub used_fallback: bool,
}

/// Pair each scene with the image generated for it, by index.
#[must_use]
pub fn merge_cards(scenes: Vec<SceneContent>, images: Vec<ImageResult>) -> Vec<Card> {
    scenes
        .into_iter()
        .zip(images)
        .map(|(scene, image)| Card {
            id: scene.page,
            headline: scene.headline,
            script: scene.script,
            image_prompt: scene.image_prompt,
            image_url: image.url,
            used_fallback: image.used_fallback,
        })
        .collect()
}

/// Progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Scripting scenes.
    Planning,
    /// Sending image requests.
    RequestingImages,
    /// Waiting for providers to render.
    Rendering,
    /// Merging scripts and images into cards.
    Composing,
    /// Finished.
    Done,
}

impl Stage {
    /// Progress percentage shown for this stage.
    #[must_use]
    pub fn percent(self) -> u8 {
        match self {
            Self::Planning => 0,
            Self::RequestingImages => 30,
            Self::Rendering => 50,
            Self::Composing => 80,
            Self::Done => 100,
        }
    }

    /// Human-readable status line.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            Self::Planning => "Planning content",
            Self::RequestingImages => "Requesting images",
            Self::Rendering => "Rendering images",
            Self::Composing => "Composing cards",
            Self::Done => "Done",
        }
    }
}

/// Plans scenes, illustrates them, and merges the result.
pub struct CardNewsPipeline {
    planner: ContentPlanner,
    illustrator: Illustrator,
}

impl CardNewsPipeline {
    /// Compose a planner and an illustrator.
    #[must_use]
    pub fn new(planner: ContentPlanner, illustrator: Illustrator) -> Self {
        Self { planner, illustrator }
    }

    /// Run one generation, reporting each stage through `on_stage`.
    ///
    /// # Errors
    ///
    /// Returns [`CardNewsError::InvalidArgument`] before any request for bad
    /// input, or the first planner or image error.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        mut on_stage: impl FnMut(Stage),
    ) -> Result<Vec<Card>, CardNewsError> {
        request.validate()?;
        let mut report = |stage: Stage| {
            tracing::info!(percent = stage.percent(), "{}", stage.message());
            on_stage(stage);
        };

        report(Stage::Planning);
        let scenes = self.planner.plan(&request.topic, request.scene_count, request.art_style).await?;

        report(Stage::RequestingImages);
        let prompts: Vec<String> = scenes.iter().map(|scene| scene.image_prompt.clone()).collect();
        let options = request.image_options();
        let images = self
            .illustrator
            .generate_many_with_progress(&prompts, &options, |finished| {
                if finished == 1 {
                    report(Stage::Rendering);
                }
            })
            .await?;

        report(Stage::Composing);
        let fallbacks = images.iter().filter(|image| image.used_fallback).count();
        if fallbacks > 0 {
            tracing::warn!(
                provider = self.illustrator.provider_name(),
                fallbacks,
                "some scenes were drawn by the fallback provider"
            );
        }
        let cards = merge_cards(scenes, images);

        report(Stage::Done);
        Ok(cards)
    }
}

/// The `cards.json` file written next to the exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardsManifest {
    /// The topic the cards were generated for.
    pub topic: String,
    /// Aspect ratio of every card.
    pub aspect_ratio: AspectRatio,
    /// Cards in page order.
    pub cards: Vec<Card>,
}

impl CardsManifest {
    /// Load a manifest from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CardNewsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the manifest as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), CardNewsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::live::pollinations::PollinationsGenerator;
    use crate::error::{ImageError, PlanError};
    use crate::fallback::DEFAULT_TIMEOUT;
    use crate::ports::image_generator::{GenerateFuture, GeneratedImage, ImageGenerator, ImageRequest};
    use crate::ports::text_generator::{CompleteFuture, TextGenerator, TextRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ThreeScenes;

    impl TextGenerator for ThreeScenes {
        fn complete(&self, _request: &TextRequest) -> CompleteFuture<'_> {
            Box::pin(async {
                Ok(r#"[
                    {"page":1,"headline":"Drink water","script":"s1","imagePrompt":"glass"},
                    {"page":2,"headline":"Sleep well","script":"s2","imagePrompt":"moon"},
                    {"page":3,"headline":"Walk daily","script":"s3","imagePrompt":"shoes"}
                ]"#
                .to_string())
            })
        }
    }

    #[derive(Default)]
    struct CountingImages {
        calls: AtomicUsize,
        fail_prompt: Option<&'static str>,
    }

    impl ImageGenerator for CountingImages {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn generate(&self, request: &ImageRequest) -> GenerateFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.fail_prompt == Some(request.prompt.as_str()) {
                Err(ImageError::from_status(500, "boom".into()))
            } else {
                Ok(GeneratedImage { url: format!("https://img.example/{}.png", request.prompt) })
            };
            Box::pin(async move { result })
        }
    }

    fn request(topic: &str, scene_count: u32) -> GenerationRequest {
        GenerationRequest { topic: topic.into(), scene_count, ..GenerationRequest::default() }
    }

    #[test]
    fn merge_round_trip() {
        let scenes: Vec<SceneContent> = (1..=3)
            .map(|page| SceneContent {
                page,
                headline: format!("h{page}"),
                script: format!("s{page}"),
                image_prompt: format!("p{page}"),
            })
            .collect();
        let images: Vec<ImageResult> = (1..=3)
            .map(|i| ImageResult { url: format!("data:image/png;base64,{i}"), used_fallback: i == 2 })
            .collect();

        let cards = merge_cards(scenes.clone(), images.clone());
        assert_eq!(cards.len(), 3);
        for ((card, scene), image) in cards.iter().zip(&scenes).zip(&images) {
            assert_eq!(card.id, scene.page);
            assert_eq!(card.headline, scene.headline);
            assert_eq!(card.image_url, image.url);
            assert_eq!(card.used_fallback, image.used_fallback);
        }
    }

    #[tokio::test]
    async fn run_reports_every_stage_in_order() {
        let images = Arc::new(CountingImages::default());
        let pipeline = CardNewsPipeline::new(
            ContentPlanner::new(Arc::new(ThreeScenes)),
            Illustrator::new(Arc::clone(&images) as Arc<dyn ImageGenerator>, DEFAULT_TIMEOUT),
        );

        let mut stages = Vec::new();
        let cards = pipeline.run(&request("Healthy habits", 3), |stage| stages.push(stage)).await.unwrap();

        assert_eq!(
            stages,
            [Stage::Planning, Stage::RequestingImages, Stage::Rendering, Stage::Composing, Stage::Done]
        );
        let percents: Vec<u8> = stages.iter().map(|s| s.percent()).collect();
        assert_eq!(percents, [0, 30, 50, 80, 100]);
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[1].image_url, "https://img.example/moon.png");
        assert_eq!(images.calls.load(Ordering::SeqCst), 3);
    }

    struct Refusing;

    impl ImageGenerator for Refusing {
        fn name(&self) -> &'static str {
            "refusing"
        }

        fn generate(&self, _request: &ImageRequest) -> GenerateFuture<'_> {
            Box::pin(async { Err(ImageError::from_status(401, "bad key".into())) })
        }
    }

    #[tokio::test]
    async fn rendering_waits_for_an_image() {
        let pipeline = CardNewsPipeline::new(
            ContentPlanner::new(Arc::new(ThreeScenes)),
            Illustrator::new(Arc::new(Refusing), DEFAULT_TIMEOUT),
        );
        let mut stages = Vec::new();
        let err = pipeline.run(&request("Healthy habits", 3), |stage| stages.push(stage)).await.unwrap_err();
        assert!(matches!(err, CardNewsError::Image(ImageError::Unauthorized { .. })));
        assert_eq!(stages, [Stage::Planning, Stage::RequestingImages]);
    }

    #[tokio::test]
    async fn run_rejects_bad_input_without_requests() {
        let images = Arc::new(CountingImages::default());
        let pipeline = CardNewsPipeline::new(
            ContentPlanner::new(Arc::new(ThreeScenes)),
            Illustrator::new(Arc::clone(&images) as Arc<dyn ImageGenerator>, DEFAULT_TIMEOUT),
        );
        let mut stages = Vec::new();
        let err = pipeline.run(&request("", 3), |stage| stages.push(stage)).await.unwrap_err();
        assert!(matches!(err, CardNewsError::InvalidArgument(_)));
        assert!(stages.is_empty());
        assert_eq!(images.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn count_mismatch_surfaces_as_plan_error() {
        let pipeline = CardNewsPipeline::new(
            ContentPlanner::new(Arc::new(ThreeScenes)),
            Illustrator::new(Arc::new(CountingImages::default()), DEFAULT_TIMEOUT),
        );
        let err = pipeline.run(&request("Healthy habits", 4), |_| {}).await.unwrap_err();
        assert!(matches!(err, CardNewsError::Plan(PlanError::InvalidStructure(_))));
    }

    #[tokio::test]
    async fn failed_scene_uses_fallback() {
        let images = CountingImages { fail_prompt: Some("moon"), ..CountingImages::default() };
        let pipeline = CardNewsPipeline::new(
            ContentPlanner::new(Arc::new(ThreeScenes)),
            Illustrator::new(Arc::new(images), DEFAULT_TIMEOUT)
                .with_fallback(Arc::new(PollinationsGenerator::new())),
        );
        let cards = pipeline.run(&request("Healthy habits", 3), |_| {}).await.unwrap();
        assert!(!cards[0].used_fallback);
        assert!(cards[1].used_fallback);
        assert!(cards[1].image_url.starts_with("https://image.pollinations.ai/"));
    }

    #[test]
    fn manifest_save_and_load() {
        let dir = std::env::temp_dir().join("cardnews_manifest_test");
        let path = dir.join("cards.json");
        let manifest = CardsManifest {
            topic: "Tea".into(),
            aspect_ratio: AspectRatio::Portrait,
            cards: vec![Card {
                id: 1,
                headline: "h".into(),
                script: "s".into(),
                image_prompt: "p".into(),
                image_url: "https://img.example/1.png".into(),
                used_fallback: false,
            }],
        };
        manifest.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"aspect_ratio\": \"9:16\""));
        assert!(content.contains("\"imageUrl\""));
        assert_eq!(CardsManifest::load(&path).unwrap(), manifest);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
