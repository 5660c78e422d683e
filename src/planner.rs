//! Scene planning: one text-model call that scripts every card.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlanError;
use crate::model::PLANNER_MODEL;
use crate::params::ArtStyle;
use crate::ports::text_generator::{TextGenerator, TextRequest};

/// Largest number of scenes one run may ask for.
pub const MAX_SCENES: u32 = 10;

/// One scripted card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneContent {
    /// 1-based page number.
    pub page: u32,
    /// Short overlay text, at most two lines.
    pub headline: String,
    /// Longer narration for the card.
    pub script: String,
    /// English prompt for the image model.
    pub image_prompt: String,
}

/// Check a topic before anything is sent.
///
/// # Errors
///
/// Returns a message when the topic is empty or whitespace.
pub fn validate_topic(topic: &str) -> Result<&str, String> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err("topic must not be empty".to_string());
    }
    Ok(topic)
}

/// Check a scene count before anything is sent. Out-of-range counts are
/// rejected, not clamped.
///
/// # Errors
///
/// Returns a message when the count is outside `1..=10`.
pub fn validate_scene_count(scene_count: u32) -> Result<u32, String> {
    if (1..=MAX_SCENES).contains(&scene_count) {
        Ok(scene_count)
    } else {
        Err(format!("scene count must be between 1 and {MAX_SCENES}, got {scene_count}"))
    }
}

/// The instruction sent to the text model.
#[must_use]
pub fn build_prompt(topic: &str, scene_count: u32, style: ArtStyle) -> String {
    let mut prompt = String::from(
        "You are an expert planner of social media card news.\n\n\
         Guidelines:\n\
         1. Every scene needs two texts, a headline and a script.\n\
         \x20  headline: large text shown over the image. Keep it between 15 and 25 characters, \
         punchy and memorable. At most 2 lines.\n\
         \x20  script: the narration shown next to the card. 2-3 sentences that explain the \
         key point of the scene.\n\
         \x20  Write headline and script in the same language as the topic.\n\
         2. Image style (mandatory):\n",
    );
    for keyword in style.keywords() {
        let _ = writeln!(prompt, "   - \"{keyword}\"");
    }
    prompt.push_str(
        "3. Images consist only of visual elements (icons, symbols, illustrations). \
         Never put text or letters in the image.\n\
         4. Write imagePrompt in English.\n\n",
    );
    let _ = writeln!(prompt, "Topic: {topic}");
    let _ = writeln!(prompt, "Scene count: {scene_count}\n");
    let _ = writeln!(
        prompt,
        "Plan exactly {scene_count} card news scenes on this topic. \
         Every imagePrompt must contain all of these keywords: {}.\n",
        style.keywords().join(", ")
    );
    prompt.push_str(
        "Output format (JSON array only):\n\
         [\n\
         \x20 {\n\
         \x20   \"page\": 1,\n\
         \x20   \"headline\": \"short punchy headline (15-25 characters)\",\n\
         \x20   \"script\": \"detailed narration...\",\n\
         \x20   \"imagePrompt\": \"English image prompt...\"\n\
         \x20 }\n\
         ]\n\n\
         Answer with the JSON array only. Do not add any explanation.",
    );
    prompt
}

/// Remove a surrounding Markdown code fence (```` ```json ```` or bare ```` ``` ````).
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn string_field(item: &Value, field: &str, index: usize) -> Result<String, PlanError> {
    item.get(field).and_then(Value::as_str).map(str::to_string).ok_or_else(|| {
        PlanError::InvalidStructure(format!("scene {} is missing a string `{field}`", index + 1))
    })
}

/// Parse and validate the model's answer.
///
/// # Errors
///
/// Returns [`PlanError::Parse`] for invalid JSON and
/// [`PlanError::InvalidStructure`] when the JSON is not an array of
/// `scene_count` well-formed scenes.
pub fn parse_scenes(text: &str, scene_count: u32) -> Result<Vec<SceneContent>, PlanError> {
    let value: Value =
        serde_json::from_str(strip_code_fences(text)).map_err(|e| PlanError::Parse(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(PlanError::InvalidStructure("response is not an array".to_string()));
    };

    let mut scenes = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if !item.is_object() {
            return Err(PlanError::InvalidStructure(format!("scene {} is not an object", index + 1)));
        }
        if !item.get("page").is_some_and(Value::is_number) {
            return Err(PlanError::InvalidStructure(format!(
                "scene {} is missing a numeric `page`",
                index + 1
            )));
        }
        let page = u32::try_from(index + 1)
            .map_err(|_| PlanError::InvalidStructure("too many scenes".to_string()))?;
        scenes.push(SceneContent {
            page,
            headline: string_field(item, "headline", index)?,
            script: string_field(item, "script", index)?,
            image_prompt: string_field(item, "imagePrompt", index)?,
        });
    }

    if scenes.len() != scene_count as usize {
        return Err(PlanError::InvalidStructure(format!(
            "expected {scene_count} scenes, got {}",
            scenes.len()
        )));
    }
    Ok(scenes)
}

/// Scripts card news scenes through a [`TextGenerator`].
#[derive(Clone)]
pub struct ContentPlanner {
    text: Arc<dyn TextGenerator>,
    model: String,
}

impl ContentPlanner {
    /// A planner that uses the default text model.
    #[must_use]
    pub fn new(text: Arc<dyn TextGenerator>) -> Self {
        Self { text, model: PLANNER_MODEL.to_string() }
    }

    /// Script `scene_count` scenes for `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidArgument`] before any request when the
    /// topic is empty or the count is out of range; otherwise the text
    /// model's error or a parse/structure error.
    pub async fn plan(
        &self,
        topic: &str,
        scene_count: u32,
        style: ArtStyle,
    ) -> Result<Vec<SceneContent>, PlanError> {
        let topic = validate_topic(topic).map_err(PlanError::InvalidArgument)?;
        let scene_count = validate_scene_count(scene_count).map_err(PlanError::InvalidArgument)?;

        tracing::info!(model = %self.model, scene_count, style = %style, "planning scenes");
        let request = TextRequest { model: self.model.clone(), prompt: build_prompt(topic, scene_count, style) };
        let text = self.text.complete(&request).await?;
        let scenes = parse_scenes(&text, scene_count)?;
        tracing::debug!(scenes = scenes.len(), "planner answer accepted");
        Ok(scenes)
    }
}
