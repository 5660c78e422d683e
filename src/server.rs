//! HTTP routes for a web frontend: the image proxy and the scene planner.
//!
//! Errors are returned as `{ "error": .., "details": .. }` with the status
//! of the typed error.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::config::{CredentialMode, Credentials};
use crate::context::{illustrator, live_image_generator, live_text_generator};
use crate::data_url;
use crate::error::{CardNewsError, ImageError, PlanError};
use crate::fallback::{FallbackPolicy, DEFAULT_TIMEOUT};
use crate::model::ImageProvider;
use crate::params::{ArtStyle, AspectRatio, ReferenceMode, Resolution};
use crate::planner::{ContentPlanner, SceneContent};
use crate::ports::image_generator::{ImageRequest, ReferenceImage};
use crate::ports::{ImageGenerator, TextGenerator};

/// Builds the image adapter for a request's credentials.
pub type ImageFactory =
    Arc<dyn Fn(ImageProvider, &Credentials) -> Result<Arc<dyn ImageGenerator>, ImageError> + Send + Sync>;

/// Builds the planner's text adapter for a request's credentials.
pub type TextFactory =
    Arc<dyn Fn(&Credentials) -> Result<Arc<dyn TextGenerator>, PlanError> + Send + Sync>;

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    provider: ImageProvider,
    credentials: Credentials,
    mode: CredentialMode,
    policy: FallbackPolicy,
    timeout: Duration,
    images: ImageFactory,
    text: TextFactory,
}

impl AppState {
    /// State backed by the live adapters.
    #[must_use]
    pub fn new(provider: ImageProvider, credentials: Credentials, mode: CredentialMode) -> Self {
        Self {
            provider,
            credentials,
            mode,
            policy: FallbackPolicy::Enabled,
            timeout: DEFAULT_TIMEOUT,
            images: Arc::new(live_image_generator),
            text: Arc::new(live_text_generator),
        }
    }

    /// Set the fallback policy.
    #[must_use]
    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the image adapter factory.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_image_factory(mut self, images: ImageFactory) -> Self {
        self.images = images;
        self
    }

    /// Replace the text adapter factory.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn with_text_factory(mut self, text: TextFactory) -> Self {
        self.text = text;
        self
    }

    fn credentials_for(
        &self,
        provider: ImageProvider,
        api_key: Option<&str>,
        project_id: Option<&str>,
        location: Option<&str>,
    ) -> Result<Credentials, ImageError> {
        match self.mode {
            CredentialMode::Server => Ok(self.credentials.clone()),
            CredentialMode::Client => {
                self.credentials.clone().with_client_values(provider, api_key, project_id, location)
            }
        }
    }

    async fn generate_image(&self, body: GenerateImageBody) -> Result<GenerateImageResponse, ImageError> {
        let prompt = body.prompt.trim();
        if prompt.is_empty() {
            return Err(ImageError::InvalidArgument("prompt is required".into()));
        }
        let reference_images = body
            .reference_images
            .into_iter()
            .map(ReferenceImageBody::decode)
            .collect::<Result<Vec<_>, _>>()?;
        let request = ImageRequest {
            prompt: prompt.to_string(),
            aspect_ratio: AspectRatio::normalize(body.aspect_ratio.as_deref().unwrap_or_default()),
            resolution: Resolution::from(body.resolution.unwrap_or_default()),
            reference_images,
        };

        let credentials = self.credentials_for(
            self.provider,
            body.api_key.as_deref(),
            body.project_id.as_deref(),
            body.location.as_deref(),
        )?;
        let primary = (self.images)(self.provider, &credentials)?;
        let illustrator = illustrator(primary, self.provider, self.policy, self.timeout);
        tracing::info!(provider = %self.provider, ratio = %request.aspect_ratio, "proxying image request");
        let result = illustrator.generate_one(&request).await?;
        Ok(GenerateImageResponse { url: result.url, fallback: result.used_fallback })
    }

    async fn plan(&self, body: PlanBody) -> Result<Vec<SceneContent>, PlanError> {
        let scene_count = body
            .scene_count
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| PlanError::InvalidArgument("sceneCount must be between 1 and 10".into()))?;
        let style = body.art_style.map(ArtStyle::from).unwrap_or_default();
        let credentials = self
            .credentials_for(ImageProvider::Gemini, body.api_key.as_deref(), None, None)
            .map_err(|e| PlanError::InvalidArgument(e.to_string()))?;
        let text = (self.text)(&credentials)?;
        ContentPlanner::new(text).plan(&body.topic, scene_count, style).await
    }
}

/// Body of `POST /api/generate-image`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageBody {
    /// Image prompt.
    #[serde(default)]
    pub prompt: String,
    /// `1:1`, `9:16` or `16:9`; anything else means `1:1`.
    pub aspect_ratio: Option<String>,
    /// Client-supplied key, used only in client credential mode.
    pub api_key: Option<String>,
    /// Client-supplied Vertex project.
    pub project_id: Option<String>,
    /// Client-supplied Vertex region.
    pub location: Option<String>,
    /// `2k` or `4k`.
    pub resolution: Option<String>,
    /// Conditioning images.
    #[serde(default)]
    pub reference_images: Vec<ReferenceImageBody>,
}

/// A reference image as sent by the browser.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceImageBody {
    /// Base64 payload or a full `data:` URL.
    pub data: String,
    /// MIME type; sniffed from the bytes when absent.
    pub mime_type: Option<String>,
    /// What the image conditions.
    #[serde(default)]
    pub mode: ReferenceMode,
}

impl ReferenceImageBody {
    fn decode(self) -> Result<ReferenceImage, ImageError> {
        let (sniffed_mime, data) = if data_url::is_data_url(&self.data) {
            let (mime, data) = data_url::decode(&self.data)
                .map_err(|e| ImageError::InvalidArgument(format!("reference image: {e}")))?;
            (Some(mime), data)
        } else {
            let data = base64::engine::general_purpose::STANDARD
                .decode(self.data.trim())
                .map_err(|e| ImageError::InvalidArgument(format!("reference image: {e}")))?;
            (None, data)
        };
        let mut image = ReferenceImage::from_bytes(data, self.mode);
        if let Some(mime) = self.mime_type.or(sniffed_mime) {
            image.mime_type = mime;
        }
        Ok(image)
    }
}

/// Success body of `POST /api/generate-image`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateImageResponse {
    /// Remote URL or `data:` URL.
    pub url: String,
    /// Whether the fallback provider drew the image.
    pub fallback: bool,
}

/// Body of `POST /api/plan`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanBody {
    /// What the card news is about.
    #[serde(default)]
    pub topic: String,
    /// Number of scenes, `1..=10`.
    pub scene_count: Option<i64>,
    /// Style name; unknown names mean the default style.
    pub art_style: Option<String>,
    /// Client-supplied Google AI key.
    pub api_key: Option<String>,
}

/// Error body shared by every route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// User-facing message.
    pub error: String,
    /// Raw provider diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn error_response(status: u16, error: String, details: Option<&str>) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(%status, %error, "request failed");
    } else {
        tracing::warn!(%status, %error, "request rejected");
    }
    (status, Json(ErrorBody { error, details: details.map(str::to_string) })).into_response()
}

fn rejection_response(rejection: &JsonRejection) -> Response {
    error_response(400, format!("Invalid request body: {}", rejection.body_text()), None)
}

async fn generate_image_route(
    State(state): State<AppState>,
    body: Result<Json<GenerateImageBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(&rejection),
    };
    match state.generate_image(body).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => error_response(err.http_status(), err.to_string(), err.details()),
    }
}

async fn plan_route(
    State(state): State<AppState>,
    body: Result<Json<PlanBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return rejection_response(&rejection),
    };
    match state.plan(body).await {
        Ok(scenes) => Json(scenes).into_response(),
        Err(err) => error_response(err.http_status(), err.to_string(), err.details()),
    }
}

/// The application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/generate-image", post(generate_image_route))
        .route("/api/plan", post(plan_route))
        .with_state(state)
}

/// Serve the routes on `bind` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(bind: &str, state: AppState) -> Result<(), CardNewsError> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, provider = %state.provider, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}
