//! Live adapter for Imagen on Vertex AI.

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use super::imagen::{parse_predictions, predict_body};
use super::read_success_body;
use crate::error::ImageError;
use crate::model::ImageProvider;
use crate::ports::image_generator::{GenerateFuture, ImageGenerator, ImageRequest};

/// Default Vertex AI region.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// How the Vertex credential is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertexAuth {
    /// `Authorization: Bearer <access token>`.
    #[default]
    Bearer,
    /// `?key=<api key>` query string.
    Query,
}

/// Imagen on Vertex AI, scoped to a project and region.
pub struct VertexGenerator {
    client: Client,
    credential: String,
    project_id: String,
    location: String,
    auth: VertexAuth,
}

impl VertexGenerator {
    /// Create a new Vertex AI generator.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidArgument`] if the region or project id
    /// is malformed.
    pub fn new(
        credential: String,
        project_id: String,
        location: String,
        auth: VertexAuth,
    ) -> Result<Self, ImageError> {
        check_location(&location)?;
        check_project_id(&project_id)?;
        Ok(Self { client: Client::new(), credential, project_id, location, auth })
    }

    /// The `:predict` endpoint for this project and region.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be assembled.
    pub fn endpoint(&self) -> Result<Url, ImageError> {
        let base = format!("https://{}-aiplatform.googleapis.com/", self.location);
        let model = format!("{}:predict", ImageProvider::Vertex.model());
        let mut url = Url::parse(&base)
            .map_err(|e| ImageError::InvalidArgument(format!("bad Vertex region: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ImageError::Config("Vertex endpoint cannot take a path".into()))?
            .pop_if_empty()
            .extend([
                "v1",
                "projects",
                self.project_id.as_str(),
                "locations",
                self.location.as_str(),
                "publishers",
                "google",
                "models",
                model.as_str(),
            ]);
        Ok(url)
    }
}

/// Accept only region names shaped like `us-central1` or `europe-west4`.
///
/// # Errors
///
/// Returns [`ImageError::InvalidArgument`] naming the rejected value.
pub fn check_location(location: &str) -> Result<(), ImageError> {
    let mut parts = location.split('-');
    let valid = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(area), Some(zone), None)
            if !area.is_empty()
                && area.bytes().all(|b| b.is_ascii_lowercase())
                && zone.bytes().take_while(u8::is_ascii_lowercase).count() > 0
                && zone.bytes().skip_while(u8::is_ascii_lowercase).count() > 0
                && zone.bytes().skip_while(u8::is_ascii_lowercase).all(|b| b.is_ascii_digit())
    );
    if valid {
        Ok(())
    } else {
        Err(ImageError::InvalidArgument(format!("invalid Vertex location {location:?}")))
    }
}

/// Accept only Google Cloud project ids: 6 to 30 characters of lowercase
/// letters, digits and hyphens, starting with a letter and not ending with a hyphen.
///
/// # Errors
///
/// Returns [`ImageError::InvalidArgument`] naming the rejected value.
pub fn check_project_id(project_id: &str) -> Result<(), ImageError> {
    let bytes = project_id.as_bytes();
    let valid = (6..=30).contains(&bytes.len())
        && bytes[0].is_ascii_lowercase()
        && bytes[bytes.len() - 1] != b'-'
        && bytes.iter().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-');
    if valid {
        Ok(())
    } else {
        Err(ImageError::InvalidArgument(format!("invalid Vertex project id {project_id:?}")))
    }
}

impl ImageGenerator for VertexGenerator {
    fn name(&self) -> &'static str {
        ImageProvider::Vertex.name()
    }

    fn generate(&self, request: &ImageRequest) -> GenerateFuture<'_> {
        let body = predict_body(request, Some("block_few"));
        Box::pin(async move {
            let builder = self.client.post(self.endpoint()?).json(&body);
            let builder = match self.auth {
                VertexAuth::Bearer => builder.bearer_auth(&self.credential),
                VertexAuth::Query => builder.query(&[("key", self.credential.as_str())]),
            };
            tracing::debug!(project = %self.project_id, location = %self.location, "calling Vertex AI Imagen");
            let text = read_success_body(builder.send().await?).await?;
            parse_predictions(&text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_project_and_region_scoped() {
        let generator = VertexGenerator::new(
            "token".into(),
            "my-project".into(),
            "asia-northeast3".into(),
            VertexAuth::Bearer,
        )
        .unwrap();
        assert_eq!(
            generator.endpoint().unwrap().as_str(),
            "https://asia-northeast3-aiplatform.googleapis.com/v1/projects/my-project/locations/asia-northeast3/publishers/google/models/imagen-3.0-generate-001:predict"
        );
    }

    #[test]
    fn region_names_are_checked() {
        for ok in ["us-central1", "europe-west4", "asia-northeast3"] {
            assert!(check_location(ok).is_ok(), "{ok}");
        }
        for bad in ["attacker.example/x?", "us-central", "us-central1-a", "US-central1", "", "-west1", "us-1"] {
            assert!(matches!(check_location(bad), Err(ImageError::InvalidArgument(_))), "{bad}");
        }
    }

    #[test]
    fn project_ids_are_checked() {
        assert!(check_project_id("my-project-42").is_ok());
        for bad in ["proj", "1project", "my-project-", "my/project", "My-Project", "a.example.com"] {
            assert!(matches!(check_project_id(bad), Err(ImageError::InvalidArgument(_))), "{bad}");
        }
    }

    #[test]
    fn malformed_settings_never_build_a_generator() {
        let err = VertexGenerator::new(
            "token".into(),
            "my-project".into(),
            "attacker.example/x?".into(),
            VertexAuth::Bearer,
        )
        .err()
        .unwrap();
        assert!(matches!(err, ImageError::InvalidArgument(_)));
    }

    #[test]
    fn auth_mode_names() {
        let auth: VertexAuth = serde_json::from_str("\"query\"").unwrap();
        assert_eq!(auth, VertexAuth::Query);
        assert_eq!(VertexAuth::default(), VertexAuth::Bearer);
    }
}
