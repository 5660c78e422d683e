//! Configuration file loading with environment variable overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::live::vertex::{check_location, check_project_id, VertexAuth, DEFAULT_LOCATION};
use crate::error::ImageError;
use crate::model::{resolve_provider, ImageProvider};
use crate::params::{ArtStyle, AspectRatio, Resolution};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API key configuration.
    #[serde(default)]
    pub keys: KeysConfig,

    /// Vertex AI project settings.
    #[serde(default)]
    pub vertex: VertexConfig,

    /// Image provider selection.
    #[serde(default)]
    pub image: ImageConfig,

    /// Default generation parameters (used when CLI flags are omitted).
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// HTTP service settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Export settings.
    #[serde(default)]
    pub export: ExportConfig,
}

/// API key configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Google AI key: planner, `gemini` and `google-ai` providers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini: Option<String>,
    /// `OpenAI` API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<String>,
    /// Vertex AI access token or API key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vertex: Option<String>,
}

/// Vertex AI project settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexConfig {
    /// Google Cloud project id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Region, `us-central1` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// How the credential is sent.
    #[serde(default)]
    pub auth: VertexAuth,
}

/// Image provider selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Provider name or alias.
    pub provider: String,
    /// Retry failed requests once against Pollinations.
    pub fallback: bool,
    /// Client-side bound on one provider attempt.
    pub timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            provider: ImageProvider::Gemini.name().to_string(),
            fallback: true,
            timeout_secs: 30,
        }
    }
}

impl ImageConfig {
    /// The configured provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known provider.
    pub fn provider(&self) -> Result<ImageProvider, String> {
        resolve_provider(&self.provider)
    }

    /// The per-attempt timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Default generation parameters from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Number of scenes.
    pub scene_count: u32,
    /// Card aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Resolution tier.
    pub resolution: Resolution,
    /// Image style.
    pub art_style: ArtStyle,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            scene_count: 4,
            aspect_ratio: AspectRatio::Square,
            resolution: Resolution::TwoK,
            art_style: ArtStyle::ModernMinimal,
        }
    }
}

/// Where the HTTP routes take provider credentials from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    /// Only the configured keys; keys in request bodies are ignored.
    #[default]
    Server,
    /// Request-body keys first, configured keys otherwise.
    Client,
}

/// HTTP service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,
    /// Credential boundary.
    pub credentials: CredentialMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:3000".to_string(), credentials: CredentialMode::Server }
    }
}

/// Export settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Font used to draw headlines; headlines are skipped without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<PathBuf>,
}

/// Keys and project settings resolved from the file and the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Google AI key.
    pub gemini_key: Option<String>,
    /// `OpenAI` key.
    pub openai_key: Option<String>,
    /// Vertex access token or API key.
    pub vertex_key: Option<String>,
    /// Vertex project id.
    pub project_id: Option<String>,
    /// Vertex region.
    pub location: String,
    /// How the Vertex credential is sent.
    pub vertex_auth: VertexAuth,
}

impl Credentials {
    /// Overlay credentials supplied by a client request. The key goes to the
    /// slot the provider reads; blank values are ignored.
    ///
    /// A client project or region only applies together with a client key,
    /// so the server's own Vertex credential always goes to the server's
    /// own project and region.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidArgument`] for a malformed project id or
    /// region, whether or not it would have applied.
    pub fn with_client_values(
        mut self,
        provider: ImageProvider,
        api_key: Option<&str>,
        project_id: Option<&str>,
        location: Option<&str>,
    ) -> Result<Self, ImageError> {
        let present = |value: Option<&str>| {
            value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
        };
        let project_id = present(project_id);
        let location = present(location);
        if let Some(project_id) = &project_id {
            check_project_id(project_id)?;
        }
        if let Some(location) = &location {
            check_location(location)?;
        }

        let Some(key) = present(api_key) else {
            if project_id.is_some() || location.is_some() {
                tracing::debug!("client project/location ignored without a client key");
            }
            return Ok(self);
        };
        match provider {
            ImageProvider::Gemini | ImageProvider::GoogleAi => self.gemini_key = Some(key),
            ImageProvider::DallE => self.openai_key = Some(key),
            ImageProvider::Vertex => self.vertex_key = Some(key),
            ImageProvider::Pollinations => {}
        }
        if let Some(project_id) = project_id {
            self.project_id = Some(project_id);
        }
        if let Some(location) = location {
            self.location = location;
        }
        Ok(self)
    }
}

impl Config {
    /// Load configuration from the given path, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
    }

    /// Write the whole configuration back to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
        }
        std::fs::write(path, contents)
            .map_err(|e| format!("Failed to write config {}: {e}", path.display()))
    }

    /// Get the Gemini API key, preferring environment variable.
    #[must_use]
    pub fn gemini_key(&self) -> Option<String> {
        env_or("GEMINI_API_KEY", self.keys.gemini.as_ref())
    }

    /// Get the `OpenAI` API key, preferring environment variable.
    #[must_use]
    pub fn openai_key(&self) -> Option<String> {
        env_or("OPENAI_API_KEY", self.keys.openai.as_ref())
    }

    /// Get the Vertex credential, preferring environment variable.
    #[must_use]
    pub fn vertex_key(&self) -> Option<String> {
        env_or("VERTEX_API_KEY", self.keys.vertex.as_ref())
    }

    /// Get the Vertex project id, preferring environment variable.
    #[must_use]
    pub fn project_id(&self) -> Option<String> {
        env_or("VERTEX_PROJECT_ID", self.vertex.project_id.as_ref())
    }

    /// Resolve every credential with environment overrides applied.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            gemini_key: self.gemini_key(),
            openai_key: self.openai_key(),
            vertex_key: self.vertex_key(),
            project_id: self.project_id(),
            location: self
                .vertex
                .location
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            vertex_auth: self.vertex.auth,
        }
    }
}

fn env_or(var: &str, file_value: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| file_value.cloned())
}

/// Discover the config file path using the resolution order:
/// 1. Explicit path (from `--config` flag)
/// 2. `CARDNEWS_CONFIG` environment variable
/// 3. `~/.config/cardnews/config.toml`
#[must_use]
pub fn discover_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(p) = explicit {
        return PathBuf::from(p);
    }

    if let Ok(p) = std::env::var("CARDNEWS_CONFIG") {
        return PathBuf::from(p);
    }

    default_config_path()
}

/// Default config path: `~/.config/cardnews/config.toml`.
fn default_config_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config/cardnews/config.toml")
    } else {
        PathBuf::from("cardnews.toml")
    }
}
