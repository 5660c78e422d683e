//! Service context that bundles all port trait objects.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::adapters::live::gemini::GeminiGenerator;
use crate::adapters::live::gemini_text::GeminiTextGenerator;
use crate::adapters::live::imagen::GoogleAiImagenGenerator;
use crate::adapters::live::openai::DallEGenerator;
use crate::adapters::live::pollinations::PollinationsGenerator;
use crate::adapters::live::vertex::VertexGenerator;
use crate::adapters::recording::image_generator::RecordingImageGenerator;
use crate::adapters::recording::text_generator::RecordingTextGenerator;
use crate::adapters::replaying::image_generator::ReplayingImageGenerator;
use crate::adapters::replaying::text_generator::ReplayingTextGenerator;
use crate::cassette::replayer::CassetteReplayer;
use crate::cassette::recorder::CassetteRecorder;
use crate::config::Credentials;
use crate::error::{CardNewsError, ImageError, PlanError};
use crate::fallback::{FallbackPolicy, Illustrator};
use crate::model::ImageProvider;
use crate::ports::{ImageGenerator, TextGenerator};

/// Environment variable naming a cassette to replay.
pub const REPLAY_ENV: &str = "CARDNEWS_REPLAY";
/// Environment variable that turns on recording when set to `1`.
pub const RECORD_ENV: &str = "CARDNEWS_REC";

fn missing(provider: &str, env_var: &str) -> ImageError {
    ImageError::MissingApiKey { provider: provider.into(), env_var: env_var.into() }
}

/// Build the live adapter for `provider`.
///
/// # Errors
///
/// Returns [`ImageError::MissingApiKey`] if the provider's key (or the Vertex
/// project id) is not configured, and [`ImageError::InvalidArgument`] for a
/// malformed Vertex region or project id.
pub fn live_image_generator(
    provider: ImageProvider,
    credentials: &Credentials,
) -> Result<Arc<dyn ImageGenerator>, ImageError> {
    let generator: Arc<dyn ImageGenerator> = match provider {
        ImageProvider::Gemini => {
            let key = credentials.gemini_key.clone().ok_or_else(|| missing("Gemini", "GEMINI_API_KEY"))?;
            Arc::new(GeminiGenerator::new(key))
        }
        ImageProvider::GoogleAi => {
            let key =
                credentials.gemini_key.clone().ok_or_else(|| missing("Google AI", "GEMINI_API_KEY"))?;
            Arc::new(GoogleAiImagenGenerator::new(key))
        }
        ImageProvider::DallE => {
            let key = credentials.openai_key.clone().ok_or_else(|| missing("OpenAI", "OPENAI_API_KEY"))?;
            Arc::new(DallEGenerator::new(key))
        }
        ImageProvider::Vertex => {
            let key = credentials.vertex_key.clone().ok_or_else(|| missing("Vertex AI", "VERTEX_API_KEY"))?;
            let project_id =
                credentials.project_id.clone().ok_or_else(|| missing("Vertex AI", "VERTEX_PROJECT_ID"))?;
            Arc::new(VertexGenerator::new(
                key,
                project_id,
                credentials.location.clone(),
                credentials.vertex_auth,
            )?)
        }
        ImageProvider::Pollinations => Arc::new(PollinationsGenerator::new()),
    };
    Ok(generator)
}

/// Build the live text adapter for the planner.
///
/// # Errors
///
/// Returns [`PlanError::MissingApiKey`] if no Gemini key is configured.
pub fn live_text_generator(credentials: &Credentials) -> Result<Arc<dyn TextGenerator>, PlanError> {
    let key = credentials.gemini_key.clone().ok_or_else(|| PlanError::MissingApiKey {
        provider: "Gemini".into(),
        env_var: "GEMINI_API_KEY".into(),
    })?;
    Ok(Arc::new(GeminiTextGenerator::new(key)))
}

/// Wrap a primary generator with the timer and, when allowed, the
/// Pollinations fallback. Pollinations never falls back to itself.
#[must_use]
pub fn illustrator(
    primary: Arc<dyn ImageGenerator>,
    provider: ImageProvider,
    policy: FallbackPolicy,
    timeout: Duration,
) -> Illustrator {
    let illustrator = Illustrator::new(primary, timeout);
    if policy == FallbackPolicy::Enabled && provider != ImageProvider::Pollinations {
        illustrator.with_fallback(Arc::new(PollinationsGenerator::new()))
    } else {
        illustrator
    }
}

/// Bundles all port trait objects into a single context.
pub struct ServiceContext {
    /// Image generator port.
    pub generator: Arc<dyn ImageGenerator>,
    /// Text generator port used by the planner.
    pub text: Arc<dyn TextGenerator>,
}

/// Handle to a recording session that must be finished after use.
pub struct RecordingSession {
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingSession {
    /// Finish the recording and write the cassette file to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if adapters still hold the recorder or the file
    /// cannot be written.
    pub fn finish(self) -> Result<PathBuf, String> {
        let recorder = Arc::try_unwrap(self.recorder)
            .map_err(|_| "Recording adapter still has references".to_string())?
            .into_inner()
            .map_err(|e| format!("Recorder lock poisoned: {e}"))?;
        recorder.finish().map_err(|e| format!("Failed to write cassette: {e}"))
    }
}

impl ServiceContext {
    /// Create a live context for the given provider.
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is not configured.
    pub fn live(provider: ImageProvider, credentials: &Credentials) -> Result<Self, CardNewsError> {
        Ok(Self {
            generator: live_image_generator(provider, credentials)?,
            text: live_text_generator(credentials)?,
        })
    }

    /// Create a recording context that wraps the live adapters with a recorder.
    ///
    /// # Errors
    ///
    /// Returns an error if a required key is not configured.
    pub fn recording(
        provider: ImageProvider,
        credentials: &Credentials,
    ) -> Result<(Self, RecordingSession), CardNewsError> {
        let live_ctx = Self::live(provider, credentials)?;

        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let path = PathBuf::from(".cardnews/cassettes").join(&timestamp).join("session.cassette.yaml");
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(
            path,
            format!("{timestamp}-{provider}"),
            get_commit_hash(),
        )));

        let ctx = Self {
            generator: Arc::new(RecordingImageGenerator::new(live_ctx.generator, Arc::clone(&recorder))),
            text: Arc::new(RecordingTextGenerator::new(live_ctx.text, Arc::clone(&recorder))),
        };
        Ok((ctx, RecordingSession { recorder }))
    }

    /// Create a replaying context from a cassette file.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be loaded.
    pub fn replaying(path: &Path) -> Result<Self, CardNewsError> {
        let replayer = CassetteReplayer::load(path)
            .map_err(|e| CardNewsError::Config(format!("Failed to load cassette: {e}")))?;
        tracing::info!(cassette = %path.display(), name = replayer.name(), "replaying recorded session");
        let replayer = Arc::new(Mutex::new(replayer));
        Ok(Self {
            generator: Arc::new(ReplayingImageGenerator::new(Arc::clone(&replayer))),
            text: Arc::new(ReplayingTextGenerator::new(replayer)),
        })
    }

    /// Pick replay, recording or live mode from `CARDNEWS_REPLAY` / `CARDNEWS_REC`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette cannot be loaded or a key is missing.
    pub fn from_env(
        provider: ImageProvider,
        credentials: &Credentials,
    ) -> Result<(Self, Option<RecordingSession>), CardNewsError> {
        if let Some(path) = std::env::var_os(REPLAY_ENV).filter(|p| !p.is_empty()) {
            return Ok((Self::replaying(Path::new(&path))?, None));
        }
        if std::env::var(RECORD_ENV).is_ok_and(|v| v == "1") {
            let (ctx, session) = Self::recording(provider, credentials)?;
            return Ok((ctx, Some(session)));
        }
        Ok((Self::live(provider, credentials)?, None))
    }
}

/// Get the current git commit hash, or "unknown" if unavailable.
fn get_commit_hash() -> String {
    std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map_or_else(|| "unknown".to_string(), |s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_gemini() -> Credentials {
        Credentials { gemini_key: Some("k".into()), ..Credentials::default() }
    }

    #[test]
    fn missing_keys_name_the_env_var() {
        let err = live_image_generator(ImageProvider::DallE, &with_gemini()).err().unwrap();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let creds = Credentials { vertex_key: Some("tok".into()), ..Credentials::default() };
        let err = live_image_generator(ImageProvider::Vertex, &creds).err().unwrap();
        assert!(err.to_string().contains("VERTEX_PROJECT_ID"));

        let err = live_text_generator(&Credentials::default()).err().unwrap();
        assert!(matches!(err, PlanError::MissingApiKey { .. }));
    }

    #[test]
    fn pollinations_needs_no_key() {
        let generator = live_image_generator(ImageProvider::Pollinations, &Credentials::default()).unwrap();
        assert_eq!(generator.name(), "pollinations");
    }

    #[test]
    fn fallback_wiring() {
        let primary = live_image_generator(ImageProvider::Gemini, &with_gemini()).unwrap();
        let timeout = Duration::from_secs(30);
        assert!(illustrator(Arc::clone(&primary), ImageProvider::Gemini, FallbackPolicy::Enabled, timeout)
            .has_fallback());
        assert!(!illustrator(primary, ImageProvider::Gemini, FallbackPolicy::Disabled, timeout).has_fallback());

        let free = live_image_generator(ImageProvider::Pollinations, &Credentials::default()).unwrap();
        assert!(!illustrator(free, ImageProvider::Pollinations, FallbackPolicy::Enabled, timeout).has_fallback());
    }
}
