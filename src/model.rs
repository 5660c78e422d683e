//! Provider name resolution and per-provider model identifiers.

use std::fmt;

/// Text model that scripts the scenes.
pub const PLANNER_MODEL: &str = "gemini-2.0-flash-exp";

/// Supported image-generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageProvider {
    /// Imagen on Vertex AI (project-scoped).
    Vertex,
    /// Imagen through the Google AI (Generative Language) API.
    GoogleAi,
    /// Gemini multimodal image output.
    Gemini,
    /// `OpenAI` DALL-E 3.
    DallE,
    /// Free, keyless Pollinations service.
    Pollinations,
}

/// Accepted provider names and aliases.
const ALIASES: &[(&str, ImageProvider)] = &[
    ("vertex", ImageProvider::Vertex),
    ("vertex-imagen", ImageProvider::Vertex),
    ("google-ai", ImageProvider::GoogleAi),
    ("imagen", ImageProvider::GoogleAi),
    ("gemini", ImageProvider::Gemini),
    ("nano-banana", ImageProvider::Gemini),
    ("dall-e", ImageProvider::DallE),
    ("dalle", ImageProvider::DallE),
    ("dall-e-3", ImageProvider::DallE),
    ("openai", ImageProvider::DallE),
    ("pollinations", ImageProvider::Pollinations),
    ("free", ImageProvider::Pollinations),
];

impl ImageProvider {
    /// Canonical provider name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::GoogleAi => "google-ai",
            Self::Gemini => "gemini",
            Self::DallE => "dall-e",
            Self::Pollinations => "pollinations",
        }
    }

    /// Model identifier sent to the provider.
    #[must_use]
    pub fn model(self) -> &'static str {
        match self {
            Self::Vertex => "imagen-3.0-generate-001",
            Self::GoogleAi => "imagen-3.0-generate-002",
            Self::Gemini => "gemini-2.0-flash-exp-image-generation",
            Self::DallE => "dall-e-3",
            Self::Pollinations => "flux",
        }
    }

    /// Whether reference images are forwarded to this provider.
    #[must_use]
    pub fn supports_reference_images(self) -> bool {
        matches!(self, Self::Gemini)
    }
}

impl fmt::Display for ImageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolve a provider name or alias.
///
/// # Errors
///
/// Returns an error if the name doesn't match a known provider.
pub fn resolve_provider(name: &str) -> Result<ImageProvider, String> {
    let wanted = name.trim().to_ascii_lowercase();
    ALIASES.iter().find(|(alias, _)| *alias == wanted).map(|&(_, provider)| provider).ok_or_else(
        || {
            format!(
                "Unknown image provider '{name}'. Expected one of: vertex, google-ai, gemini, \
                 dall-e, pollinations."
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_canonical_names() {
        for provider in [
            ImageProvider::Vertex,
            ImageProvider::GoogleAi,
            ImageProvider::Gemini,
            ImageProvider::DallE,
            ImageProvider::Pollinations,
        ] {
            assert_eq!(resolve_provider(provider.name()).unwrap(), provider);
        }
    }

    #[test]
    fn resolve_aliases() {
        assert_eq!(resolve_provider("imagen").unwrap(), ImageProvider::GoogleAi);
        assert_eq!(resolve_provider("DALL-E-3").unwrap(), ImageProvider::DallE);
        assert_eq!(resolve_provider("nano-banana").unwrap(), ImageProvider::Gemini);
        assert_eq!(resolve_provider(" free ").unwrap(), ImageProvider::Pollinations);
    }

    #[test]
    fn resolve_unknown_provider() {
        assert!(resolve_provider("midjourney").is_err());
        assert!(resolve_provider("").is_err());
    }

    #[test]
    fn only_gemini_takes_reference_images() {
        assert!(ImageProvider::Gemini.supports_reference_images());
        assert!(!ImageProvider::Vertex.supports_reference_images());
        assert!(!ImageProvider::Pollinations.supports_reference_images());
    }
}
