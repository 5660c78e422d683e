//! Error types for planning, illustrating and exporting card news.

use thiserror::Error;

/// Errors raised by image providers and the illustrator.
///
/// Provider failures are classified by HTTP status through
/// [`ImageError::from_status`]; the client-side timer produces
/// [`ImageError::Timeout`], the only variant that never falls back.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The provider rejected the credential (HTTP 401).
    #[error("Image provider authentication failed (401). Check the API key.")]
    Unauthorized {
        /// Raw provider response body.
        details: String,
    },

    /// Billing is disabled or the credential lacks permission (HTTP 403).
    #[error(
        "Billing is not enabled or permission was denied (403). \
         Check that the API is enabled and a billing account is linked."
    )]
    Forbidden {
        /// Raw provider response body.
        details: String,
    },

    /// The project, location or model does not exist (HTTP 404).
    #[error("Resource not found (404). Check the project id, location and model.")]
    NotFound {
        /// Raw provider response body.
        details: String,
    },

    /// The provider rate limit was hit (HTTP 429).
    #[error("Rate limit reached (429). Wait a moment and try again.")]
    RateLimited {
        /// Raw provider response body.
        details: String,
    },

    /// The provider refused the request (HTTP 400), usually the content policy.
    #[error("The request was rejected (400), possibly by the content policy. Try another prompt.")]
    Rejected {
        /// Raw provider response body.
        details: String,
    },

    /// The client-side timer expired before the provider answered.
    #[error("The image service did not answer within {seconds}s. It may be busy; retry later.")]
    Timeout {
        /// The bound that expired, in seconds.
        seconds: u64,
    },

    /// Any other provider response that could not be used.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message or raw body from the API.
        message: String,
    },

    /// A network error occurred.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// No API key configured for the provider.
    #[error("No API key for {provider}. Set {env_var} or run `cardnews settings`.")]
    MissingApiKey {
        /// The provider name.
        provider: String,
        /// The environment variable name.
        env_var: String,
    },

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl ImageError {
    /// Classify a non-success provider response by its status code.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => Self::Rejected { details: body },
            401 => Self::Unauthorized { details: body },
            403 => Self::Forbidden { details: body },
            404 => Self::NotFound { details: body },
            429 => Self::RateLimited { details: body },
            _ => Self::Api { status, message: body },
        }
    }

    /// Whether the free provider may be tried after this error.
    #[must_use]
    pub fn allows_fallback(&self) -> bool {
        !matches!(self, Self::Timeout { .. })
    }

    /// The provider status this error was classified from, if any.
    #[must_use]
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            Self::Rejected { .. } => Some(400),
            Self::Unauthorized { .. } => Some(401),
            Self::Forbidden { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// HTTP status used when this error is returned by the proxy route.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Timeout { .. } => 408,
            Self::InvalidArgument(_) | Self::MissingApiKey { .. } => 400,
            Self::Api { status, .. } if (400..=599).contains(status) => *status,
            Self::Api { .. } | Self::Network(_) | Self::Config(_) => 500,
            other => other.provider_status().unwrap_or(500),
        }
    }

    /// Raw provider diagnostics attached to the error, if any.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { details }
            | Self::Forbidden { details }
            | Self::NotFound { details }
            | Self::RateLimited { details }
            | Self::Rejected { details } => Some(details),
            Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Errors raised while scripting scenes with the text model.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The text model rejected the API key.
    #[error("The API key is not valid. Check it with `cardnews settings`.")]
    InvalidApiKey {
        /// Raw provider response body.
        details: String,
    },

    /// The text model quota is exhausted.
    #[error("The text model quota has been exceeded.")]
    QuotaExceeded {
        /// Raw provider response body.
        details: String,
    },

    /// The model answer was not valid JSON.
    #[error("Failed to parse the planner response: {0}")]
    Parse(String),

    /// The model answer was JSON but not the expected scene array.
    #[error("Planner response has an invalid structure: {0}")]
    InvalidStructure(String),

    /// Any other failure from the text model.
    #[error("Card news planning failed ({status}): {message}")]
    Unknown {
        /// HTTP status code, `0` when not applicable.
        status: u16,
        /// Error message or raw body.
        message: String,
    },

    /// A network error occurred.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// No API key configured for the text model.
    #[error("No API key for {provider}. Set {env_var} or run `cardnews settings`.")]
    MissingApiKey {
        /// The provider name.
        provider: String,
        /// The environment variable name.
        env_var: String,
    },

    /// Invalid topic or scene count.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl PlanError {
    /// Classify a non-success text model response by its status code.
    #[must_use]
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::InvalidApiKey { details: body },
            400 if body.contains("API_KEY_INVALID") => Self::InvalidApiKey { details: body },
            429 => Self::QuotaExceeded { details: body },
            _ => Self::Unknown { status, message: body },
        }
    }

    /// The provider status this error was classified from, if any.
    #[must_use]
    pub fn provider_status(&self) -> Option<u16> {
        match self {
            Self::InvalidApiKey { .. } => Some(401),
            Self::QuotaExceeded { .. } => Some(429),
            Self::Unknown { status, .. } if *status != 0 => Some(*status),
            _ => None,
        }
    }

    /// HTTP status used when this error is returned by the planner route.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidArgument(_) | Self::MissingApiKey { .. } => 400,
            Self::InvalidApiKey { .. } => 401,
            Self::QuotaExceeded { .. } => 429,
            Self::Parse(_) | Self::InvalidStructure(_) => 502,
            Self::Unknown { .. } | Self::Network(_) => 500,
        }
    }

    /// Raw provider diagnostics attached to the error, if any.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        match self {
            Self::InvalidApiKey { details } | Self::QuotaExceeded { details } => Some(details),
            Self::Unknown { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Errors raised while rendering and writing card images.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The card image could not be downloaded or decoded from its URL.
    #[error("Failed to fetch card image: {0}")]
    Fetch(String),

    /// The card image bytes are not a supported image.
    #[error("Failed to decode card image: {0}")]
    Decode(String),

    /// The rendered card could not be encoded.
    #[error("Failed to encode PNG: {0}")]
    Encode(String),

    /// The configured font could not be loaded.
    #[error("Font error: {0}")]
    Font(String),

    /// The ZIP archive could not be built.
    #[error("Failed to build ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every card in a batch export failed.
    #[error("No card could be exported ({failed} failed)")]
    NothingExported {
        /// Number of cards that failed.
        failed: usize,
    },
}

/// Top-level error for the CLI.
#[derive(Debug, Error)]
pub enum CardNewsError {
    /// Image generation failed.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Scene planning failed.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Export failed.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cards manifest could not be read or written.
    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
