//! On-disk cassette format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded session: every port call made during one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cassette {
    /// Human-readable session name.
    pub name: String,
    /// When the session was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Git commit of the recording build, or `"unknown"`.
    pub commit: String,
    /// Interactions in call order.
    pub interactions: Vec<Interaction>,
}

/// One port call and its outcome.
///
/// `output` uses the `{"Ok": value}` / `{"Err": {"status": .., "message": ..}}`
/// convention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Position in call order.
    pub seq: u64,
    /// Port name (e.g., `"image_generator"`).
    pub port: String,
    /// Method name (e.g., `"generate"`).
    pub method: String,
    /// Serialized call input.
    pub input: serde_json::Value,
    /// Serialized call result.
    pub output: serde_json::Value,
}

/// A recorded failure: the provider's HTTP status (when there was one) and
/// the message, enough to rebuild the typed error on replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedError {
    /// Provider HTTP status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Error details or display text.
    pub message: String,
}
