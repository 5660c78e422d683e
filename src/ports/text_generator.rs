//! Text generator port for the hosted language model that scripts scenes.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// A single-prompt completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRequest {
    /// Model identifier (e.g., `"gemini-2.0-flash-exp"`).
    pub model: String,
    /// The full instruction prompt.
    pub prompt: String,
}

/// Boxed future type returned by [`TextGenerator::complete`].
pub type CompleteFuture<'a> = Pin<Box<dyn Future<Output = Result<String, PlanError>> + Send + 'a>>;

/// Produces raw model text for a prompt.
pub trait TextGenerator: Send + Sync {
    /// Run one completion and return the model's text.
    fn complete(&self, request: &TextRequest) -> CompleteFuture<'_>;
}
