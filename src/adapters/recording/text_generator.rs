//! Recording adapter for the `TextGenerator` port.

use std::sync::{Arc, Mutex};

use super::begin;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::text_generator::{CompleteFuture, TextGenerator, TextRequest};

/// Records planner completions while delegating to an inner implementation.
pub struct RecordingTextGenerator {
    inner: Arc<dyn TextGenerator>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingTextGenerator {
    /// Creates a new recording generator wrapping the given implementation.
    pub fn new(inner: Arc<dyn TextGenerator>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl TextGenerator for RecordingTextGenerator {
    fn complete(&self, request: &TextRequest) -> CompleteFuture<'_> {
        let pending = begin(&self.recorder, "text_generator", "complete", request);
        let request = request.clone();

        Box::pin(async move {
            let result = self.inner.complete(&request).await;
            pending.complete(&result);
            result
        })
    }
}
