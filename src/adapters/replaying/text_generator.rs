//! Replaying adapter for the `TextGenerator` port.

use std::sync::{Arc, Mutex};

use super::{next_output, replay_result};
use crate::cassette::format::RecordedError;
use crate::cassette::replayer::CassetteReplayer;
use crate::error::PlanError;
use crate::ports::text_generator::{CompleteFuture, TextGenerator, TextRequest};

/// Serves recorded planner completions from a cassette.
pub struct ReplayingTextGenerator {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingTextGenerator {
    /// Create a replaying text generator backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

fn to_plan_error(recorded: RecordedError) -> PlanError {
    match recorded.status {
        Some(status) => PlanError::from_status(status, recorded.message),
        None => PlanError::Unknown { status: 0, message: recorded.message },
    }
}

impl TextGenerator for ReplayingTextGenerator {
    fn complete(&self, _request: &TextRequest) -> CompleteFuture<'_> {
        let output = next_output(&self.replayer, "text_generator", "complete");
        Box::pin(async move { output.and_then(replay_result::<String>).map_err(to_plan_error) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::{Cassette, Interaction};
    use serde_json::json;

    #[tokio::test]
    async fn replays_text_and_typed_errors() {
        let cassette = Cassette {
            name: "t".into(),
            recorded_at: chrono::Utc::now(),
            commit: "c".into(),
            interactions: vec![
                Interaction {
                    seq: 0,
                    port: "text_generator".into(),
                    method: "complete".into(),
                    input: json!({}),
                    output: json!({"Ok": "[]"}),
                },
                Interaction {
                    seq: 1,
                    port: "text_generator".into(),
                    method: "complete".into(),
                    input: json!({}),
                    output: json!({"Err": {"status": 401, "message": "API key not valid"}}),
                },
            ],
        };
        let generator = ReplayingTextGenerator::new(Arc::new(Mutex::new(CassetteReplayer::new(cassette))));
        let request = TextRequest { model: "m".into(), prompt: "p".into() };

        assert_eq!(generator.complete(&request).await.unwrap(), "[]");
        assert!(matches!(generator.complete(&request).await, Err(PlanError::InvalidApiKey { .. })));
    }
}
