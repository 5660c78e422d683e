//! Recording adapters that capture interactions to cassettes.

pub mod image_generator;
pub mod text_generator;

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::cassette::format::RecordedError;
use crate::cassette::recorder::CassetteRecorder;
use crate::error::{ImageError, PlanError};

/// Errors that can be written to a cassette without losing their kind.
pub(crate) trait Recordable {
    fn to_recorded(&self) -> RecordedError;
}

impl Recordable for ImageError {
    fn to_recorded(&self) -> RecordedError {
        let status = match self {
            Self::Timeout { .. } => Some(408),
            other => other.provider_status(),
        };
        RecordedError {
            status,
            message: self.details().map_or_else(|| self.to_string(), str::to_string),
        }
    }
}

impl Recordable for PlanError {
    fn to_recorded(&self) -> RecordedError {
        RecordedError {
            status: self.provider_status(),
            message: self.details().map_or_else(|| self.to_string(), str::to_string),
        }
    }
}

/// Status stored for a call its caller gave up on.
const ABANDONED_STATUS: u16 = 408;

/// An interaction opened at call time. Dropping it unfinished means the
/// caller's timer abandoned the call, which is stored as a timeout.
pub(crate) struct Pending {
    recorder: Arc<Mutex<CassetteRecorder>>,
    seq: u64,
    done: bool,
}

impl Pending {
    /// Store a `Result<T, E>` using the Ok/Err JSON convention.
    pub(crate) fn complete<T, E>(mut self, result: &Result<T, E>)
    where
        T: Serialize,
        E: Recordable,
    {
        let output_json = match result {
            Ok(v) => {
                let inner = serde_json::to_value(v).unwrap_or(serde_json::Value::Null);
                serde_json::json!({ "Ok": inner })
            }
            Err(e) => serde_json::json!({ "Err": e.to_recorded() }),
        };
        self.store(output_json);
        self.done = true;
    }

    fn store(&self, output: serde_json::Value) {
        let mut guard = self.recorder.lock().unwrap_or_else(PoisonError::into_inner);
        guard.complete(self.seq, output);
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        tracing::debug!(seq = self.seq, "call abandoned before it answered, recording a timeout");
        let abandoned = RecordedError {
            status: Some(ABANDONED_STATUS),
            message: "abandoned before the provider answered".into(),
        };
        self.store(serde_json::json!({ "Err": abandoned }));
    }
}

/// Open an interaction at call time so concurrent calls keep their call order.
pub(crate) fn begin<I: Serialize>(
    recorder: &Arc<Mutex<CassetteRecorder>>,
    port: &str,
    method: &str,
    input: &I,
) -> Pending {
    let input_json = serde_json::to_value(input).unwrap_or(serde_json::Value::Null);
    let seq = recorder.lock().unwrap_or_else(PoisonError::into_inner).begin(port, method, input_json);
    Pending { recorder: Arc::clone(recorder), seq, done: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_keep_their_status() {
        let recorded = ImageError::from_status(429, "slow down".into()).to_recorded();
        assert_eq!(recorded, RecordedError { status: Some(429), message: "slow down".into() });
    }

    #[test]
    fn timeouts_record_as_408() {
        let recorded = ImageError::Timeout { seconds: 30 }.to_recorded();
        assert_eq!(recorded.status, Some(408));
    }

    #[test]
    fn dropped_call_records_a_timeout() {
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new("unused.yaml", "t", "c")));
        let answered = begin(&recorder, "image_generator", "generate", &"first");
        let abandoned = begin(&recorder, "image_generator", "generate", &"second");
        answered.complete::<_, ImageError>(&Ok("https://example.com/a.png"));
        drop(abandoned);

        let output = |seq: usize| recorder.lock().unwrap().interactions()[seq].output.clone();
        assert_eq!(output(0)["Ok"], "https://example.com/a.png");
        assert_eq!(output(1)["Err"]["status"], 408);
    }

    #[test]
    fn local_errors_have_no_status() {
        let recorded = PlanError::InvalidArgument("topic is empty".into()).to_recorded();
        assert_eq!(recorded.status, None);
        assert!(recorded.message.contains("topic is empty"));
    }
}
