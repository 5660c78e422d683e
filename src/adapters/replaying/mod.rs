//! Replaying adapters that serve recorded interactions from cassettes.

pub mod image_generator;
pub mod text_generator;

use std::sync::{Arc, Mutex, PoisonError};

use crate::cassette::format::RecordedError;
use crate::cassette::replayer::CassetteReplayer;

/// Retrieve the next recorded output for a given port and method.
pub(crate) fn next_output(
    replayer: &Arc<Mutex<CassetteReplayer>>,
    port: &str,
    method: &str,
) -> Result<serde_json::Value, RecordedError> {
    let mut guard = replayer.lock().unwrap_or_else(PoisonError::into_inner);
    guard
        .next_interaction(port, method)
        .map(|interaction| interaction.output)
        .map_err(|message| RecordedError { status: None, message })
}

/// Deserialize a replayed output as `Result<T, RecordedError>`.
///
/// Older cassettes stored errors as bare strings; those replay without a status.
/// A missing output is a call that never answered and replays as a timeout.
pub(crate) fn replay_result<T: serde::de::DeserializeOwned>(
    output: serde_json::Value,
) -> Result<T, RecordedError> {
    if output.is_null() {
        return Err(RecordedError { status: Some(408), message: "no answer was recorded".into() });
    }
    if let Some(err_val) = output.get("Err").or_else(|| output.get("err")) {
        if let Some(message) = err_val.as_str() {
            return Err(RecordedError { status: None, message: message.to_string() });
        }
        return Err(serde_json::from_value(err_val.clone()).unwrap_or_else(|_| RecordedError {
            status: None,
            message: "replayed error".to_string(),
        }));
    }
    let value = output.get("Ok").or_else(|| output.get("ok")).cloned().unwrap_or(output);
    serde_json::from_value(value).map_err(|e| RecordedError {
        status: None,
        message: format!("Malformed cassette output: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_values_deserialize() {
        let url: String = replay_result(json!({"Ok": "text"})).unwrap();
        assert_eq!(url, "text");
    }

    #[test]
    fn structured_errors_keep_status() {
        let err = replay_result::<String>(json!({"Err": {"status": 401, "message": "bad key"}}))
            .unwrap_err();
        assert_eq!(err, RecordedError { status: Some(401), message: "bad key".into() });
    }

    #[test]
    fn unanswered_calls_replay_as_timeouts() {
        let err = replay_result::<String>(serde_json::Value::Null).unwrap_err();
        assert_eq!(err.status, Some(408));
    }

    #[test]
    fn string_errors_have_no_status() {
        let err = replay_result::<String>(json!({"Err": "boom"})).unwrap_err();
        assert_eq!(err.status, None);
        assert_eq!(err.message, "boom");
    }
}
