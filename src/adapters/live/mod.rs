//! Live adapters that call the real provider APIs.

pub mod gemini;
pub mod gemini_text;
pub mod imagen;
pub mod openai;
pub mod pollinations;
pub mod vertex;

use crate::error::ImageError;

/// Read a provider response, classifying non-success statuses.
pub(crate) async fn read_success_body(response: reqwest::Response) -> Result<String, ImageError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), body = %truncate(&body, 500), "provider error");
        return Err(ImageError::from_status(status.as_u16(), body));
    }
    Ok(body)
}

/// Shorten a response body for error messages without splitting a character.
pub(crate) fn truncate(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Error for a successful response that carried no usable image.
pub(crate) fn no_image(body: &str) -> ImageError {
    ImageError::Api {
        status: 200,
        message: format!("No image in response. Body: {}", truncate(body, 500)),
    }
}

/// Error for a successful response that could not be parsed.
pub(crate) fn unparseable(err: &serde_json::Error) -> ImageError {
    ImageError::Api { status: 200, message: format!("Failed to parse response: {err}") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("카드뉴스", 2), "카드...");
    }

    #[test]
    fn no_image_is_a_fallback_eligible_api_error() {
        let err = no_image("{}");
        assert!(matches!(err, ImageError::Api { status: 200, .. }));
        assert!(err.allows_fallback());
    }
}
