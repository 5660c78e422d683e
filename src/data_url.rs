//! `data:` URL encoding and decoding for inline images.

use base64::Engine;

/// Build a data URL from an already base64-encoded payload.
#[must_use]
pub fn from_base64(mime_type: &str, payload: &str) -> String {
    format!("data:{mime_type};base64,{payload}")
}

/// Build a data URL from raw bytes.
#[cfg(test)]
#[must_use]
pub(crate) fn from_bytes(mime_type: &str, data: &[u8]) -> String {
    from_base64(mime_type, &base64::engine::general_purpose::STANDARD.encode(data))
}

/// Whether the string is an inline data URL rather than a remote URL.
#[must_use]
pub fn is_data_url(url: &str) -> bool {
    url.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Split a base64 data URL into its MIME type and decoded bytes.
///
/// # Errors
///
/// Returns an error if the URL is not a base64 data URL or the payload is not valid base64.
pub fn decode(url: &str) -> Result<(String, Vec<u8>), String> {
    if !is_data_url(url) {
        return Err("not a data URL".to_string());
    }
    let (header, payload) =
        url[5..].split_once(',').ok_or_else(|| "data URL has no payload".to_string())?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| "data URL is not base64-encoded".to_string())?;
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 payload: {e}"))?;
    let mime_type = if mime_type.is_empty() { "application/octet-stream" } else { mime_type };
    Ok((mime_type.to_string(), data))
}
