//! Image payload decoding shared by the cloud backends

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::types::ImageError;

/// Pull the base64 image list out of a decoded provider payload
///
/// `field` names the array holding the images. Entries may be bare base64
/// strings (Titan) or objects carrying `b64_json` (OpenAI).
pub fn images_from_payload(
    body: Option<&Value>,
    field: &str,
) -> std::result::Result<Vec<String>, ImageError> {
    let body = match body {
        Some(Value::Null) | None => return Err(ImageError::MissingBody),
        Some(body) => body,
    };

    if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
        let message = match error {
            Value::String(s) => s.clone(),
            other => other
                .get("message")
                .and_then(|m| m.as_str())
                .map(String::from)
                .unwrap_or_else(|| other.to_string()),
        };
        return Err(ImageError::Provider(message));
    }

    let images: Vec<String> = body
        .get(field)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    obj => obj.get("b64_json").and_then(|b| b.as_str()).map(String::from),
                })
                .collect()
        })
        .unwrap_or_default();

    if images.is_empty() {
        return Err(ImageError::NoImages);
    }
    Ok(images)
}

/// Decode the first image of the payload into raw bytes
pub fn decode_single_image(
    body: Option<&Value>,
    field: &str,
) -> std::result::Result<Vec<u8>, ImageError> {
    let images = images_from_payload(body, field)?;
    let first = images.first().ok_or(ImageError::NoImages)?;
    STANDARD
        .decode(first.trim())
        .map_err(|e| ImageError::Decode(e.to_string()))
}
