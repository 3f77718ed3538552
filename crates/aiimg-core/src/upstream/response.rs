//! Image extraction from chat-completion responses.

use base64::Engine as _;
use bytes::Bytes;
use regex::Regex;
use std::sync::OnceLock;

use aiimg_types::protocol::openai::ChatCompletionResponse;

use super::{GeneratedImage, UpstreamFailure};

static INLINE_IMAGE_REGEX: OnceLock<Regex> = OnceLock::new();

fn inline_image_regex() -> &'static Regex {
    INLINE_IMAGE_REGEX.get_or_init(|| {
        Regex::new(r"data:image/([^;]+);base64,([A-Za-z0-9+/=]+)")
            .expect("Inline image regex is valid")
    })
}

/// Split `data:image/<fmt>;base64,<payload>` into `(fmt, payload)`.
pub fn parse_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.strip_prefix("data:image/")?;
    let (header, payload) = rest.split_once(',')?;
    let format = header.split(';').next().filter(|f| !f.is_empty())?;
    if !header.contains("base64") {
        return None;
    }
    Some((format, payload))
}

fn decode(format: &str, payload: &str) -> Result<GeneratedImage, UpstreamFailure> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| UpstreamFailure::Malformed(format!("invalid base64 image: {}", e)))?;
    if data.is_empty() {
        return Err(UpstreamFailure::Malformed("empty image payload".to_string()));
    }
    Ok(GeneratedImage { data: Bytes::from(data), format_hint: Some(format.to_string()) })
}

/// Pull the first image out of a successful response body.
///
/// Looks at `message.images[*].image_url.url` first, then at data URIs
/// embedded in `message.content` (string or part array).
pub fn extract_image(body: &str) -> Result<GeneratedImage, UpstreamFailure> {
    let response: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamFailure::Malformed(format!("unparseable completion: {}", e)))?;

    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| UpstreamFailure::Malformed("no choices in response".to_string()))?;

    let mut last_error = None;
    for (i, image) in message.images.iter().enumerate() {
        let Some(url) = image.image_url.as_ref().map(|u| u.url.as_str()) else {
            continue;
        };
        match parse_data_uri(url) {
            Some((format, payload)) => match decode(format, payload) {
                Ok(img) => {
                    tracing::debug!("Upstream returned {} image(s), using #{}", message.images.len(), i + 1);
                    return Ok(img);
                },
                Err(e) => {
                    tracing::warn!("Failed to decode image {}: {}", i + 1, e);
                    last_error = Some(e);
                },
            },
            None => tracing::debug!("Skipping non-data-URI image {}", i + 1),
        }
    }

    let text = match &message.content {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| {
                p.get("image_url")
                    .and_then(|u| u.get("url"))
                    .or_else(|| p.get("text"))
                    .and_then(|v| v.as_str())
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    };

    if let Some(caps) = inline_image_regex().captures(&text) {
        if let (Some(format), Some(payload)) = (caps.get(1), caps.get(2)) {
            return decode(format.as_str(), payload.as_str());
        }
    }

    Err(last_error.unwrap_or_else(|| {
        UpstreamFailure::Malformed("completion contained no image data".to_string())
    }))
}
