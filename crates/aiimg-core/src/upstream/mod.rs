//! Upstream image API boundary.
//!
//! [`ImageUpstream`] is the seam the key-rotation executor calls through;
//! [`client::OpenRouterClient`] is the HTTP implementation.

pub mod client;
pub mod response;


use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use aiimg_types::protocol::openai::ErrorEnvelope;
use aiimg_types::{Credential, GenerationRequest};

pub use client::OpenRouterClient;

const BODY_SUMMARY_LEN: usize = 200;

/// Decoded image returned by a successful upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Raw image bytes (base64 already decoded)
    pub data: Bytes,
    /// Format announced by the data URI (`png`, `jpeg`, ...), if any
    pub format_hint: Option<String>,
}

/// A single failed upstream call, before classification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// Non-2xx response
    #[error("HTTP {status}: {}", summarize_body(body))]
    Http { status: u16, body: String },

    /// Request exceeded its timeout
    #[error("Request timed out")]
    Timeout,

    /// Connect failure, reset, or other transport error
    #[error("Connection error: {0}")]
    Connection(String),

    /// 2xx response without a usable image
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl UpstreamFailure {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Response body text, empty for transport failures.
    pub fn body(&self) -> &str {
        match self {
            Self::Http { body, .. } => body,
            _ => "",
        }
    }
}

/// `error.message` from a JSON error body, else the truncated raw body.
pub fn summarize_body(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        if let Some(message) = envelope.error.and_then(|e| e.message) {
            return message;
        }
    }
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_SUMMARY_LEN {
        return trimmed.to_string();
    }
    let mut s: String = trimmed.chars().take(BODY_SUMMARY_LEN).collect();
    s.push('…');
    s
}

/// One generation call against one credential.
#[async_trait]
pub trait ImageUpstream: Send + Sync {
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<GeneratedImage, UpstreamFailure>;
}
