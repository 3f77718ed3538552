//! Generation pipeline errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::AttemptRecord;

/// Terminal errors of one generation request.
///
/// Per-attempt upstream failures (quota, rate limit, transient, fatal) are
/// absorbed by the key-rotation executor and only show up inside the
/// `history` of [`GenerationError::AllCredentialsExhausted`].
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum GenerationError {
    /// Group exceeded its per-minute admission limit; nothing was sent upstream
    #[error("Rate limit exceeded for {group}: {limit}/min, retry after {retry_after_secs}s")]
    RateLimitExceeded { group: String, limit: u32, retry_after_secs: u64 },

    /// Every credential was tried without success
    #[error("All {credentials} credentials exhausted after {} attempts", history.len())]
    AllCredentialsExhausted { credentials: usize, history: Vec<AttemptRecord> },

    /// Upstream returned bytes that are not a recognisable image
    #[error("Artifact decode error: {message}")]
    ArtifactDecode { message: String },

    /// Artifact could not be written to the content directory
    #[error("Artifact storage error: {message}")]
    Storage { message: String },

    /// Request rejected before execution (empty prompt, bad reference image)
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Caller cancelled the request
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Number of upstream attempts made before this error, if any.
    pub fn attempts(&self) -> usize {
        match self {
            Self::AllCredentialsExhausted { history, .. } => history.len(),
            _ => 0,
        }
    }

    /// Human-readable message for the end user. Never contains key material.
    pub fn user_message(&self) -> String {
        match self {
            Self::RateLimitExceeded { limit, retry_after_secs, .. } => format!(
                "Rate limit: this group may generate at most {} images per minute, please retry in {} seconds.",
                limit, retry_after_secs
            ),
            Self::AllCredentialsExhausted { credentials: 0, .. } => {
                "Image generation failed: no API keys are configured.".to_string()
            },
            Self::AllCredentialsExhausted { credentials, history } => format!(
                "Image generation failed after {} attempt(s) across {} API key(s). Please check the API configuration and network connection.",
                history.len(),
                credentials
            ),
            Self::ArtifactDecode { .. } => {
                "Image generation failed: the upstream returned an unreadable image.".to_string()
            },
            Self::Storage { .. } => {
                "Image generation succeeded but the image could not be saved.".to_string()
            },
            Self::InvalidRequest { message } => format!("Invalid request: {}", message),
            Self::Cancelled => "Image generation was cancelled.".to_string(),
        }
    }
}
