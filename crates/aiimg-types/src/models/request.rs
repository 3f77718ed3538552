//! Generation request model.

use serde::{Deserialize, Serialize};

/// A reference image attached to a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceImage {
    /// Raw image bytes; MIME type is sniffed when absent
    Bytes {
        data: Vec<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    /// Already-encoded base64, with or without a `data:image/...` prefix
    Encoded { data: String },
}

/// Immutable per-invocation request handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub images: Vec<ReferenceImage>,
    /// Upstream model identifier
    pub model: String,
    /// Full chat-completions URL
    pub endpoint: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), images: Vec::new(), model: model.into(), endpoint: endpoint.into() }
    }

    pub fn with_images(mut self, images: Vec<ReferenceImage>) -> Self {
        self.images = images;
        self
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }
}
