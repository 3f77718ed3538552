//! OpenAI ChatCompletions API types (multimodal subset).

use serde::{Deserialize, Serialize};

/// OpenAI message role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRole {
    System,
    User,
    Assistant,
}

/// `image_url` object shared by request parts and response images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multimodal message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Message content: plain text, or a list of parts when images are attached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// OpenAI chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: OpenAIRole,
    pub content: MessageContent,
}

/// Request body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Image attached to an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseImage {
    #[serde(default)]
    pub image_url: Option<ImageUrl>,
}

/// Assistant message in a completion choice.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseMessage {
    /// Usually a string; some providers return part arrays
    #[serde(default)]
    pub content: Option<serde_json::Value>,
    #[serde(default)]
    pub images: Vec<ResponseImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

/// Successful completion body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

/// Error envelope `{ "error": { "message": ..., "code": ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}
