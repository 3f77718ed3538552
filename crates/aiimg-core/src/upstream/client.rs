use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use std::time::Duration;

use aiimg_types::protocol::openai::{
    ChatCompletionRequest, ChatMessage, ContentPart, ImageUrl, MessageContent, OpenAIRole,
};
use aiimg_types::{Credential, GenerationRequest, ReferenceImage};

use super::response::extract_image;
use super::{GeneratedImage, ImageUpstream, UpstreamFailure};

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;
const REFERER: &str = "https://github.com/aiimg/aiimg";
const TITLE: &str = "aiimg";

/// Chat-completions client for OpenRouter-compatible image models.
pub struct OpenRouterClient {
    http_client: Client,
    timeout: Duration,
}

impl OpenRouterClient {
    /// Create a client with a pre-built `reqwest::Client`.
    pub fn new(http_client: Client, timeout: Duration) -> Self {
        Self { http_client, timeout }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Client::new(), timeout)
    }

    /// Build the multimodal payload for `request`.
    ///
    /// Without reference images the content is a plain string; with images
    /// it is one text part followed by one `image_url` part per image.
    pub fn build_payload(request: &GenerationRequest) -> ChatCompletionRequest {
        let text = format!("Generate an image: {}", request.prompt);

        let content = if request.has_images() {
            let mut parts = vec![ContentPart::Text { text }];
            parts.extend(request.images.iter().map(|image| ContentPart::ImageUrl {
                image_url: ImageUrl { url: to_data_uri(image) },
            }));
            MessageContent::Parts(parts)
        } else {
            MessageContent::Text(text)
        };

        ChatCompletionRequest {
            model: request.model.clone(),
            messages: vec![ChatMessage { role: OpenAIRole::User, content }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

/// Encode a reference image as a `data:image/...;base64,` URI.
pub fn to_data_uri(image: &ReferenceImage) -> String {
    match image {
        ReferenceImage::Encoded { data } if data.starts_with("data:image/") => data.clone(),
        ReferenceImage::Encoded { data } => format!("data:image/png;base64,{}", data),
        ReferenceImage::Bytes { data, mime_type } => {
            let mime = mime_type
                .clone()
                .or_else(|| image::guess_format(data).ok().map(|f| f.to_mime_type().to_string()))
                .unwrap_or_else(|| "image/png".to_string());
            format!(
                "data:{};base64,{}",
                mime,
                base64::engine::general_purpose::STANDARD.encode(data)
            )
        },
    }
}

fn map_transport_error(e: reqwest::Error) -> UpstreamFailure {
    if e.is_timeout() {
        UpstreamFailure::Timeout
    } else if e.is_decode() || e.is_body() {
        UpstreamFailure::Malformed(format!("failed to read response body: {}", e))
    } else {
        UpstreamFailure::Connection(e.to_string())
    }
}

#[async_trait]
impl ImageUpstream for OpenRouterClient {
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<GeneratedImage, UpstreamFailure> {
        let payload = Self::build_payload(request);
        tracing::debug!(
            credential = credential.ordinal(),
            model = %request.model,
            images = request.images.len(),
            "Sending generation request"
        );

        let response = self
            .http_client
            .post(&request.endpoint)
            .bearer_auth(credential.secret())
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(map_transport_error)?;
        tracing::debug!(credential = credential.ordinal(), status = status.as_u16(), "Upstream responded");

        if !status.is_success() {
            return Err(UpstreamFailure::Http { status: status.as_u16(), body });
        }

        extract_image(&body)
    }
}
