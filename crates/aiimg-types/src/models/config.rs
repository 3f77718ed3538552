//! Engine configuration model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use super::credential::CredentialPool;
use crate::error::ConfigError;

/// Default upstream model.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash-image-preview:free";

/// Default chat-completions endpoint used when no `api_base` is configured.
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

// ============================================================================
// Delivery Configuration
// ============================================================================

/// Where generated artifacts are pushed when the consumer runs on another host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct DeliveryConfig {
    /// Receiver host; `None` or a loopback address means same-host delivery
    #[serde(default)]
    pub host: Option<String>,
    /// Receiver port
    #[serde(default)]
    pub port: Option<u16>,
    /// Connect + transfer timeout
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_delivery_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self { host: None, port: None, timeout_secs: default_delivery_timeout_secs() }
    }
}

fn default_delivery_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Artifact Configuration
// ============================================================================

/// Local content area for generated images.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct ArtifactConfig {
    /// Content directory; defaults to `<data dir>/images`
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Age after which artifacts are removed by cleanup
    #[validate(range(min = 1))]
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self { dir: None, retention_secs: default_retention_secs() }
    }
}

fn default_retention_secs() -> u64 {
    15 * 60
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Top-level configuration. All fields are load-time inputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct EngineConfig {
    /// Ordered credential pool
    #[serde(default)]
    pub api_keys: Vec<String>,
    /// Legacy single-key field, used only when `api_keys` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API base; `/v1/chat/completions` is appended
    #[serde(default)]
    pub api_base: Option<String>,
    #[validate(length(min = 1))]
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Attempts per credential before rotating
    #[validate(range(min = 1, max = 20))]
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    /// Per-request upstream timeout
    #[validate(range(min = 1, max = 600))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Admissions per group per minute; 0 disables the limit
    #[serde(default = "default_calls_per_minute")]
    pub calls_per_minute_per_group: u32,
    #[validate(nested)]
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[validate(nested)]
    #[serde(default)]
    pub artifacts: ArtifactConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            api_key: None,
            api_base: None,
            model_name: default_model_name(),
            max_retry_attempts: default_max_retry_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
            calls_per_minute_per_group: default_calls_per_minute(),
            delivery: DeliveryConfig::default(),
            artifacts: ArtifactConfig::default(),
        }
    }
}

fn default_model_name() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_retry_attempts() -> u32 {
    DEFAULT_MAX_RETRY_ATTEMPTS
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_calls_per_minute() -> u32 {
    5
}

impl EngineConfig {
    /// Effective key list: `api_keys`, or the legacy `api_key` when empty.
    pub fn credential_keys(&self) -> Vec<String> {
        if !self.api_keys.is_empty() {
            return self.api_keys.clone();
        }
        self.api_key.iter().cloned().collect()
    }

    pub fn credential_pool(&self) -> CredentialPool {
        CredentialPool::from_keys(self.credential_keys())
    }

    /// Chat-completions URL derived from `api_base`.
    pub fn endpoint(&self) -> String {
        match self.api_base.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), CHAT_COMPLETIONS_PATH),
            None => DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Run field validation, mapping failures to [`ConfigError`].
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate().map_err(|e| ConfigError::from_validation(&e))?;
        Ok(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.calls_per_minute_per_group, 5);
        assert_eq!(config.artifacts.retention_secs, 900);
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_legacy_single_key_fallback() {
        let config: EngineConfig = serde_json::from_str(r#"{"api_key": "legacy"}"#).unwrap();
        assert_eq!(config.credential_keys(), vec!["legacy".to_string()]);

        let config: EngineConfig =
            serde_json::from_str(r#"{"api_key": "legacy", "api_keys": ["a", "b"]}"#).unwrap();
        assert_eq!(config.credential_pool().len(), 2);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = EngineConfig {
            api_base: Some("https://proxy.example.com/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "https://proxy.example.com/v1/chat/completions");
    }

    #[test]
    fn test_validation_rejects_zero_retries() {
        let config = EngineConfig { max_retry_attempts: 0, ..Default::default() };
        let err = config.validated().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "max_retry_attempts"));
    }
}
