//! Typed error definitions for aiimg.
//!
//! This module provides a structured error hierarchy with specific error types
//! for different domains. All errors are designed to be:
//!
//! - **Serializable** for logs and IPC via serde
//! - **Displayable** for logging via Display trait
//! - **Matchable** for error handling logic via enum variants

mod config;
mod delivery;
mod generation;

pub use config::ConfigError;
pub use delivery::DeliveryError;
pub use generation::GenerationError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type that wraps all domain-specific errors.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "domain", content = "error")]
pub enum TypedError {
    /// Wraps an image generation error
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    /// Wraps an artifact delivery error
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Wraps a configuration error
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
