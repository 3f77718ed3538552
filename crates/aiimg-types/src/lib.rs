//! # aiimg Types
//!
//! Core types, models, and error definitions for aiimg.
//!
//! - **`error`** - Typed error hierarchy for generation, delivery and configuration
//! - **`models`** - Domain models (credentials, requests, group keys, config)
//! - **`protocol`** - OpenAI-compatible chat payload types used upstream
//!
//! ## Architecture Role
//!
//! `aiimg-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!     aiimg-types (this crate)
//!            │
//!            ▼
//!       aiimg-core
//!            │
//!            ▼
//!      aiimg-server
//! ```

pub mod error;
pub mod models;
pub mod protocol;

// Re-export error types for convenience
pub use error::{ConfigError, DeliveryError, GenerationError, TypedError};

// Re-export core model types
pub use models::{
    ArtifactConfig, Credential, CredentialPool, DeliveryConfig, EngineConfig, GenerationRequest,
    GroupKey, ReferenceImage,
};
