//! Core domain models for aiimg.

mod attempt;
mod config;
mod credential;
mod group;
mod request;

pub use attempt::{AttemptRecord, FailureClass};
pub use config::{
    ArtifactConfig, DeliveryConfig, EngineConfig, DEFAULT_ENDPOINT, DEFAULT_MAX_RETRY_ATTEMPTS,
    DEFAULT_MODEL,
};
pub use credential::{Credential, CredentialPool};
pub use group::GroupKey;
pub use request::{GenerationRequest, ReferenceImage};
