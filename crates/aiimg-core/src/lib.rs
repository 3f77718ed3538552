//! # aiimg Core
//!
//! Resilient request-execution engine for image generation.
//!
//! ```text
//! aiimg-core/src/
//! ├── rate_limit/   # per-group sliding-window admission
//! ├── retry/        # failure classification, backoff, key rotation
//! ├── upstream/     # chat-completions client + image extraction
//! ├── artifact/     # content directory, unique names, age cleanup
//! ├── delivery/     # push protocol (wire codec, client, receiver)
//! ├── engine.rs     # admit → execute → save → deliver
//! └── modules/      # configuration loading
//! ```

#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]

pub mod artifact;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod modules;
pub mod rate_limit;
pub mod retry;
pub mod upstream;
pub mod utils;

// Re-export commonly used types
pub use engine::{GenerationOutcome, ImageEngine};
pub use error::{AppError, AppResult};
