//! Retry and rotation across the credential pool.
//!
//! - [`classifier`] maps a failed call to a [`FailureClass`]
//! - [`backoff`] computes same-credential retry delays
//! - [`executor`] drives the per-request state machine

pub mod backoff;
pub mod classifier;
pub mod executor;


pub use aiimg_types::models::{AttemptRecord, FailureClass};
pub use backoff::BackoffPolicy;
pub use classifier::classify;
pub use executor::{Execution, ExecutionReport, ExecutorState, KeyRotationExecutor};
