//! Push-delivery errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while pushing an artifact to a remote receiver.
///
/// None of these delete the artifact: the caller falls back to the local
/// reference and reports degraded delivery.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum DeliveryError {
    /// TCP connect to the receiver failed (refused, unreachable, DNS)
    #[error("Cannot connect to receiver {target}: {message}")]
    ConnectionFailed { target: String, message: String },

    /// Connection dropped or write failed mid-transfer
    #[error("Transmission failed: {message}")]
    Transmission { message: String },

    /// Receiver answered with a rejection status
    #[error("Receiver rejected artifact: {reason}")]
    Rejected { reason: String },

    /// Receiver reply did not follow the push protocol
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Connect or transfer exceeded the configured timeout
    #[error("Delivery timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Local artifact could not be read
    #[error("Artifact read failed: {message}")]
    Io { message: String },

    /// No remote port configured for a non-local host
    #[error("No delivery port configured for {host}")]
    MissingPort { host: String },
}
