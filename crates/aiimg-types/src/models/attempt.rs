//! Attempt accounting for the key-rotation executor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Classified outcome of one failed upstream attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Credit/quota exhausted on this key
    Quota,
    /// Upstream throttled this key
    RateLimit,
    /// Network error, timeout, 5xx, malformed body
    Transient,
    /// Auth failure or malformed request; this key will not succeed
    Fatal,
}

impl FailureClass {
    /// Whether the executor abandons the current credential immediately.
    pub fn rotates(self) -> bool {
        matches!(self, Self::Quota | Self::RateLimit | Self::Fatal)
    }

    /// Whether the same credential may be retried after a backoff.
    pub fn retries_same_key(self) -> bool {
        matches!(self, Self::Transient)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Quota => write!(f, "quota"),
            FailureClass::RateLimit => write!(f, "rate_limit"),
            FailureClass::Transient => write!(f, "transient"),
            FailureClass::Fatal => write!(f, "fatal"),
        }
    }
}

/// One failed attempt, kept only for the duration of an execute() call
/// and returned for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Zero-based position of the credential in the pool
    pub credential_index: usize,
    /// 1-based attempt number on that credential
    pub attempt: u32,
    /// Classified failure
    pub outcome: FailureClass,
    /// Delay slept before this attempt
    pub backoff: Duration,
    /// Status or error text, never containing the key
    pub detail: String,
}
