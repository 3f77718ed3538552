use std::time::Duration;

/// Exponential backoff between retries on the same credential.
///
/// Delay before retry `n` (1-based) is `min(base * 2^n, max)`; with the
/// defaults that is 2s, 4s, 8s, 10s, 10s, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { base: Duration::from_secs(1), max: Duration::from_secs(10) }
    }
}

impl BackoffPolicy {
    /// No delay at all; for tests and local tooling.
    pub fn none() -> Self {
        Self { base: Duration::ZERO, max: Duration::ZERO }
    }

    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }
}
