//! Failure classification: decides retry-same-key vs rotate.
//!
//! | Failure | Class |
//! |---|---|
//! | 429 with rate-limit marker | RateLimit |
//! | 429 otherwise, 402, 4xx with quota marker | Quota |
//! | 401, 403, other 4xx | Fatal |
//! | 408, 5xx, timeout, connection, malformed body | Transient |

use crate::upstream::UpstreamFailure;
use aiimg_types::models::FailureClass;

const RATE_LIMIT_MARKERS: &[&str] =
    &["rate limit", "rate-limit", "ratelimit", "per minute", "too many requests"];

const QUOTA_MARKERS: &[&str] = &["quota", "insufficient", "credit", "exhausted"];

fn contains_any(haystack: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| haystack.contains(m))
}

pub fn classify(failure: &UpstreamFailure) -> FailureClass {
    match failure {
        UpstreamFailure::Http { status, body } => classify_status(*status, body),
        UpstreamFailure::Timeout
        | UpstreamFailure::Connection(_)
        | UpstreamFailure::Malformed(_) => FailureClass::Transient,
    }
}

pub fn classify_status(status: u16, body: &str) -> FailureClass {
    let body_lower = body.to_lowercase();
    match status {
        429 if contains_any(&body_lower, RATE_LIMIT_MARKERS) => FailureClass::RateLimit,
        429 | 402 => FailureClass::Quota,
        408 => FailureClass::Transient,
        400..=499 if contains_any(&body_lower, QUOTA_MARKERS) => FailureClass::Quota,
        400..=499 => FailureClass::Fatal,
        _ => FailureClass::Transient,
    }
}
