//! Key-rotation executor.
//!
//! One call walks the pool once, in order. Each credential gets up to
//! `max_retry_per_key` attempts; only transient failures are retried on the
//! same credential (after a backoff), everything else rotates at once.
//!
//! ```text
//! TryingKey(i, n) --ok--------------------------------> Succeeded
//! TryingKey(i, n) --transient, n < max--> TryingKey(i, n+1)   (sleep backoff(n))
//! TryingKey(i, n) --otherwise-----------> Rotating(i)
//! Rotating(i)     --i+1 < len-----------> TryingKey(i+1, 1)
//! Rotating(i)     --last key------------> Exhausted
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use aiimg_types::models::{AttemptRecord, FailureClass};
use aiimg_types::{CredentialPool, GenerationError, GenerationRequest};

use super::backoff::BackoffPolicy;
use super::classifier::classify;
use crate::upstream::{GeneratedImage, ImageUpstream};

/// Executor position within one `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// About to attempt credential `index`, attempt `attempt` (1-based),
    /// after sleeping `backoff`.
    TryingKey { index: usize, attempt: u32, backoff: Duration },
    /// Leaving credential `from`.
    Rotating { from: usize },
    Succeeded { index: usize },
    Exhausted,
}

impl ExecutorState {
    /// Initial state for a pool of `pool_len` credentials.
    pub fn start(pool_len: usize) -> Self {
        if pool_len == 0 {
            Self::Exhausted
        } else {
            Self::TryingKey { index: 0, attempt: 1, backoff: Duration::ZERO }
        }
    }

    /// Transition after attempt `attempt` on `index` failed with `class`.
    pub fn after_failure(
        index: usize,
        attempt: u32,
        class: FailureClass,
        max_retry_per_key: u32,
        backoff: &BackoffPolicy,
    ) -> Self {
        if class.retries_same_key() && attempt < max_retry_per_key {
            Self::TryingKey { index, attempt: attempt + 1, backoff: backoff.delay(attempt) }
        } else {
            Self::Rotating { from: index }
        }
    }

    /// Transition after attempt on `index` produced an image.
    pub fn after_success(index: usize) -> Self {
        Self::Succeeded { index }
    }

    /// Transition out of `Rotating`.
    pub fn after_rotation(from: usize, pool_len: usize) -> Self {
        if from + 1 < pool_len {
            Self::TryingKey { index: from + 1, attempt: 1, backoff: Duration::ZERO }
        } else {
            Self::Exhausted
        }
    }
}

/// Diagnostic summary of one `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    pub credentials: usize,
    /// Failed attempts, in order
    pub history: Vec<AttemptRecord>,
    /// Index of the credential that succeeded
    pub succeeded_with: Option<usize>,
    pub elapsed: Duration,
}

impl ExecutionReport {
    /// Upstream calls made, including the successful one.
    pub fn total_attempts(&self) -> usize {
        self.history.len() + usize::from(self.succeeded_with.is_some())
    }
}

/// Successful execution: the image plus the attempt history.
#[derive(Debug, Clone)]
pub struct Execution {
    pub image: GeneratedImage,
    pub report: ExecutionReport,
}

pub struct KeyRotationExecutor {
    upstream: Arc<dyn ImageUpstream>,
    pool: CredentialPool,
    max_retry_per_key: u32,
    backoff: BackoffPolicy,
}

impl KeyRotationExecutor {
    pub fn new(upstream: Arc<dyn ImageUpstream>, pool: CredentialPool, max_retry_per_key: u32) -> Self {
        Self { upstream, pool, max_retry_per_key: max_retry_per_key.max(1), backoff: BackoffPolicy::default() }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn max_retry_per_key(&self) -> u32 {
        self.max_retry_per_key
    }

    /// Run `request` against the pool until one attempt succeeds or every
    /// credential is spent. Attempts are strictly sequential.
    pub async fn execute(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<Execution, GenerationError> {
        let started = Instant::now();
        let mut history: Vec<AttemptRecord> = Vec::new();
        let mut state = ExecutorState::start(self.pool.len());
        let mut produced: Option<GeneratedImage> = None;

        if self.pool.is_empty() {
            warn!("No API keys configured, skipping upstream call");
        }

        loop {
            state = match state {
                ExecutorState::TryingKey { index, attempt, backoff } => {
                    let Some(credential) = self.pool.get(index) else {
                        break;
                    };

                    if cancel.is_cancelled() {
                        return Err(GenerationError::Cancelled);
                    }
                    if !backoff.is_zero() {
                        info!(
                            credential = credential.ordinal(),
                            "Retry {}/{} in {}s",
                            attempt,
                            self.max_retry_per_key,
                            backoff.as_secs_f32()
                        );
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                            _ = tokio::time::sleep(backoff) => {},
                        }
                    } else if attempt == 1 {
                        info!("Trying API key #{}", credential.ordinal());
                    }

                    let result = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                        r = self.upstream.generate(credential, request) => r,
                    };

                    match result {
                        Ok(image) => {
                            info!(
                                credential = credential.ordinal(),
                                attempt,
                                "API key #{} generated an image",
                                credential.ordinal()
                            );
                            produced = Some(image);
                            ExecutorState::after_success(index)
                        },
                        Err(failure) => {
                            let class = classify(&failure);
                            warn!(
                                credential = credential.ordinal(),
                                attempt,
                                class = %class,
                                "Upstream attempt failed: {}",
                                failure
                            );
                            history.push(AttemptRecord {
                                credential_index: index,
                                attempt,
                                outcome: class,
                                backoff,
                                detail: failure.to_string(),
                            });
                            ExecutorState::after_failure(
                                index,
                                attempt,
                                class,
                                self.max_retry_per_key,
                                &self.backoff,
                            )
                        },
                    }
                },
                ExecutorState::Rotating { from } => {
                    let next = ExecutorState::after_rotation(from, self.pool.len());
                    if matches!(next, ExecutorState::TryingKey { .. }) {
                        debug!("Rotating from API key #{} to #{}", from + 1, from + 2);
                    }
                    next
                },
                ExecutorState::Succeeded { index } => {
                    let Some(image) = produced.take() else {
                        break;
                    };
                    let report = ExecutionReport {
                        credentials: self.pool.len(),
                        history,
                        succeeded_with: Some(index),
                        elapsed: started.elapsed(),
                    };
                    return Ok(Execution { image, report });
                },
                ExecutorState::Exhausted => break,
            };
        }

        warn!(
            attempts = history.len(),
            credentials = self.pool.len(),
            "All API keys and retries exhausted"
        );
        Err(GenerationError::AllCredentialsExhausted { credentials: self.pool.len(), history })
    }
}
