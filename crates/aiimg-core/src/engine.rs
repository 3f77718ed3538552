//! Generation pipeline: admit → execute → save → deliver.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use aiimg_types::{EngineConfig, GenerationError, GenerationRequest, GroupKey, ReferenceImage};

use crate::artifact::{hint_matches_extension, ArtifactHandle, ArtifactStore};
use crate::delivery::{DeliveredReference, DeliveryClient};
use crate::error::AppResult;
use crate::rate_limit::{Admission, GroupRateLimiter};
use crate::retry::{BackoffPolicy, ExecutionReport, KeyRotationExecutor};
use crate::upstream::{ImageUpstream, OpenRouterClient};

/// Result of one successful pipeline run.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub artifact: ArtifactHandle,
    pub reference: DeliveredReference,
    /// Set when remote delivery failed and `reference` fell back to the local path
    pub degraded: Option<String>,
    pub report: ExecutionReport,
}

impl GenerationOutcome {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Owns the shared state of the pipeline: the per-group limiter, the
/// credential pool (inside the executor), the content directory and the
/// delivery target. One instance serves all concurrent requests.
pub struct ImageEngine {
    model: String,
    endpoint: String,
    limiter: GroupRateLimiter,
    executor: KeyRotationExecutor,
    store: ArtifactStore,
    delivery: DeliveryClient,
}

impl ImageEngine {
    /// Build an engine around an injected upstream and content directory.
    pub fn new(config: &EngineConfig, upstream: Arc<dyn ImageUpstream>, store: ArtifactStore) -> Self {
        let pool = config.credential_pool();
        info!(
            credentials = pool.len(),
            max_retry = config.max_retry_attempts,
            per_minute = config.calls_per_minute_per_group,
            "Image engine configured"
        );
        Self {
            model: config.model_name.clone(),
            endpoint: config.endpoint(),
            limiter: GroupRateLimiter::new(config.calls_per_minute_per_group),
            executor: KeyRotationExecutor::new(upstream, pool, config.max_retry_attempts),
            store,
            delivery: DeliveryClient::new(&config.delivery),
        }
    }

    /// Production wiring: OpenRouter client and the configured content directory.
    pub fn from_config(config: &EngineConfig) -> AppResult<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let http_client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        let upstream = Arc::new(OpenRouterClient::new(http_client, timeout));
        let store = ArtifactStore::from_config(&config.artifacts)?;
        Ok(Self::new(config, upstream, store))
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.executor = self.executor.with_backoff(backoff);
        self
    }

    pub fn limiter(&self) -> &GroupRateLimiter {
        &self.limiter
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Request for `prompt` targeting the configured model and endpoint.
    pub fn request(&self, prompt: impl Into<String>, images: Vec<ReferenceImage>) -> GenerationRequest {
        GenerationRequest::new(prompt, self.model.clone(), self.endpoint.clone()).with_images(images)
    }

    /// Run the whole pipeline for one request from `group`.
    ///
    /// A denied admission returns before any network work. A delivery
    /// failure is not an error: the outcome carries the local path and a
    /// `degraded` note, and the artifact is kept. Cancellation after the
    /// artifact is saved aborts delivery the same way.
    pub async fn generate(
        &self,
        group: &GroupKey,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, GenerationError> {
        if request.prompt.trim().is_empty() && !request.has_images() {
            return Err(GenerationError::InvalidRequest { message: "prompt is empty".to_string() });
        }

        if let admission @ Admission::Denied { .. } = self.limiter.admit(group) {
            let retry_after_secs = admission.retry_after_secs();
            warn!(group = %group, retry_after_secs, "Group rate limit exceeded");
            return Err(GenerationError::RateLimitExceeded {
                group: group.to_string(),
                limit: self.limiter.limit(),
                retry_after_secs,
            });
        }

        info!(group = %group, images = request.images.len(), model = %request.model, "Generating image");
        let execution = self.executor.execute(request, cancel).await?;

        if cancel.is_cancelled() {
            info!(group = %group, "Generation cancelled before the artifact was saved");
            return Err(GenerationError::Cancelled);
        }

        let artifact = self.store.save(&execution.image.data).await?;
        if let (Some(hint), Some(extension)) = (execution.image.format_hint.as_deref(), artifact.extension()) {
            if !hint_matches_extension(hint, extension) {
                warn!(artifact = %artifact.id, hint, extension, "Upstream format hint disagrees with image content");
            } else {
                debug!(artifact = %artifact.id, extension, "Upstream format hint confirmed");
            }
        }
        self.store.cleanup(SystemTime::now()).await;

        let delivery = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err("delivery cancelled".to_string()),
            result = self.delivery.deliver(&artifact) => result.map_err(|e| e.to_string()),
        };
        let (reference, degraded) = match delivery {
            Ok(reference) => (reference, None),
            Err(reason) => {
                warn!(artifact = %artifact.id, "Delivery failed, falling back to local path: {}", reason);
                (DeliveredReference::Local(artifact.path.clone()), Some(reason))
            },
        };

        info!(
            group = %group,
            artifact = %artifact.id,
            attempts = execution.report.total_attempts(),
            elapsed_ms = execution.report.elapsed.as_millis() as u64,
            "Generation finished"
        );

        Ok(GenerationOutcome { artifact, reference, degraded, report: execution.report })
    }
}
