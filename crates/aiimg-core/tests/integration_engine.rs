#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "integration test: panics are the assertion mechanism")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use aiimg_core::artifact::ArtifactStore;
use aiimg_core::delivery::DeliveredReference;
use aiimg_core::retry::BackoffPolicy;
use aiimg_core::upstream::{GeneratedImage, ImageUpstream, UpstreamFailure};
use aiimg_core::ImageEngine;
use aiimg_types::{Credential, DeliveryConfig, EngineConfig, GenerationError, GenerationRequest, GroupKey};
use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const PNG_1X1: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Answers every call with the same result and counts calls.
struct FixedUpstream {
    result: Result<GeneratedImage, UpstreamFailure>,
    calls: AtomicUsize,
}

impl FixedUpstream {
    fn ok(data: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(GeneratedImage { data: Bytes::from(data), format_hint: Some("png".into()) }),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(failure: UpstreamFailure) -> Arc<Self> {
        Arc::new(Self { result: Err(failure), calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageUpstream for FixedUpstream {
    async fn generate(
        &self,
        _credential: &Credential,
        _request: &GenerationRequest,
    ) -> Result<GeneratedImage, UpstreamFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

fn png() -> Vec<u8> {
    base64::engine::general_purpose::STANDARD.decode(PNG_1X1).expect("valid base64")
}

fn config() -> EngineConfig {
    EngineConfig {
        api_keys: vec!["k1".into(), "k2".into()],
        api_base: Some("https://llm.example.com/".into()),
        model_name: "test/image-model".into(),
        max_retry_attempts: 2,
        calls_per_minute_per_group: 5,
        ..EngineConfig::default()
    }
}

fn engine(config: &EngineConfig, upstream: Arc<FixedUpstream>, dir: &TempDir) -> ImageEngine {
    let store = ArtifactStore::new(dir.path(), Duration::from_secs(15 * 60));
    ImageEngine::new(config, upstream, store).with_backoff(BackoffPolicy::none())
}

fn group() -> GroupKey {
    GroupKey::derive(Some("1001"), None, Some("42"))
}

#[test]
fn test_request_uses_configured_model_and_endpoint() {
    let dir = TempDir::new().expect("tempdir");
    let engine = engine(&config(), FixedUpstream::ok(png()), &dir);
    let request = engine.request("a lighthouse", vec![]);

    assert_eq!(request.prompt, "a lighthouse");
    assert_eq!(request.model, "test/image-model");
    assert_eq!(request.endpoint, "https://llm.example.com/v1/chat/completions");
}

#[tokio::test]
async fn test_generate_saves_and_returns_local_reference() {
    let dir = TempDir::new().expect("tempdir");
    let upstream = FixedUpstream::ok(png());
    let engine = engine(&config(), upstream.clone(), &dir);

    let outcome = engine
        .generate(&group(), &engine.request("a lighthouse", vec![]), &CancellationToken::new())
        .await
        .expect("generation should succeed");

    assert_eq!(upstream.calls(), 1);
    assert!(!outcome.is_degraded());
    assert_eq!(outcome.reference, DeliveredReference::Local(outcome.artifact.path.clone()));
    assert_eq!(std::fs::read(&outcome.artifact.path).expect("artifact"), png());
    assert_eq!(outcome.report.total_attempts(), 1);
}

#[tokio::test]
async fn test_sixth_request_in_window_is_denied_without_upstream_call() {
    let dir = TempDir::new().expect("tempdir");
    let upstream = FixedUpstream::ok(png());
    let engine = engine(&config(), upstream.clone(), &dir);
    let request = engine.request("a lighthouse", vec![]);
    let cancel = CancellationToken::new();

    for _ in 0..5 {
        engine.generate(&group(), &request, &cancel).await.expect("within limit");
    }
    let err = engine.generate(&group(), &request, &cancel).await.expect_err("over limit");

    match err {
        GenerationError::RateLimitExceeded { group: g, limit, retry_after_secs } => {
            assert_eq!(g, "group:1001");
            assert_eq!(limit, 5);
            assert!(retry_after_secs > 0 && retry_after_secs <= 60);
        },
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(upstream.calls(), 5);

    let other_group = GroupKey::derive(Some("2002"), None, None);
    assert!(engine.generate(&other_group, &request, &cancel).await.is_ok());
}

#[tokio::test]
async fn test_exhaustion_surfaces_attempt_summary_and_writes_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let upstream = FixedUpstream::failing(UpstreamFailure::Http { status: 502, body: "bad gateway".into() });
    let engine = engine(&config(), upstream.clone(), &dir);

    let err = engine
        .generate(&group(), &engine.request("a lighthouse", vec![]), &CancellationToken::new())
        .await
        .expect_err("all keys fail");

    assert_eq!(upstream.calls(), 4);
    assert_eq!(err.attempts(), 4);
    assert!(err.user_message().contains("4 attempt(s) across 2 API key(s)"));
    assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
}

#[tokio::test]
async fn test_empty_pool_fails_without_network() {
    let dir = TempDir::new().expect("tempdir");
    let upstream = FixedUpstream::ok(png());
    let config = EngineConfig { api_keys: vec![], ..config() };
    let engine = engine(&config, upstream.clone(), &dir);

    let err = engine
        .generate(&group(), &engine.request("a lighthouse", vec![]), &CancellationToken::new())
        .await
        .expect_err("no keys");

    assert_eq!(upstream.calls(), 0);
    assert!(matches!(err, GenerationError::AllCredentialsExhausted { credentials: 0, .. }));
}

#[tokio::test]
async fn test_non_image_payload_is_decode_error() {
    let dir = TempDir::new().expect("tempdir");
    let upstream = FixedUpstream::ok(b"<html>not an image</html>".to_vec());
    let engine = engine(&config(), upstream.clone(), &dir);

    let err = engine
        .generate(&group(), &engine.request("a lighthouse", vec![]), &CancellationToken::new())
        .await
        .expect_err("payload is not an image");

    assert!(matches!(err, GenerationError::ArtifactDecode { .. }), "{:?}", err);
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_empty_prompt_is_rejected_before_admission() {
    let dir = TempDir::new().expect("tempdir");
    let upstream = FixedUpstream::ok(png());
    let config = EngineConfig { calls_per_minute_per_group: 1, ..config() };
    let engine = engine(&config, upstream.clone(), &dir);
    let cancel = CancellationToken::new();

    let err = engine.generate(&group(), &engine.request("   ", vec![]), &cancel).await.expect_err("empty");
    assert!(matches!(err, GenerationError::InvalidRequest { .. }));

    assert!(engine.generate(&group(), &engine.request("ok", vec![]), &cancel).await.is_ok());
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_failed_remote_delivery_degrades_to_local_reference() {
    let dir = TempDir::new().expect("tempdir");
    let upstream = FixedUpstream::ok(png());
    let config = EngineConfig {
        delivery: DeliveryConfig { host: Some("192.0.2.1".into()), port: Some(9), timeout_secs: 1 },
        ..config()
    };
    let engine = engine(&config, upstream, &dir);

    let outcome = engine
        .generate(&group(), &engine.request("a lighthouse", vec![]), &CancellationToken::new())
        .await
        .expect("delivery failure is not fatal");

    assert!(outcome.is_degraded());
    assert_eq!(outcome.reference, DeliveredReference::Local(outcome.artifact.path.clone()));
    assert!(outcome.artifact.path.exists(), "artifact must be kept");
}

#[tokio::test]
async fn test_save_reclaims_expired_artifacts() {
    let dir = TempDir::new().expect("tempdir");
    let stale = dir.path().join("aiimg_20200101_000000_00000000.png");
    std::fs::write(&stale, png()).expect("write stale");
    std::fs::File::options()
        .write(true)
        .open(&stale)
        .and_then(|f| f.set_modified(SystemTime::now() - Duration::from_secs(16 * 60)))
        .expect("set mtime");

    let engine = engine(&config(), FixedUpstream::ok(png()), &dir);
    let outcome = engine
        .generate(&group(), &engine.request("a lighthouse", vec![]), &CancellationToken::new())
        .await
        .expect("generation should succeed");

    assert!(!stale.exists());
    assert!(outcome.artifact.path.exists());
}

#[tokio::test]
async fn test_cancelled_request_makes_no_calls() {
    let dir = TempDir::new().expect("tempdir");
    let upstream = FixedUpstream::ok(png());
    let engine = engine(&config(), upstream.clone(), &dir);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine
        .generate(&group(), &engine.request("a lighthouse", vec![]), &cancel)
        .await
        .expect_err("cancelled");
    assert_eq!(err, GenerationError::Cancelled);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_cancel_during_delivery_keeps_local_artifact() {
    // Accepts pushes and never answers
    let listener = tokio::net::TcpListener::bind("0.0.0.0:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let dir = TempDir::new().expect("tempdir");
    let config = EngineConfig {
        delivery: DeliveryConfig { host: Some("0.0.0.0".into()), port: Some(port), timeout_secs: 30 },
        ..config()
    };
    let engine = engine(&config, FixedUpstream::ok(png()), &dir);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let outcome = engine
        .generate(&group(), &engine.request("a lighthouse", vec![]), &cancel)
        .await
        .expect("saved artifact survives cancellation");

    assert!(started.elapsed() < Duration::from_secs(5), "delivery ignored cancellation");
    assert_eq!(outcome.degraded.as_deref(), Some("delivery cancelled"));
    assert_eq!(outcome.reference, DeliveredReference::Local(outcome.artifact.path.clone()));
    assert!(outcome.artifact.path.exists());
    silent.abort();
}

#[tokio::test]
async fn test_saved_extension_follows_content_over_hint() {
    let dir = TempDir::new().expect("tempdir");
    let upstream = Arc::new(FixedUpstream {
        result: Ok(GeneratedImage { data: Bytes::from(png()), format_hint: Some("webp".into()) }),
        calls: AtomicUsize::new(0),
    });
    let engine = engine(&config(), upstream, &dir);

    let outcome = engine
        .generate(&group(), &engine.request("a lighthouse", vec![]), &CancellationToken::new())
        .await
        .expect("hint mismatch is not fatal");

    assert_eq!(outcome.artifact.extension(), Some("png"));
}
