//! Tests for metric emission.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use postpilot::cache::{CacheBackend, SqliteCache};
use postpilot::config::{RateLimitConfig, RedisConfig};
use postpilot::generation::{GenerationBackend, MockClient};
use postpilot::{BackendSelector, Config, Gateway, Mode, ProcessRequest, RateLimiter, telemetry};

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name and, optionally, a
/// label value.
fn counter_total(snapshot: &SnapshotVec, name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .filter(|(key, _, _, _)| match label {
            Some((k, v)) => key.key().labels().any(|l| l.key() == k && l.value() == v),
            None => true,
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Runs `fut` with `recorder` installed for the current thread.
///
/// `block_in_place` keeps the sync `with_local_recorder` closure on the
/// current thread while `block_on` drives the inner async work.
fn with_recorder<F: std::future::Future>(recorder: &DebuggingRecorder, fut: F) -> F::Output {
    metrics::with_local_recorder(recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    })
}

fn test_gateway(requests: u32) -> Gateway {
    Gateway::builder()
        .rate_limiter(RateLimiter::local(&RateLimitConfig::new(requests, 3600)))
        .cache_backend(
            CacheBackend::Local(SqliteCache::in_memory().unwrap()),
            Duration::from_secs(3600),
        )
        .generation(GenerationBackend::Mock(MockClient::new()))
        .temperature(0.0)
        .build()
        .unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn request_flow_records_admission_cache_and_generation() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let gateway = test_gateway(10);
    let request = ProcessRequest::new("c1", "hello", Mode::Summarize, "Summarize\nTweet: hello");

    with_recorder(&recorder, async {
        gateway.process(&request).await.unwrap();
        gateway.process(&request).await.unwrap();
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_total(&snapshot, telemetry::RATE_LIMIT_DECISIONS_TOTAL, Some(("outcome", "allowed"))),
        2
    );
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL, None), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL, None), 1);
    assert_eq!(
        counter_total(&snapshot, telemetry::GENERATION_REQUESTS_TOTAL, Some(("backend", "mock"))),
        1
    );
    assert!(has_histogram(&snapshot, telemetry::GENERATION_DURATION_SECONDS));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn denial_is_counted_without_touching_the_cache() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let gateway = test_gateway(1);
    let request = ProcessRequest::new("c1", "hello", Mode::Context, "context\nTweet: hello");

    with_recorder(&recorder, async {
        gateway.process(&request).await.unwrap();
        gateway.process(&request).await.unwrap();
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_total(&snapshot, telemetry::RATE_LIMIT_DECISIONS_TOTAL, Some(("outcome", "denied"))),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL, None), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL, None), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn startup_fallback_is_counted_per_component() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.rate_limit.distributed = true;
    config.cache.distributed = true;
    config.cache.path = dir.path().join("metrics.db");
    config.redis = RedisConfig {
        url: "redis://127.0.0.1:1".to_string(),
        probe_timeout_ms: 500,
        ..RedisConfig::default()
    };

    with_recorder(&recorder, async {
        let selector = BackendSelector::new(&config);
        selector.rate_limiter().await;
        selector.cache_backend().await;
    });

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_total(&snapshot, telemetry::BACKEND_FALLBACKS_TOTAL, Some(("component", "rate_limiter"))),
        1
    );
    assert_eq!(
        counter_total(&snapshot, telemetry::BACKEND_FALLBACKS_TOTAL, Some(("component", "cache"))),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let gateway = test_gateway(5);
    let request = ProcessRequest::new("c1", "hi", Mode::Replies, "reply\nTweet: hi");
    gateway.process(&request).await.unwrap();
}
