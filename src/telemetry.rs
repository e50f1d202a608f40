//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus,
//! statsd); without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `postpilot_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `backend`: concrete implementation ("local", "redis", "sqlite", "remote", "mock")
//! - `outcome`: "allowed" | "denied" for admission, "ok" | "error" for generation
//! - `component`: "rate_limiter" | "cache" | "generation"

/// Admission decisions taken by the rate limiter.
///
/// Labels: `backend`, `outcome` ("allowed" | "denied").
pub const RATE_LIMIT_DECISIONS_TOTAL: &str = "postpilot_rate_limit_decisions_total";

/// Distributed rate-limit checks that failed open because the store errored.
pub const RATE_LIMIT_FAIL_OPEN_TOTAL: &str = "postpilot_rate_limit_fail_open_total";

/// Total cache hits.
///
/// Labels: `backend`.
pub const CACHE_HITS_TOTAL: &str = "postpilot_cache_hits_total";

/// Total cache misses, including misses caused by backend errors.
///
/// Labels: `backend`.
pub const CACHE_MISSES_TOTAL: &str = "postpilot_cache_misses_total";

/// Total generation calls.
///
/// Labels: `backend`, `outcome` ("ok" | "error").
pub const GENERATION_REQUESTS_TOTAL: &str = "postpilot_generation_requests_total";

/// Generation call duration in seconds.
///
/// Labels: `backend`.
pub const GENERATION_DURATION_SECONDS: &str = "postpilot_generation_duration_seconds";

/// Startup selections that fell back to the local alternative.
///
/// Labels: `component`.
pub const BACKEND_FALLBACKS_TOTAL: &str = "postpilot_backend_fallbacks_total";
