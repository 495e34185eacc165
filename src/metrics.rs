//! Prometheus metrics collection for studyd.
//!
//! Provides observability via Prometheus metrics exposed on a dedicated
//! HTTP port. Tracks request throughput and latency, review activity,
//! upload pipeline progress, and abuse-protection events.

use axum::{Router, routing::get};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::net::SocketAddr;
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// HTTP surface
// ========================================================================

/// Requests processed, by route, method and status class.
pub static HTTP_REQUESTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Request latency by route.
pub static HTTP_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Requests rejected by the rate limiter.
pub static RATE_LIMITED: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Study activity
// ========================================================================

/// Flashcard reviews by recall grade.
pub static REVIEWS: OnceLock<IntCounterVec> = OnceLock::new();

/// Quiz attempts graded.
pub static QUIZZES_GRADED: OnceLock<IntCounter> = OnceLock::new();

/// Accounts registered.
pub static USERS_REGISTERED: OnceLock<IntCounter> = OnceLock::new();

/// Live (unexpired) sessions, refreshed by the session sweeper.
pub static ACTIVE_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Upload pipeline
// ========================================================================

/// Upload sessions opened.
pub static UPLOADS_STARTED: OnceLock<IntCounter> = OnceLock::new();

/// Upload sessions assembled successfully.
pub static UPLOADS_COMPLETED: OnceLock<IntCounter> = OnceLock::new();

/// Upload sessions aborted by the client or reaped by TTL.
pub static UPLOADS_ABORTED: OnceLock<IntCounter> = OnceLock::new();

/// Chunks received.
pub static UPLOAD_CHUNKS: OnceLock<IntCounter> = OnceLock::new();

/// Chunk bytes received.
pub static UPLOAD_BYTES: OnceLock<IntCounter> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    // Helper macro to register metric
    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(HTTP_REQUESTS, IntCounterVec::new(Opts::new("studyd_http_requests_total", "HTTP requests by route, method and status"), &["route", "method", "status"]));
    register!(HTTP_LATENCY, HistogramVec::new(
        HistogramOpts::new("studyd_http_request_duration_seconds", "HTTP request latency by route")
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["route"]));
    register!(RATE_LIMITED, IntCounter::new("studyd_rate_limited_total", "Requests rejected by rate limiting"));

    register!(REVIEWS, IntCounterVec::new(Opts::new("studyd_reviews_total", "Flashcard reviews by recall grade"), &["quality"]));
    register!(QUIZZES_GRADED, IntCounter::new("studyd_quizzes_graded_total", "Quiz attempts graded"));
    register!(USERS_REGISTERED, IntCounter::new("studyd_users_registered_total", "Accounts registered"));
    register!(ACTIVE_SESSIONS, IntGauge::new("studyd_active_sessions", "Live bearer-token sessions"));

    register!(UPLOADS_STARTED, IntCounter::new("studyd_uploads_started_total", "Upload sessions opened"));
    register!(UPLOADS_COMPLETED, IntCounter::new("studyd_uploads_completed_total", "Upload sessions assembled"));
    register!(UPLOADS_ABORTED, IntCounter::new("studyd_uploads_aborted_total", "Upload sessions aborted or reaped"));
    register!(UPLOAD_CHUNKS, IntCounter::new("studyd_upload_chunks_total", "Upload chunks received"));
    register!(UPLOAD_BYTES, IntCounter::new("studyd_upload_bytes_total", "Upload chunk bytes received"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

/// Record one handled request.
#[inline]
pub fn record_request(route: &str, method: &str, status: u16, duration_secs: f64) {
    if let Some(c) = HTTP_REQUESTS.get() {
        c.with_label_values(&[route, method, &status.to_string()]).inc();
    }
    if let Some(h) = HTTP_LATENCY.get() {
        h.with_label_values(&[route]).observe(duration_secs);
    }
}

/// Record a flashcard review.
#[inline]
pub fn record_review(quality: u8) {
    if let Some(c) = REVIEWS.get() {
        c.with_label_values(&[&quality.to_string()]).inc();
    }
}

/// Record a rate-limited request.
#[inline]
pub fn record_rate_limited() {
    if let Some(c) = RATE_LIMITED.get() {
        c.inc();
    }
}

/// Bump a plain counter if metrics are initialized.
#[inline]
pub fn inc(metric: &OnceLock<IntCounter>) {
    if let Some(c) = metric.get() {
        c.inc();
    }
}

/// Add to a plain counter if metrics are initialized.
#[inline]
pub fn inc_by(metric: &OnceLock<IntCounter>, delta: u64) {
    if let Some(c) = metric.get() {
        c.inc_by(delta);
    }
}

/// Update the live-sessions gauge.
#[inline]
pub fn set_active_sessions(count: i64) {
    if let Some(g) = ACTIVE_SESSIONS.get() {
        g.set(count);
    }
}

// ============================================================================
// Metrics HTTP endpoint
// ============================================================================

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    gather_metrics()
}

/// Run the HTTP server for Prometheus metrics.
///
/// Binds to `0.0.0.0:port` and serves the `/metrics` endpoint.
/// This is a long-running task that should be spawned in the background.
pub async fn run_metrics_server(port: u16) {
    let app = Router::new().route("/metrics", get(metrics_handler));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Prometheus HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("HTTP server error: {}", e);
    }
}
