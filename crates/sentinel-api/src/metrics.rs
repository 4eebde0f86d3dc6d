//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "sentinel_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "sentinel_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "sentinel_http_requests_in_flight";

    // WebSocket metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "sentinel_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "sentinel_ws_connections_active";
    pub const WS_CONNECTIONS_REJECTED_TOTAL: &str = "sentinel_ws_connections_rejected_total";
    pub const WS_MESSAGES_SENT: &str = "sentinel_ws_messages_sent_total";

    // Side channels
    pub const EMAILS_SENT_TOTAL: &str = "sentinel_emails_sent_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "sentinel_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record WebSocket connection.
pub fn record_ws_connection(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_CONNECTIONS_TOTAL, &labels).increment(1);
}

/// Record a connection refused for a missing or unknown session.
pub fn record_ws_rejected(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_CONNECTIONS_REJECTED_TOTAL, &labels).increment(1);
}

/// Update active WebSocket connections gauge.
pub fn set_ws_active_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Record WebSocket message sent.
pub fn record_ws_message_sent(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_MESSAGES_SENT, &labels).increment(1);
}

/// Record an email delivery attempt.
pub fn record_email(success: bool) {
    let labels = [("success", success.to_string())];
    counter!(names::EMAILS_SENT_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static LANGUAGE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/translations/[^/]+$").expect("valid regex"));

/// Sanitize path for metrics labels.
fn sanitize_path(path: &str) -> String {
    if path.starts_with("/static/") {
        return "/static/:file".to_string();
    }
    LANGUAGE_SEGMENT
        .replace(path, "/translations/:language")
        .into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    // Increment in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    // Decrement in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
