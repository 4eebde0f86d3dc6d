//! API middleware.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn, Span};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics;

/// Client IPs remembered before idle entries are pruned.
const MAX_TRACKED_CLIENTS: usize = 10_000;

const DEFAULT_REQUESTS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(10) {
    Some(rps) => rps,
    None => NonZeroU32::MIN,
};

/// Per-IP request quota for the side-channel endpoints.
pub struct ClientRateLimiter {
    limiter: RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>,
}

impl ClientRateLimiter {
    /// Zero falls back to 10 requests/s.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_REQUESTS_PER_SECOND);
        Self {
            limiter: RateLimiter::keyed(Quota::per_second(rps)),
        }
    }

    /// Take one request from `ip`'s quota.
    pub fn check(&self, ip: IpAddr) -> bool {
        let allowed = self.limiter.check_key(&ip).is_ok();
        if self.limiter.len() > MAX_TRACKED_CLIENTS {
            self.limiter.retain_recent();
            debug!(tracked = self.limiter.len(), "Pruned idle rate limiter entries");
        }
        allowed
    }
}

/// Create CORS layer.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    use axum::http::{header, Method};

    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(Any)
            .max_age(Duration::from_secs(600))
    } else {
        // Credentials cannot be combined with wildcard headers
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .allow_credentials(true)
            .allow_origin(origins)
            .max_age(Duration::from_secs(600))
    }
}

/// Security headers middleware.
/// The camera is allowed for this origin; the UI streams from it.
pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static(
            "accelerometer=(), camera=(self), geolocation=(), gyroscope=(), magnetometer=(), microphone=(), payment=(), usb=()",
        ),
    );
    headers.insert(
        "Cross-Origin-Resource-Policy",
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        "X-Permitted-Cross-Domain-Policies",
        HeaderValue::from_static("none"),
    );

    response
}

/// Propagate or mint `X-Request-ID` and echo it on the response.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let id = match request.headers().get("X-Request-ID").and_then(|v| v.to_str().ok()) {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };
    Span::current().record("request_id", id.as_str());
    request.extensions_mut().insert(id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert("X-Request-ID", value);
    }
    response
}

/// Log completed requests. Health probes and static assets are not logged.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let quiet = path == "/health" || path.starts_with("/static/");
    let started = Instant::now();

    let response = next.run(request).await;

    if !quiet {
        info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
    }
    response
}

/// Reject side-channel requests over the client's quota with 429.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<ClientRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let Some(ip) = client_ip(&request) else {
        return next.run(request).await;
    };
    if limiter.check(ip) {
        return next.run(request).await;
    }

    warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
    metrics::record_rate_limit_hit(request.uri().path());
    let mut response = ApiError::RateLimited.into_response();
    response
        .headers_mut()
        .insert("Retry-After", HeaderValue::from_static("1"));
    response
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer.
fn client_ip(request: &Request<Body>) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("X-Forwarded-For")
        .or_else(|| header_ip("X-Real-IP"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_is_per_ip() {
        let limiter = ClientRateLimiter::new(1);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a));
        assert!(!limiter.check(a));
        assert!(limiter.check(b));
    }

    #[test]
    fn test_zero_rate_uses_default_quota() {
        let limiter = ClientRateLimiter::new(0);
        let ip: IpAddr = "10.0.0.3".parse().unwrap();
        assert!((0..10).all(|_| limiter.check(ip)));
        assert!(!limiter.check(ip));
    }

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let request = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            client_ip(&request),
            Some("203.0.113.7".parse().unwrap())
        );
    }
}
