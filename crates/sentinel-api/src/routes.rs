//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::handlers::{
    get_translations, health, index, init, send_email, summarize_watch_logs,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    ClientRateLimiter,
};
use crate::state::AppState;
use crate::ws::ws_frames;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = Arc::new(ClientRateLimiter::new(state.config.rate_limit_rps));

    // Side channels that reach the inference backend or SMTP
    let side_channel_routes = Router::new()
        .route("/init", get(init))
        .route("/translations/:language", get(get_translations))
        .route("/summarize-watch-logs", post(summarize_watch_logs))
        .route("/send-email", post(send_email))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let static_dir = state.config.static_dir.clone();
    let ui_routes = Router::new()
        .route("/", get(index))
        .route_service("/favicon.ico", ServeFile::new(static_dir.join("favicon.ico")))
        .nest_service("/static", ServeDir::new(&static_dir));

    let ws_routes = Router::new().route("/ws/frames", get(ws_frames));

    let health_routes = Router::new().route("/health", get(health));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(ui_routes)
        .merge(side_channel_routes)
        .merge(ws_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
