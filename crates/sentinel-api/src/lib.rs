//! Axum HTTP/WebSocket server for the sentinel relay.
//!
//! This crate provides:
//! - The `/ws/frames` connection handler feeding sessions and schedulers
//! - Guest authentication and session cookies for the UI
//! - Translation, summary and email side-channel endpoints
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod notifier;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use notifier::{EmailMessage, Notifier, SmtpConfig, SmtpNotifier};
pub use routes::create_router;
pub use state::AppState;
