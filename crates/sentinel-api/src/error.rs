//! API error types.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use sentinel_inference::InferenceError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Authentication not configured")]
    AuthNotConfigured,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0} not supported")]
    NotImplemented(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Map an inference error, surfacing missing capabilities as 501.
    pub fn from_inference(context: &str, err: InferenceError) -> Self {
        match err {
            InferenceError::Unsupported(_) => Self::NotImplemented(context.to_string()),
            other => Self::Internal(format!("{} failed: {}", context, other)),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::AuthNotConfigured | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse { detail });

        if matches!(self, ApiError::Unauthorized) {
            return (status, [(header::WWW_AUTHENTICATE, "Basic")], body).into_response();
        }
        (status, body).into_response()
    }
}
