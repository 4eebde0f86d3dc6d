//! Inference error types.

use thiserror::Error;

pub type InferenceResult<T> = Result<T, InferenceError>;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("No inference backend configured: {0}")]
    NotConfigured(String),

    #[error("Backend unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Backend busy")]
    Busy,

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl InferenceError {
    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}
