//! Inference configuration and backend selection.

use std::fmt;
use std::time::Duration;

use crate::error::{InferenceError, InferenceResult};

pub const OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const HF_TOKEN: &str = "HF_TOKEN";

/// Which provider the process talks to. Chosen once at startup.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendKind {
    OpenRouter { api_key: String },
    GoogleAiStudio { api_key: String },
    Local { token: String },
}

impl BackendKind {
    /// Select a backend from environment variables.
    ///
    /// Precedence: `OPENROUTER_API_KEY`, then `GOOGLE_API_KEY`, then `HF_TOKEN`.
    pub fn from_env() -> InferenceResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> InferenceResult<Self> {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(api_key) = present(OPENROUTER_API_KEY) {
            Ok(Self::OpenRouter { api_key })
        } else if let Some(api_key) = present(GOOGLE_API_KEY) {
            Ok(Self::GoogleAiStudio { api_key })
        } else if let Some(token) = present(HF_TOKEN) {
            Ok(Self::Local { token })
        } else {
            Err(InferenceError::NotConfigured(format!(
                "set {}, {} or {}",
                OPENROUTER_API_KEY, GOOGLE_API_KEY, HF_TOKEN
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenRouter { .. } => "openrouter",
            BackendKind::GoogleAiStudio { .. } => "google_ai_studio",
            BackendKind::Local { .. } => "local",
        }
    }
}

// Credentials stay out of logs.
impl fmt::Debug for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendKind").field("kind", &self.as_str()).finish()
    }
}

/// Provider-independent inference settings.
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Per-call timeout
    pub timeout: Duration,
    /// Longest image side sent to a provider, in pixels
    pub max_image_side: u32,
    /// Concurrency override; `None` keeps each provider's default
    pub max_concurrency: Option<usize>,
    /// Token budget for generated text
    pub max_new_tokens: u32,
    pub openrouter_base_url: String,
    pub openrouter_model: String,
    pub google_base_url: String,
    pub google_model: String,
    pub local_base_url: String,
    pub local_model: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_image_side: 768,
            max_concurrency: None,
            max_new_tokens: 100,
            openrouter_base_url: "https://openrouter.ai/api/v1".to_string(),
            openrouter_model: "google/gemma-3n-e4b-it".to_string(),
            google_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            google_model: "gemma-3n-e4b-it".to_string(),
            local_base_url: "http://localhost:8080/v1".to_string(),
            local_model: "google/gemma-3n-e4b-it".to_string(),
        }
    }
}

impl InferenceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeout: Duration::from_secs(
                std::env::var("INFERENCE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            max_image_side: std::env::var("INFERENCE_MAX_IMAGE_SIDE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.max_image_side),
            max_concurrency: std::env::var("INFERENCE_MAX_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok()),
            max_new_tokens: std::env::var("INFERENCE_MAX_NEW_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_new_tokens),
            openrouter_base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or(defaults.openrouter_base_url),
            openrouter_model: std::env::var("OPENROUTER_MODEL").unwrap_or(defaults.openrouter_model),
            google_base_url: std::env::var("GOOGLE_BASE_URL").unwrap_or(defaults.google_base_url),
            google_model: std::env::var("GOOGLE_MODEL").unwrap_or(defaults.google_model),
            local_base_url: std::env::var("LOCAL_MODEL_URL").unwrap_or(defaults.local_base_url),
            local_model: std::env::var("LOCAL_MODEL_NAME").unwrap_or(defaults.local_model),
        }
    }
}
