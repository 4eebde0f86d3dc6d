//! The inference backend contract and the startup-selected backend.

use async_trait::async_trait;
use tracing::info;

use sentinel_models::{AnalysisOutcome, InferenceWindow};

use crate::config::{BackendKind, InferenceConfig};
use crate::error::{InferenceError, InferenceResult};
use crate::providers::{GoogleAiStudioBackend, LocalModelBackend, OpenRouterBackend};

/// A vision-capable model that rates frames against a watch prompt.
///
/// `analyze` must be safe to call concurrently. Calls beyond the backend's
/// concurrency limit return a busy outcome immediately instead of queueing.
#[async_trait]
pub trait InferenceBackend: Send + Sync + 'static {
    /// Human-readable engine description.
    fn name(&self) -> String;

    /// Rate a window of frames. Never fails: problems become skipped outcomes.
    async fn analyze(&self, window: &InferenceWindow) -> AnalysisOutcome;

    /// Translate UI texts into `language`, preserving order.
    async fn translate(&self, _texts: &[String], _language: &str) -> InferenceResult<Vec<String>> {
        Err(InferenceError::Unsupported("translation"))
    }

    /// Condense watch log events into one sentence.
    async fn summarize(&self, _events: &[String]) -> InferenceResult<String> {
        Err(InferenceError::Unsupported("summarization"))
    }
}

/// The provider chosen at startup.
///
/// Dispatch is a static match; the provider never changes for the lifetime
/// of the process.
pub enum Backend {
    OpenRouter(OpenRouterBackend),
    GoogleAiStudio(GoogleAiStudioBackend),
    Local(LocalModelBackend),
}

impl Backend {
    /// Build the backend for `kind`. The local backend must answer its health
    /// probe, otherwise startup fails.
    pub async fn connect(kind: BackendKind, config: &InferenceConfig) -> InferenceResult<Self> {
        let backend = match kind {
            BackendKind::OpenRouter { api_key } => {
                Backend::OpenRouter(OpenRouterBackend::new(api_key, config)?)
            }
            BackendKind::GoogleAiStudio { api_key } => {
                Backend::GoogleAiStudio(GoogleAiStudioBackend::new(api_key, config)?)
            }
            BackendKind::Local { token } => {
                let local = LocalModelBackend::new(token, config)?;
                local.check_health().await?;
                Backend::Local(local)
            }
        };

        info!(engine = %backend.name(), "Inference backend ready");
        Ok(backend)
    }

    /// Select and build the backend from environment variables.
    pub async fn from_env() -> InferenceResult<Self> {
        let kind = BackendKind::from_env()?;
        Self::connect(kind, &InferenceConfig::from_env()).await
    }
}

#[async_trait]
impl InferenceBackend for Backend {
    fn name(&self) -> String {
        match self {
            Backend::OpenRouter(b) => b.name(),
            Backend::GoogleAiStudio(b) => b.name(),
            Backend::Local(b) => b.name(),
        }
    }

    async fn analyze(&self, window: &InferenceWindow) -> AnalysisOutcome {
        match self {
            Backend::OpenRouter(b) => b.analyze(window).await,
            Backend::GoogleAiStudio(b) => b.analyze(window).await,
            Backend::Local(b) => b.analyze(window).await,
        }
    }

    async fn translate(&self, texts: &[String], language: &str) -> InferenceResult<Vec<String>> {
        match self {
            Backend::OpenRouter(b) => b.translate(texts, language).await,
            Backend::GoogleAiStudio(b) => b.translate(texts, language).await,
            Backend::Local(b) => b.translate(texts, language).await,
        }
    }

    async fn summarize(&self, events: &[String]) -> InferenceResult<String> {
        match self {
            Backend::OpenRouter(b) => b.summarize(events).await,
            Backend::GoogleAiStudio(b) => b.summarize(events).await,
            Backend::Local(b) => b.summarize(events).await,
        }
    }
}
