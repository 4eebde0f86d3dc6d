//! Locally hosted model server.
//!
//! Expects an OpenAI-compatible server (vLLM, TGI, llama.cpp) on the same
//! machine. It runs one request at a time.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{info, warn};

use sentinel_models::{AnalysisOutcome, InferenceWindow};

use super::chat::ChatClient;
use super::{analyze_window, summarize_events, translate_texts, Generate, GenerateOptions};
use crate::backend::InferenceBackend;
use crate::config::InferenceConfig;
use crate::error::{InferenceError, InferenceResult};
use crate::gate::ConcurrencyGate;

/// Concurrent calls a local model server accepts by default.
pub const LOCAL_MAX_CONCURRENCY: usize = 1;

pub struct LocalModelBackend {
    chat: ChatClient,
    gate: ConcurrencyGate,
    max_image_side: u32,
    max_new_tokens: u32,
}

impl LocalModelBackend {
    pub fn new(token: String, config: &InferenceConfig) -> InferenceResult<Self> {
        Ok(Self {
            chat: ChatClient::new(
                &config.local_base_url,
                &config.local_model,
                token,
                config.timeout,
            )?,
            gate: ConcurrencyGate::from_override(
                config.max_concurrency,
                Some(LOCAL_MAX_CONCURRENCY),
            ),
            max_image_side: config.max_image_side,
            max_new_tokens: config.max_new_tokens,
        })
    }

    fn health_url(&self) -> String {
        let base = self.chat.base_url();
        format!("{}/health", base.strip_suffix("/v1").unwrap_or(base))
    }

    /// Probe the model server. Startup aborts if this fails.
    pub async fn check_health(&self) -> InferenceResult<()> {
        let url = self.health_url();
        let response = self
            .chat
            .http()
            .get(&url)
            .bearer_auth(self.chat.token())
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Local model server unreachable");
                InferenceError::ServiceUnavailable(format!("{}: {}", url, e))
            })?;

        if !response.status().is_success() {
            return Err(InferenceError::ServiceUnavailable(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        info!(url = %url, model = %self.chat.model(), "Local model server healthy");
        Ok(())
    }
}

#[async_trait]
impl Generate for LocalModelBackend {
    fn engine_name(&self) -> String {
        format!("Local ({})", self.chat.model())
    }

    fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    fn max_image_side(&self) -> u32 {
        self.max_image_side
    }

    fn max_new_tokens(&self) -> u32 {
        self.max_new_tokens
    }

    async fn generate(
        &self,
        images: &[Bytes],
        prompt: &str,
        options: GenerateOptions,
    ) -> InferenceResult<String> {
        self.chat.complete(images, prompt, options).await
    }
}

#[async_trait]
impl InferenceBackend for LocalModelBackend {
    fn name(&self) -> String {
        self.engine_name()
    }

    async fn analyze(&self, window: &InferenceWindow) -> AnalysisOutcome {
        analyze_window(self, window).await
    }

    async fn translate(&self, texts: &[String], language: &str) -> InferenceResult<Vec<String>> {
        translate_texts(self, texts, language).await
    }

    async fn summarize(&self, events: &[String]) -> InferenceResult<String> {
        summarize_events(self, events).await
    }
}
