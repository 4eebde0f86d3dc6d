//! OpenRouter backend.

use async_trait::async_trait;
use bytes::Bytes;

use sentinel_models::{AnalysisOutcome, InferenceWindow};

use super::chat::ChatClient;
use super::{analyze_window, summarize_events, translate_texts, Generate, GenerateOptions};
use crate::backend::InferenceBackend;
use crate::config::InferenceConfig;
use crate::error::InferenceResult;
use crate::gate::ConcurrencyGate;

/// Hosted models through OpenRouter's chat completions API.
///
/// Unlimited concurrency unless overridden.
pub struct OpenRouterBackend {
    chat: ChatClient,
    gate: ConcurrencyGate,
    max_image_side: u32,
    max_new_tokens: u32,
}

impl OpenRouterBackend {
    pub fn new(api_key: String, config: &InferenceConfig) -> InferenceResult<Self> {
        Ok(Self {
            chat: ChatClient::new(
                &config.openrouter_base_url,
                &config.openrouter_model,
                api_key,
                config.timeout,
            )?,
            gate: ConcurrencyGate::from_override(config.max_concurrency, None),
            max_image_side: config.max_image_side,
            max_new_tokens: config.max_new_tokens,
        })
    }
}

#[async_trait]
impl Generate for OpenRouterBackend {
    fn engine_name(&self) -> String {
        format!("OpenRouter ({})", self.chat.model())
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
impl InferenceBackend for OpenRouterBackend {
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

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_models::SkipReason;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(uri: &str) -> InferenceConfig {
        InferenceConfig {
            openrouter_base_url: uri.to_string(),
            ..Default::default()
        }
    }

    fn reply(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": content } }]
        }))
    }

    fn window() -> InferenceWindow {
        InferenceWindow::new(vec![Bytes::from_static(b"frame")], "a cat", "en")
    }

    #[tokio::test]
    async fn test_analyze_returns_rating() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(reply("|92|A cat is on the sofa|"))
            .mount(&server)
            .await;

        let backend = OpenRouterBackend::new("key".into(), &config(&server.uri())).unwrap();
        let outcome = backend.analyze(&window()).await;
        assert!(outcome.matched);
        assert_eq!(outcome.score, Some(92));
        assert_eq!(outcome.reason.as_deref(), Some("A cat is on the sofa"));
        assert!(backend.gate.limit().is_none());
    }

    #[tokio::test]
    async fn test_provider_error_is_failed_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let backend = OpenRouterBackend::new("key".into(), &config(&server.uri())).unwrap();
        let outcome = backend.analyze(&window()).await;
        assert_eq!(outcome.skip, Some(SkipReason::Failed));
        assert!(outcome.to_message().is_none());
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("I cannot tell."))
            .mount(&server)
            .await;

        let backend = OpenRouterBackend::new("key".into(), &config(&server.uri())).unwrap();
        assert_eq!(
            backend.analyze(&window()).await.skip,
            Some(SkipReason::Malformed)
        );
    }

    #[tokio::test]
    async fn test_translate_preserves_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply("Bonjour|Au revoir"))
            .mount(&server)
            .await;

        let backend = OpenRouterBackend::new("key".into(), &config(&server.uri())).unwrap();
        let texts = vec!["Hello".to_string(), "Goodbye".to_string()];
        assert_eq!(
            backend.translate(&texts, "fr").await.unwrap(),
            vec!["Bonjour".to_string(), "Au revoir".to_string()]
        );
    }
}
