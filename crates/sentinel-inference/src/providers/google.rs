//! Google AI Studio backend (Gemini API `generateContent`).

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sentinel_models::{AnalysisOutcome, InferenceWindow};

use super::{
    analyze_window, summarize_events, transport_error, translate_texts, Generate, GenerateOptions,
};
use crate::backend::InferenceBackend;
use crate::config::InferenceConfig;
use crate::error::{InferenceError, InferenceResult};
use crate::gate::ConcurrencyGate;
use crate::normalize::mime_type;

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Inline { inline_data: InlineData },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Hosted Gemma/Gemini models through Google AI Studio.
pub struct GoogleAiStudioBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    gate: ConcurrencyGate,
    max_image_side: u32,
    max_new_tokens: u32,
}

impl GoogleAiStudioBackend {
    pub fn new(api_key: String, config: &InferenceConfig) -> InferenceResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.google_base_url.trim_end_matches('/').to_string(),
            model: config.google_model.clone(),
            timeout: config.timeout,
            gate: ConcurrencyGate::from_override(config.max_concurrency, None),
            max_image_side: config.max_image_side,
            max_new_tokens: config.max_new_tokens,
        })
    }
}

#[async_trait]
impl Generate for GoogleAiStudioBackend {
    fn engine_name(&self) -> String {
        format!("Google AI Studio ({})", self.model)
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
        let mut parts: Vec<Part> = images
            .iter()
            .map(|frame| Part::Inline {
                inline_data: InlineData {
                    mime_type: mime_type(frame),
                    data: STANDARD.encode(frame),
                },
            })
            .collect();
        parts.push(Part::Text {
            text: prompt.to_string(),
        });

        let request = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: options.max_tokens.map(|max_output_tokens| GenerationConfig {
                max_output_tokens,
            }),
        };

        let timeout = options.timeout.unwrap_or(self.timeout);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(url = %url, images = images.len(), "Sending generateContent");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::request_failed(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::invalid_response(e.to_string()))?;

        Ok(body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl InferenceBackend for GoogleAiStudioBackend {
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
