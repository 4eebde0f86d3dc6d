//! OpenAI-compatible chat completions client.
//!
//! Used by OpenRouter and by local inference servers that expose the same
//! `/chat/completions` surface.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{transport_error, GenerateOptions};
use crate::error::{InferenceError, InferenceResult};
use crate::normalize::mime_type;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Encode a frame as a `data:` URL.
pub fn data_url(frame: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type(frame), STANDARD.encode(frame))
}

/// Thin client over `{base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    model: String,
    token: String,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(
        base_url: &str,
        model: &str,
        token: String,
        timeout: Duration,
    ) -> InferenceResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            token,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Send one user message with images followed by the prompt text.
    pub async fn complete(
        &self,
        images: &[Bytes],
        prompt: &str,
        options: GenerateOptions,
    ) -> InferenceResult<String> {
        let mut content: Vec<ContentPart> = images
            .iter()
            .map(|frame| ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: data_url(frame),
                },
            })
            .collect();
        content.push(ContentPart::Text {
            text: prompt.to_string(),
        });

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens: options.max_tokens,
        };

        let timeout = options.timeout.unwrap_or(self.timeout);
        let url = format!("{}/chat/completions", self.base_url);
        debug!(url = %url, images = images.len(), "Sending chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
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

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::invalid_response(e.to_string()))?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_data_url_uses_detected_mime() {
        let url = data_url(&[0xff, 0xd8, 0xff, 0xe0]);
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn test_complete_sends_images_and_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer tok"))
            .and(body_partial_json(json!({ "model": "m", "max_tokens": 50 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "|40|dog|" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri(), "m", "tok".into(), Duration::from_secs(5)).unwrap();
        let text = client
            .complete(
                &[Bytes::from_static(b"img")],
                "rate it",
                GenerateOptions {
                    max_tokens: Some(50),
                    timeout: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(text, "|40|dog|");
    }

    #[tokio::test]
    async fn test_error_status_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri(), "m", "tok".into(), Duration::from_secs(5)).unwrap();
        let err = client
            .complete(&[], "hi", GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::RequestFailed(ref m) if m.contains("429")));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_secs(3))
                    .set_body_json(json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client =
            ChatClient::new(&server.uri(), "m", "tok".into(), Duration::from_millis(200)).unwrap();
        let err = client
            .complete(&[], "hi", GenerateOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Timeout(_)));
    }
}
