//! Provider implementations.
//!
//! Providers only implement [`Generate`]: send images plus a text prompt and
//! return the model's text. Gating, normalization, prompting and parsing are
//! done once here for all of them.

pub mod chat;
pub mod google;
pub mod local;
pub mod openrouter;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use metrics::histogram;
use tracing::{trace, warn};

use sentinel_models::{AnalysisOutcome, InferenceWindow, SkipReason};

use crate::error::{InferenceError, InferenceResult};
use crate::gate::ConcurrencyGate;
use crate::normalize::normalize_frames;
use crate::parse::{parse_score_and_reason, split_translations};
use crate::prompt::{analysis_prompt, summary_prompt, translation_prompt};

pub use google::GoogleAiStudioBackend;
pub use local::LocalModelBackend;
pub use openrouter::OpenRouterBackend;

/// Histogram of provider round-trip time, labelled by engine and outcome.
pub const INFERENCE_DURATION_SECONDS: &str = "sentinel_inference_duration_seconds";

/// Text tasks (translation, summaries) produce longer output than a rating.
const TEXT_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-request generation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    /// Output token budget; `None` leaves it to the provider
    pub max_tokens: Option<u32>,
    /// Overrides the client-wide timeout
    pub timeout: Option<Duration>,
}

/// Transport-level capability every provider implements.
#[async_trait]
pub trait Generate: Send + Sync {
    fn engine_name(&self) -> String;

    fn gate(&self) -> &ConcurrencyGate;

    fn max_image_side(&self) -> u32;

    fn max_new_tokens(&self) -> u32;

    /// Send already-normalized images and a prompt; return the model text.
    async fn generate(
        &self,
        images: &[Bytes],
        prompt: &str,
        options: GenerateOptions,
    ) -> InferenceResult<String>;
}

/// Shared `analyze` implementation.
pub async fn analyze_window<G: Generate + ?Sized>(
    generator: &G,
    window: &InferenceWindow,
) -> AnalysisOutcome {
    let Some(_permit) = generator.gate().try_enter() else {
        trace!(engine = %generator.engine_name(), "Backend busy, skipping window");
        return AnalysisOutcome::skipped(SkipReason::Busy);
    };

    if window.is_empty() {
        return AnalysisOutcome::skipped(SkipReason::Empty);
    }

    let issued_at = Utc::now();
    let started = Instant::now();

    let frames = normalize_frames(window.frames(), generator.max_image_side()).await;
    let prompt = analysis_prompt(window.prompt(), window.language());
    let options = GenerateOptions {
        max_tokens: Some(generator.max_new_tokens()),
        timeout: None,
    };

    let outcome = match generator.generate(&frames, &prompt, options).await {
        Ok(text) if text.trim().is_empty() => AnalysisOutcome::skipped(SkipReason::Empty),
        Ok(text) => match parse_score_and_reason(&text) {
            Some((score, reason)) => AnalysisOutcome::matched(score, reason, issued_at),
            None => AnalysisOutcome::skipped(SkipReason::Malformed),
        },
        Err(e) => {
            warn!(engine = %generator.engine_name(), error = %e, "Inference call failed");
            AnalysisOutcome::skipped(SkipReason::Failed)
        }
    };

    let label = outcome.skip.map(|s| s.as_str()).unwrap_or("matched");
    histogram!(
        INFERENCE_DURATION_SECONDS,
        "engine" => generator.engine_name(),
        "outcome" => label
    )
    .record(started.elapsed().as_secs_f64());

    outcome
}

/// Shared `translate` implementation.
pub async fn translate_texts<G: Generate + ?Sized>(
    generator: &G,
    texts: &[String],
    language: &str,
) -> InferenceResult<Vec<String>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let _permit = generator.gate().try_enter().ok_or(InferenceError::Busy)?;

    let options = GenerateOptions {
        max_tokens: None,
        timeout: Some(TEXT_TASK_TIMEOUT),
    };
    let text = generator
        .generate(&[], &translation_prompt(texts, language), options)
        .await?;
    split_translations(&text, texts.len())
}

/// Shared `summarize` implementation.
pub async fn summarize_events<G: Generate + ?Sized>(
    generator: &G,
    events: &[String],
) -> InferenceResult<String> {
    let _permit = generator.gate().try_enter().ok_or(InferenceError::Busy)?;

    let options = GenerateOptions {
        max_tokens: Some(generator.max_new_tokens()),
        timeout: Some(TEXT_TASK_TIMEOUT),
    };
    let text = generator.generate(&[], &summary_prompt(events), options).await?;
    let summary = text.trim();
    if summary.is_empty() {
        return Err(InferenceError::invalid_response("empty summary"));
    }
    Ok(summary.to_string())
}

/// Map a transport error, surfacing timeouts distinctly.
pub(crate) fn transport_error(e: reqwest::Error, timeout: Duration) -> InferenceError {
    if e.is_timeout() {
        InferenceError::Timeout(timeout.as_secs())
    } else {
        InferenceError::Network(e)
    }
}
