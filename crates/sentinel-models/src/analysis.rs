//! Inference windows and analysis outcomes.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::frame::DetectionMessage;

/// Immutable snapshot handed to an inference backend.
///
/// Frames are ordered oldest first. The prompt and language are the values
/// that were active when the snapshot was taken.
#[derive(Debug, Clone)]
pub struct InferenceWindow {
    frames: Vec<Bytes>,
    prompt: String,
    language: String,
    taken_at: DateTime<Utc>,
}

impl InferenceWindow {
    pub fn new(frames: Vec<Bytes>, prompt: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            frames,
            prompt: prompt.into(),
            language: language.into(),
            taken_at: Utc::now(),
        }
    }

    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Why a backend call produced nothing to forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Backend at its concurrency limit
    Busy,
    /// Transport error, timeout or provider error
    Failed,
    /// Provider returned no text
    Empty,
    /// Output had neither the delimited format nor a number
    Malformed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Busy => "busy",
            SkipReason::Failed => "failed",
            SkipReason::Empty => "empty",
            SkipReason::Malformed => "malformed",
        }
    }
}

/// Result of one backend call.
///
/// `matched == false` means "do not forward"; it is a normal outcome under
/// load, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub issued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<SkipReason>,
}

impl AnalysisOutcome {
    /// A forwardable result.
    pub fn matched(score: u8, reason: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            matched: true,
            score: Some(score.min(100)),
            reason: Some(reason.into()),
            issued_at,
            skip: None,
        }
    }

    /// A result that must not be forwarded.
    pub fn skipped(reason: SkipReason) -> Self {
        Self {
            matched: false,
            score: None,
            reason: None,
            issued_at: Utc::now(),
            skip: Some(reason),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.skip == Some(SkipReason::Busy)
    }

    /// Outbound message for a forwardable result.
    pub fn to_message(&self) -> Option<DetectionMessage> {
        if !self.matched {
            return None;
        }
        let score = self.score?;
        Some(DetectionMessage::new(
            score,
            self.reason.clone().unwrap_or_default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_outcome_has_no_message() {
        let outcome = AnalysisOutcome::skipped(SkipReason::Busy);
        assert!(outcome.is_busy());
        assert_eq!(outcome.to_message(), None);
    }

    #[test]
    fn test_matched_outcome_becomes_message() {
        let outcome = AnalysisOutcome::matched(85, "cat visible", Utc::now());
        assert_eq!(outcome.to_message(), Some(DetectionMessage::new(85, "cat visible")));
    }
}
