//! Frame channel message types.
//!
//! These messages match the MessagePack objects exchanged with the browser
//! client on `/ws/frames`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Language tag used when the client omits one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Inbound frame message.
///
/// Absent or `nil` fields decode to their defaults, so heartbeats and partial
/// messages still decode and are filtered at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFramePacket")]
pub struct FramePacket {
    /// Natural-language watch prompt (may be empty)
    pub prompt: String,
    /// Encoded image bytes, typically JPEG (may be empty)
    pub frame: Bytes,
    /// ISO language tag for the reason text
    pub language: String,
}

#[derive(Deserialize)]
struct RawFramePacket {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    frame: Option<Bytes>,
    #[serde(default)]
    language: Option<String>,
}

impl From<RawFramePacket> for FramePacket {
    fn from(raw: RawFramePacket) -> Self {
        let language = raw
            .language
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Self {
            prompt: raw.prompt.unwrap_or_default(),
            frame: raw.frame.unwrap_or_default(),
            language,
        }
    }
}

impl FramePacket {
    pub fn new(prompt: impl Into<String>, frame: impl Into<Bytes>, language: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            frame: frame.into(),
            language: language.into(),
        }
    }

    /// Whether the message carries both a prompt and a frame.
    pub fn is_actionable(&self) -> bool {
        !self.prompt.is_empty() && !self.frame.is_empty()
    }
}

/// Outbound detection result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionMessage {
    /// Match confidence (0-100)
    pub confidence: u8,
    /// Short explanation from the model
    pub reason: String,
}

impl DetectionMessage {
    pub fn new(confidence: u8, reason: impl Into<String>) -> Self {
        Self {
            confidence: confidence.min(100),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let packet: FramePacket = serde_json::from_str("{}").unwrap();
        assert_eq!(packet.prompt, "");
        assert!(packet.frame.is_empty());
        assert_eq!(packet.language, DEFAULT_LANGUAGE);
        assert!(!packet.is_actionable());
    }

    #[test]
    fn test_null_and_blank_language_fall_back() {
        let packet: FramePacket =
            serde_json::from_str(r#"{"prompt":"cat","frame":[1,2],"language":null}"#).unwrap();
        assert_eq!(packet.language, "en");
        assert_eq!(packet.frame.as_ref(), &[1, 2]);

        let packet: FramePacket =
            serde_json::from_str(r#"{"prompt":"cat","frame":[1],"language":"  "}"#).unwrap();
        assert_eq!(packet.language, "en");
    }

    #[test]
    fn test_detection_confidence_is_clamped() {
        assert_eq!(DetectionMessage::new(250, "x").confidence, 100);
    }
}
