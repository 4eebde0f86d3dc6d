//! MessagePack codec for the frame channel.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::frame::{DetectionMessage, FramePacket};

pub type CodecResult<T> = Result<T, CodecError>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("Encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
}

/// Encode a value as a MessagePack map keyed by field name.
pub fn encode<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Decode a MessagePack value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    Ok(rmp_serde::from_slice(bytes)?)
}

impl FramePacket {
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode(bytes)
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        encode(self)
    }
}

impl DetectionMessage {
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        encode(self)
    }

    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_round_trip() {
        let message = DetectionMessage::new(73, "cat on sofa");
        let bytes = message.encode().unwrap();
        assert_eq!(DetectionMessage::decode(&bytes).unwrap(), message);
    }

    #[test]
    fn test_detection_is_encoded_as_named_map() {
        let bytes = DetectionMessage::new(73, "cat on sofa").encode().unwrap();
        // fixmap with two entries
        assert_eq!(bytes[0], 0x82);
        let value: std::collections::BTreeMap<String, serde_json::Value> =
            rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(value["confidence"], 73);
        assert_eq!(value["reason"], "cat on sofa");
    }

    #[test]
    fn test_frame_packet_decodes_binary_frame() {
        let packet = FramePacket::new("cat", vec![0xff, 0xd8, 0xff], "de");
        let bytes = packet.encode().unwrap();
        let decoded = FramePacket::decode(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_frame_packet_decodes_integer_array_frame() {
        #[derive(Serialize)]
        struct ArrayFrame {
            prompt: &'static str,
            frame: Vec<u8>,
            language: &'static str,
        }
        let bytes = encode(&ArrayFrame {
            prompt: "cat",
            frame: vec![0xff, 0xd8, 0x00, 0x7f],
            language: "fr",
        })
        .unwrap();
        // fixarray marker for the frame field, not bin
        assert!(bytes.windows(2).any(|w| w == [0x94, 0xcc]));

        let decoded = FramePacket::decode(&bytes).unwrap();
        assert_eq!(decoded.frame.as_ref(), &[0xff, 0xd8, 0x00, 0x7f]);
        assert_eq!(decoded.language, "fr");
        assert!(decoded.is_actionable());
    }

    #[test]
    fn test_frame_packet_without_language() {
        #[derive(Serialize)]
        struct Partial {
            prompt: &'static str,
        }
        let bytes = encode(&Partial { prompt: "dog" }).unwrap();
        let decoded = FramePacket::decode(&bytes).unwrap();
        assert_eq!(decoded.prompt, "dog");
        assert_eq!(decoded.language, "en");
        assert!(!decoded.is_actionable());
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        let err = FramePacket::decode(&[0xc1, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
