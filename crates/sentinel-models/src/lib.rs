//! Shared data models for the sentinel relay.
//!
//! This crate provides Serde-serializable types for:
//! - Frame channel messages (browser -> server and back)
//! - The MessagePack codec used on the frame channel
//! - Session identifiers
//! - Inference windows and analysis outcomes

pub mod analysis;
pub mod codec;
pub mod frame;
pub mod session_id;

// Re-export common types
pub use analysis::{AnalysisOutcome, InferenceWindow, SkipReason};
pub use codec::{CodecError, CodecResult};
pub use frame::{DetectionMessage, FramePacket, DEFAULT_LANGUAGE};
pub use session_id::SessionId;
