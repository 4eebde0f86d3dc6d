//! Vision inference backends.
//!
//! Every provider implements [`InferenceBackend`]: a window of frames plus a
//! watch prompt goes in, an [`AnalysisOutcome`] comes out. Provider failures,
//! timeouts and malformed model output never surface as errors from
//! `analyze`; they become skipped outcomes.
//!
//! Image normalization, prompt templating and response parsing are shared by
//! all providers; provider modules only deal with transport.

pub mod backend;
pub mod config;
pub mod error;
pub mod gate;
pub mod normalize;
pub mod parse;
pub mod prompt;
pub mod providers;

pub use backend::{Backend, InferenceBackend};
pub use config::{BackendKind, InferenceConfig};
pub use error::{InferenceError, InferenceResult};
pub use gate::{ConcurrencyGate, GatePermit};
pub use providers::{GoogleAiStudioBackend, LocalModelBackend, OpenRouterBackend};

pub use sentinel_models::{AnalysisOutcome, InferenceWindow, SkipReason};
