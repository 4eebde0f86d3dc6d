//! Session state, frame buffering and inference scheduling.
//!
//! A [`Session`] owns a bounded FIFO of recent frames plus the active watch
//! prompt and language. While a connection is live, a [`Scheduler`] wakes on
//! a fixed interval, snapshots the trailing window of frames and hands it to
//! an [`InferenceBackend`](sentinel_inference::InferenceBackend) without
//! waiting for the previous call. Results are forwarded only while the
//! connection's outbound channel is still open.

pub mod config;
pub mod frame_buffer;
pub mod metrics;
pub mod scheduler;
pub mod session;
pub mod stats;
pub mod store;

pub use config::{ConfigError, ConfigResult, WatchConfig};
pub use frame_buffer::FrameBuffer;
pub use scheduler::{Scheduler, SchedulerHandle, TickOutcome};
pub use session::{ConnectionGuard, IngestOutcome, Session};
pub use stats::{SchedulerStats, StatsSnapshot};
pub use store::{SessionStore, SessionSweeper};
