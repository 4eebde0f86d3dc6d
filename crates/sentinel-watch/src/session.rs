//! Per-session watch state.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, trace};

use sentinel_models::{FramePacket, InferenceWindow, SessionId, DEFAULT_LANGUAGE};

use crate::frame_buffer::FrameBuffer;

/// Mutable watch state, guarded by the session lock.
#[derive(Debug, Clone)]
pub struct WatchState {
    pub current_prompt: Option<String>,
    pub language: String,
    pub frames: FrameBuffer,
}

impl WatchState {
    fn new(capacity: usize) -> Self {
        Self {
            current_prompt: None,
            language: DEFAULT_LANGUAGE.to_string(),
            frames: FrameBuffer::new(capacity),
        }
    }
}

/// What `ingest` did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Empty prompt or frame; nothing changed
    Ignored,
    /// Frame appended under the existing prompt
    Appended,
    /// Prompt changed: buffer cleared, then the frame appended
    PromptChanged,
}

/// Server-side state for one browser client.
///
/// The frame buffer, prompt and language are written only by the ingestion
/// path and read by scheduler snapshots.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    username: String,
    created_at: DateTime<Utc>,
    started: Instant,
    /// Milliseconds after `started` of the last activity
    last_seen_ms: AtomicU64,
    connections: Arc<AtomicUsize>,
    state: RwLock<WatchState>,
}

impl Session {
    pub fn new(id: SessionId, username: impl Into<String>, buffer_capacity: usize) -> Self {
        Self {
            id,
            username: username.into(),
            created_at: Utc::now(),
            started: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
            connections: Arc::new(AtomicUsize::new(0)),
            state: RwLock::new(WatchState::new(buffer_capacity)),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Record activity now.
    pub fn touch(&self) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.last_seen_ms.fetch_max(elapsed, Ordering::Relaxed);
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        let last_seen = Duration::from_millis(self.last_seen_ms.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last_seen)
    }

    /// Register a live connection; released when the guard drops.
    pub fn connect(&self) -> ConnectionGuard {
        let previous = self.connections.fetch_add(1, Ordering::SeqCst);
        if previous > 0 {
            // Connections sharing a session are not coordinated.
            debug!(
                session_id = %self.id,
                connections = previous + 1,
                "Additional connection on session"
            );
        }
        self.touch();
        ConnectionGuard {
            connections: Arc::clone(&self.connections),
        }
    }

    pub fn live_connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Apply one inbound packet.
    ///
    /// Empty prompts or frames are heartbeats and change nothing. A prompt
    /// that differs from the current one clears the buffer first. The
    /// language is always last-write-wins.
    pub async fn ingest(&self, packet: FramePacket) -> IngestOutcome {
        if !packet.is_actionable() {
            trace!(session_id = %self.id, "Ignoring non-actionable frame packet");
            return IngestOutcome::Ignored;
        }
        self.touch();

        let mut state = self.state.write().await;
        state.language = packet.language;

        let outcome = if state.current_prompt.as_deref() == Some(packet.prompt.as_str()) {
            IngestOutcome::Appended
        } else {
            debug!(
                session_id = %self.id,
                prompt = %packet.prompt,
                discarded = state.frames.len(),
                "Watch prompt changed, clearing frame buffer"
            );
            state.frames.clear();
            state.current_prompt = Some(packet.prompt);
            IngestOutcome::PromptChanged
        };

        state.frames.push(packet.frame);
        outcome
    }

    /// Snapshot the trailing `window_size` frames with the active prompt and
    /// language. `None` when no prompt is set or nothing is buffered.
    pub async fn snapshot(&self, window_size: usize) -> Option<InferenceWindow> {
        let state = self.state.read().await;
        let prompt = state.current_prompt.as_ref()?;
        if state.frames.is_empty() {
            return None;
        }
        Some(InferenceWindow::new(
            state.frames.window(window_size),
            prompt.clone(),
            state.language.clone(),
        ))
    }

    pub async fn current_prompt(&self) -> Option<String> {
        self.state.read().await.current_prompt.clone()
    }

    pub async fn language(&self) -> String {
        self.state.read().await.language.clone()
    }

    /// Copy of the full watch state.
    pub async fn state(&self) -> WatchState {
        self.state.read().await.clone()
    }
}

/// Keeps a session marked as connected.
#[derive(Debug)]
pub struct ConnectionGuard {
    connections: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn session() -> Session {
        Session::new(SessionId::new(), "guest", 9)
    }

    fn packet(prompt: &str, frame: &'static [u8], language: &str) -> FramePacket {
        FramePacket::new(prompt, Bytes::from_static(frame), language)
    }

    #[tokio::test]
    async fn test_prompt_change_clears_buffer() {
        let session = session();
        assert_eq!(
            session.ingest(packet("cat", b"c1", "en")).await,
            IngestOutcome::PromptChanged
        );
        assert_eq!(
            session.ingest(packet("cat", b"c2", "en")).await,
            IngestOutcome::Appended
        );
        session.ingest(packet("cat", b"c3", "en")).await;

        assert_eq!(
            session.ingest(packet("dog", b"d1", "en")).await,
            IngestOutcome::PromptChanged
        );
        let state = session.state().await;
        assert_eq!(state.frames.len(), 1);
        assert_eq!(state.frames.window(1), vec![Bytes::from_static(b"d1")]);
        assert_eq!(state.current_prompt.as_deref(), Some("dog"));
    }

    #[tokio::test]
    async fn test_language_is_last_write_wins() {
        let session = session();
        session.ingest(packet("cat", b"1", "en")).await;
        session.ingest(packet("cat", b"2", "fr")).await;
        assert_eq!(session.language().await, "fr");

        let window = session.snapshot(6).await.unwrap();
        assert_eq!(window.language(), "fr");
        assert_eq!(window.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_inputs_are_noops() {
        let session = session();
        assert_eq!(
            session.ingest(packet("", b"frame", "de")).await,
            IngestOutcome::Ignored
        );
        assert_eq!(session.ingest(packet("cat", b"", "de")).await, IngestOutcome::Ignored);

        let state = session.state().await;
        assert!(state.current_prompt.is_none());
        assert!(state.frames.is_empty());
        assert_eq!(state.language, "en");
        assert!(session.snapshot(6).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_takes_trailing_window() {
        let session = session();
        for i in 0..10 {
            let frame = FramePacket::new("cat", Bytes::from(i.to_string()), "en");
            session.ingest(frame).await;
        }
        let window = session.snapshot(6).await.unwrap();
        let expected: Vec<Bytes> = (4..10).map(|i| Bytes::from(i.to_string())).collect();
        assert_eq!(window.frames(), expected.as_slice());
        assert_eq!(window.prompt(), "cat");
    }

    #[test]
    fn test_connection_guard_counts() {
        let session = session();
        let first = session.connect();
        let second = session.connect();
        assert_eq!(session.live_connections(), 2);
        drop(first);
        drop(second);
        assert_eq!(session.live_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_resets_on_touch() {
        let session = session();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(session.idle_for() >= Duration::from_secs(30));
        session.touch();
        assert!(session.idle_for() < Duration::from_secs(1));
    }
}
