//! Frame channel WebSocket handler.
//!
//! One connection streams MessagePack frame packets into its session and
//! receives detection results produced by a per-connection scheduler.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum_extra::extract::cookie::CookieJar;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use sentinel_inference::InferenceBackend;
use sentinel_models::{DetectionMessage, FramePacket};
use sentinel_watch::{
    metrics as watch_metrics, IngestOutcome, Scheduler, Session, StatsSnapshot, WatchConfig,
};

use crate::auth::session_id_from_jar;
use crate::metrics;
use crate::state::AppState;

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

/// Configuration for WebSocket backpressure.
const WS_SEND_BUFFER_SIZE: usize = 32;

const ENDPOINT: &str = "frames";

/// WebSocket frames endpoint.
pub async fn ws_frames(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    jar: CookieJar,
) -> impl IntoResponse {
    let session = match session_id_from_jar(&jar) {
        Some(id) => state.sessions.get(&id).await,
        None => None,
    };

    ws.on_upgrade(move |socket| async move {
        match session {
            Some(session) => {
                metrics::record_ws_connection(ENDPOINT);
                let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
                metrics::set_ws_active_connections(count);
                let _active = scopeguard::guard((), |_| {
                    let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
                    metrics::set_ws_active_connections(count);
                });

                handle_frames_socket(socket, state, session).await;
            }
            None => reject_socket(socket).await,
        }
    })
}

/// Close with 1008 when the handshake carried no known session.
async fn reject_socket(mut socket: WebSocket) {
    metrics::record_ws_rejected(ENDPOINT);
    debug!("Rejecting frame socket without a valid session");
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: close_code::POLICY,
            reason: "Invalid session".into(),
        })))
        .await;
}

/// Per-connection totals, logged at teardown.
#[derive(Debug, Default)]
struct ConnectionTotals {
    frames_received: u64,
    frames_ignored: u64,
    undecodable: u64,
    prompt_changes: u64,
}

/// What one frame connection did.
#[derive(Debug)]
struct ConnectionReport {
    totals: ConnectionTotals,
    stats: StatsSnapshot,
}

async fn handle_frames_socket(socket: WebSocket, state: AppState, session: Arc<Session>) {
    let _connection = session.connect();
    let session_id = session.id().clone();
    info!(session_id = %session_id, "Frame socket connected");

    let (ws_sender, receiver) = socket.split();
    let report = serve_frames(
        ws_sender,
        receiver,
        Arc::clone(&session),
        Arc::clone(&state.backend),
        &state.watch,
    )
    .await;

    info!(
        session_id = %session_id,
        frames_received = report.totals.frames_received,
        frames_ignored = report.totals.frames_ignored,
        undecodable = report.totals.undecodable,
        prompt_changes = report.totals.prompt_changes,
        inferences = report.stats.dispatched,
        results_delivered = report.stats.delivered,
        results_discarded = report.stats.discarded_closed,
        busy = report.stats.busy,
        "Frame socket closed"
    );
}

/// Run one connection: ingest inbound packets, write scheduler results out.
///
/// Once the read side ends the writer is stopped before the scheduler is
/// shut down, so no result is written after the peer has gone.
async fn serve_frames<S, R, E, B>(
    sink: S,
    mut stream: R,
    session: Arc<Session>,
    backend: Arc<B>,
    config: &WatchConfig,
) -> ConnectionReport
where
    S: Sink<Message> + Unpin + Send + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
    B: InferenceBackend,
{
    let (tx, mut rx) = mpsc::channel::<DetectionMessage>(WS_SEND_BUFFER_SIZE);

    // Encode and write results; exits when the scheduler drops its sender
    // or the socket stops accepting writes.
    let mut send_task = tokio::spawn(async move {
        let mut sink = sink;
        while let Some(message) = rx.recv().await {
            let bytes = match message.encode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, "Failed to encode detection message");
                    continue;
                }
            };
            if sink.send(Message::Binary(bytes)).await.is_err() {
                break;
            }
            metrics::record_ws_message_sent(ENDPOINT);
        }
        let _ = sink.close().await;
    });

    let scheduler = Scheduler::new(Arc::clone(&session), backend, tx, config).spawn();

    let mut totals = ConnectionTotals::default();
    let mut send_finished = false;

    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Binary(data))) => {
                        totals.frames_received += 1;
                        ingest(&session, &data, &mut totals).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(session_id = %session.id(), error = %e, "Frame socket read failed");
                        break;
                    }
                }
            }
            _ = &mut send_task, if !send_finished => {
                send_finished = true;
                debug!(session_id = %session.id(), "Frame socket stopped accepting writes");
                break;
            }
        }
    }

    // Dropping the receiver closes the outbound channel, so completions from
    // here on are discarded by the scheduler.
    if !send_finished {
        send_task.abort();
        let _ = (&mut send_task).await;
    }

    let stats = scheduler.shutdown(config.shutdown_grace).await;
    ConnectionReport { totals, stats }
}

async fn ingest(session: &Session, data: &[u8], totals: &mut ConnectionTotals) {
    let packet = match FramePacket::decode(data) {
        Ok(packet) => packet,
        Err(e) => {
            trace!(session_id = %session.id(), error = %e, "Dropping undecodable frame packet");
            totals.undecodable += 1;
            watch_metrics::record_frame_received("undecodable");
            return;
        }
    };

    let outcome = session.ingest(packet).await;
    let label = match outcome {
        IngestOutcome::Ignored => {
            totals.frames_ignored += 1;
            "ignored"
        }
        IngestOutcome::Appended => "appended",
        IngestOutcome::PromptChanged => {
            totals.prompt_changes += 1;
            "prompt_changed"
        }
    };
    watch_metrics::record_frame_received(label);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use futures_util::{future, stream};
    use tokio::sync::Notify;

    use sentinel_models::{AnalysisOutcome, InferenceWindow, SessionId};

    type TestSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;
    type TestStream = Pin<Box<dyn Stream<Item = Result<Message, axum::Error>> + Send>>;

    struct InstantBackend;

    #[async_trait]
    impl InferenceBackend for InstantBackend {
        fn name(&self) -> String {
            "instant".to_string()
        }

        async fn analyze(&self, _window: &InferenceWindow) -> AnalysisOutcome {
            AnalysisOutcome::matched(85, "cat visible", Utc::now())
        }
    }

    /// Answers only once `release` is notified.
    struct GatedBackend {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl InferenceBackend for GatedBackend {
        fn name(&self) -> String {
            "gated".to_string()
        }

        async fn analyze(&self, _window: &InferenceWindow) -> AnalysisOutcome {
            self.release.notified().await;
            AnalysisOutcome::matched(85, "cat visible", Utc::now())
        }
    }

    /// Counts writes that landed, and those that landed after the peer closed.
    #[derive(Clone, Default)]
    struct Recorder {
        writes: Arc<AtomicUsize>,
        late_writes: Arc<AtomicUsize>,
        peer_closed: Arc<AtomicBool>,
    }

    impl Recorder {
        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        fn late_writes(&self) -> usize {
            self.late_writes.load(Ordering::SeqCst)
        }
    }

    fn recording_sink(recorder: Recorder, write_time: Duration) -> TestSink {
        Box::pin(futures_util::sink::unfold(
            recorder,
            move |recorder, _message: Message| async move {
                tokio::time::sleep(write_time).await;
                if recorder.peer_closed.load(Ordering::SeqCst) {
                    recorder.late_writes.fetch_add(1, Ordering::SeqCst);
                }
                recorder.writes.fetch_add(1, Ordering::SeqCst);
                Ok::<_, axum::Error>(recorder)
            },
        ))
    }

    /// A client that sends one frame, stays connected for `hold`, then goes away.
    fn client(hold: Duration, on_close: impl FnOnce() + Send + 'static) -> TestStream {
        let frame = FramePacket::new("cat", b"jpeg".to_vec(), "en").encode().unwrap();
        let first = stream::iter(vec![Ok::<_, axum::Error>(Message::Binary(frame))]);
        let hang_up = stream::once(async move {
            tokio::time::sleep(hold).await;
            on_close();
        })
        .filter_map(|()| future::ready(None::<Result<Message, axum::Error>>));
        Box::pin(first.chain(hang_up))
    }

    fn session() -> Arc<Session> {
        Arc::new(Session::new(SessionId::new(), "guest", 9))
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_result_is_written_after_peer_closes() {
        let recorder = Recorder::default();
        let peer_closed = Arc::clone(&recorder.peer_closed);
        let config = WatchConfig {
            tick_interval: Duration::from_millis(100),
            ..Default::default()
        };

        let report = serve_frames(
            recording_sink(recorder.clone(), Duration::from_millis(300)),
            client(Duration::from_secs(2), move || {
                peer_closed.store(true, Ordering::SeqCst)
            }),
            session(),
            Arc::new(InstantBackend),
            &config,
        )
        .await;

        assert_eq!(report.totals.frames_received, 1);
        assert!(recorder.writes() > 0);
        assert_eq!(recorder.late_writes(), 0);
        // Results still queued behind the slow writer were dropped, not flushed.
        assert!(report.stats.delivered > recorder.writes() as u64);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_result_is_discarded_when_peer_closes() {
        let recorder = Recorder::default();
        let release = Arc::new(Notify::new());
        let backend = Arc::new(GatedBackend {
            release: Arc::clone(&release),
        });

        // First tick at 1s dispatches; the call finishes as the client leaves.
        let report = serve_frames(
            recording_sink(recorder.clone(), Duration::ZERO),
            client(Duration::from_millis(1_500), move || release.notify_one()),
            session(),
            backend,
            &WatchConfig::default(),
        )
        .await;

        assert_eq!(report.stats.dispatched, 1);
        assert_eq!(report.stats.discarded_closed, 1);
        assert_eq!(report.stats.delivered, 0);
        assert_eq!(recorder.writes(), 0);
    }
}
