//! Throttled inference scheduling for one live connection.
//!
//! The scheduler wakes on a fixed interval, snapshots the session's trailing
//! window and spawns the backend call into a [`JoinSet`]. Ticks never wait
//! for in-flight calls, so several calls may overlap when the backend is
//! slower than the tick interval. Completions are delivered only while the
//! outbound channel is open.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use sentinel_inference::InferenceBackend;
use sentinel_models::{AnalysisOutcome, DetectionMessage, InferenceWindow, SkipReason};

use crate::config::WatchConfig;
use crate::session::Session;
use crate::stats::{SchedulerStats, StatsSnapshot};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No prompt yet; the backend was not called
    NoPrompt,
    /// A window of `frames` frames was handed to the backend
    Dispatched { frames: usize },
}

/// A finished backend call, tagged with the prompt its window was built from.
struct Completion {
    prompt: String,
    outcome: AnalysisOutcome,
}

/// Per-connection inference scheduler.
pub struct Scheduler<B: InferenceBackend> {
    session: Arc<Session>,
    backend: Arc<B>,
    outbound: mpsc::Sender<DetectionMessage>,
    stats: Arc<SchedulerStats>,
    in_flight: JoinSet<Completion>,
    window_size: usize,
    tick_interval: Duration,
    drop_stale_results: bool,
}

impl<B: InferenceBackend> Scheduler<B> {
    pub fn new(
        session: Arc<Session>,
        backend: Arc<B>,
        outbound: mpsc::Sender<DetectionMessage>,
        config: &WatchConfig,
    ) -> Self {
        Self {
            session,
            backend,
            outbound,
            stats: Arc::new(SchedulerStats::new()),
            in_flight: JoinSet::new(),
            window_size: config.window_size,
            tick_interval: config.tick_interval,
            drop_stale_results: config.drop_stale_results,
        }
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    /// Backend calls dispatched but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Snapshot the trailing window and dispatch it without waiting.
    pub async fn tick(&mut self) -> TickOutcome {
        let Some(window) = self.session.snapshot(self.window_size).await else {
            debug!(session_id = %self.session.id(), "No watch prompt yet, skipping tick");
            self.stats.record_tick_without_prompt();
            return TickOutcome::NoPrompt;
        };

        let frames = window.len();
        trace!(
            session_id = %self.session.id(),
            window = frames,
            in_flight = self.in_flight.len(),
            "Dispatching inference window"
        );
        self.stats.record_dispatch();
        self.dispatch(window);
        TickOutcome::Dispatched { frames }
    }

    fn dispatch(&mut self, window: InferenceWindow) {
        let backend = Arc::clone(&self.backend);
        self.in_flight.spawn(async move {
            let outcome = backend.analyze(&window).await;
            Completion {
                prompt: window.prompt().to_string(),
                outcome,
            }
        });
    }

    /// Wait for the next in-flight call and deliver its result.
    /// Returns `false` when nothing is in flight.
    pub async fn complete_next(&mut self) -> bool {
        match self.in_flight.join_next().await {
            Some(joined) => {
                self.handle_completion(joined).await;
                true
            }
            None => false,
        }
    }

    async fn handle_completion(&mut self, joined: Result<Completion, JoinError>) {
        let completion = match joined {
            Ok(completion) => completion,
            Err(e) => {
                warn!(session_id = %self.session.id(), error = %e, "Inference task did not complete");
                self.stats.record_lost();
                return;
            }
        };

        let Completion { prompt, outcome } = completion;

        if let Some(reason) = outcome.skip {
            self.stats.record_skip(reason);
            if outcome.is_busy() {
                // Progress marker only.
                trace!(session_id = %self.session.id(), "Backend busy");
            } else {
                debug!(session_id = %self.session.id(), reason = reason.as_str(), "No result this tick");
            }
            return;
        }

        let Some(message) = outcome.to_message() else {
            self.stats.record_skip(SkipReason::Empty);
            return;
        };

        if self.outbound.is_closed() {
            self.stats.record_discarded_closed();
            return;
        }

        if self.drop_stale_results
            && self.session.current_prompt().await.as_deref() != Some(prompt.as_str())
        {
            debug!(session_id = %self.session.id(), prompt = %prompt, "Dropping result for a previous prompt");
            self.stats.record_discarded_stale();
            return;
        }

        match self.outbound.try_send(message) {
            Ok(()) => {
                self.stats.record_delivered();
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = %self.session.id(), "Outbound buffer full, dropping result");
                self.stats.record_overflow();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.record_discarded_closed();
            }
        }
    }

    fn discard_completion(&self, joined: Result<Completion, JoinError>) {
        match joined {
            Ok(Completion { outcome, .. }) => match outcome.skip {
                Some(reason) => self.stats.record_skip(reason),
                None => self.stats.record_discarded_closed(),
            },
            Err(_) => self.stats.record_lost(),
        }
    }

    /// Tick until `shutdown` flips to true or its sender is dropped.
    /// In-flight calls are abandoned on exit.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> StatsSnapshot {
        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            session_id = %self.session.id(),
            engine = %self.backend.name(),
            tick_ms = self.tick_interval.as_millis() as u64,
            window = self.window_size,
            "Scheduler started"
        );

        if !*shutdown.borrow() {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                    Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                        self.handle_completion(joined).await;
                    }
                }
            }
        }

        // Results that finished alongside the shutdown signal are never
        // delivered: the connection is being torn down.
        while let Some(joined) = self.in_flight.try_join_next() {
            self.discard_completion(joined);
        }
        let abandoned = self.in_flight.len();
        self.in_flight.abort_all();

        let stats = self.stats.snapshot();
        debug!(
            session_id = %self.session.id(),
            abandoned,
            ticks = stats.ticks,
            delivered = stats.delivered,
            "Scheduler stopped"
        );
        stats
    }

    /// Run on a background task.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = self.stats();
        let session_id = self.session.id().to_string();
        let task = tokio::spawn(self.run(shutdown_rx));

        SchedulerHandle {
            shutdown_tx,
            task,
            stats,
            session_id,
        }
    }
}

/// Owner-side handle of a spawned scheduler. Dropping it without calling
/// [`shutdown`](SchedulerHandle::shutdown) also stops the scheduler.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<StatsSnapshot>,
    stats: Arc<SchedulerStats>,
    session_id: String,
}

impl SchedulerHandle {
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Signal the scheduler and wait up to `grace` for it to stop, aborting
    /// it if the grace period runs out.
    pub async fn shutdown(self, grace: Duration) -> StatsSnapshot {
        let _ = self.shutdown_tx.send(true);

        let mut task = self.task;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                warn!(session_id = %self.session_id, error = %e, "Scheduler task failed");
                self.stats.snapshot()
            }
            Err(_) => {
                warn!(
                    session_id = %self.session_id,
                    grace_ms = grace.as_millis() as u64,
                    "Scheduler did not stop in time, aborting"
                );
                task.abort();
                self.stats.snapshot()
            }
        }
    }
}
