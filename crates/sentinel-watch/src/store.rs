//! Process-wide session store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use sentinel_models::SessionId;

use crate::metrics;
use crate::session::Session;

/// Maps session identifiers to sessions.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    buffer_capacity: usize,
}

impl SessionStore {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            buffer_capacity,
        }
    }

    /// Create a session with a fresh identifier.
    pub async fn create(&self, username: &str) -> Arc<Session> {
        let session = Arc::new(Session::new(
            SessionId::new(),
            username,
            self.buffer_capacity,
        ));

        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id().clone(), Arc::clone(&session));
        metrics::set_sessions_active(sessions.len());

        info!(session_id = %session.id(), username = %username, "Session created");
        session
    }

    pub async fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn remove(&self, id: &SessionId) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(id);
        metrics::set_sessions_active(sessions.len());
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Remove sessions idle for at least `max_idle`. Sessions with a live
    /// connection are kept regardless of idle time.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            session.live_connections() > 0 || session.idle_for() < max_idle
        });

        let evicted = before - sessions.len();
        if evicted > 0 {
            metrics::record_sessions_evicted(evicted);
            metrics::set_sessions_active(sessions.len());
            info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }
}

/// Background task that periodically evicts idle sessions.
pub struct SessionSweeper;

impl SessionSweeper {
    /// Sweep every quarter of `idle_timeout` (at least once a second) until
    /// `shutdown` flips to true or its sender is dropped.
    pub fn spawn(
        store: Arc<SessionStore>,
        idle_timeout: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let period = (idle_timeout / 4).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                idle_timeout_secs = idle_timeout.as_secs(),
                "Session sweeper started"
            );

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        store.evict_idle(idle_timeout).await;
                    }
                }
            }

            debug!("Session sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_get_remove() {
        let store = SessionStore::new(9);
        let session = store.create("guest").await;
        assert_eq!(store.len().await, 1);

        let found = store.get(session.id()).await.unwrap();
        assert!(Arc::ptr_eq(&found, &session));
        assert!(store.get(&SessionId::new()).await.is_none());

        assert!(store.remove(session.id()).await.is_some());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_spares_connected_sessions() {
        let store = SessionStore::new(9);
        let idle = store.create("guest").await;
        let connected = store.create("guest").await;
        let _guard = connected.connect();
        let fresh_id = {
            tokio::time::advance(Duration::from_secs(50)).await;
            store.create("guest").await.id().clone()
        };

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(store.evict_idle(Duration::from_secs(60)).await, 1);

        assert!(!store.contains(idle.id()).await);
        assert!(store.contains(connected.id()).await);
        assert!(store.contains(&fresh_id).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_and_stops() {
        let store = Arc::new(SessionStore::new(9));
        let session = store.create("guest").await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let sweeper = SessionSweeper::spawn(store.clone(), Duration::from_secs(8), shutdown_rx);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(!store.contains(session.id()).await);

        shutdown_tx.send(true).unwrap();
        sweeper.await.unwrap();
    }
}
