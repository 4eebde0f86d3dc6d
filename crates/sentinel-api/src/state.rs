//! Application state.

use std::sync::Arc;

use sentinel_inference::Backend;
use sentinel_watch::{SessionStore, WatchConfig};

use crate::config::ApiConfig;
use crate::notifier::Notifier;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub watch: WatchConfig,
    pub backend: Arc<Backend>,
    pub sessions: Arc<SessionStore>,
    /// `None` when SMTP is not configured
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        watch: WatchConfig,
        backend: Backend,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(watch.buffer_capacity));
        Self {
            config,
            watch,
            backend: Arc::new(backend),
            sessions,
            notifier,
        }
    }
}
