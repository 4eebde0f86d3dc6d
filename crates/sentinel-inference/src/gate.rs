//! Fail-fast concurrency limiting for backend calls.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Caps concurrent backend calls without queueing.
///
/// A call beyond the limit is refused immediately; the caller reports it as
/// a busy outcome.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Option<Arc<Semaphore>>,
    limit: Option<usize>,
}

/// Held for the duration of one backend call.
#[derive(Debug)]
pub struct GatePermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl ConcurrencyGate {
    /// Gate with a fixed limit. A limit of zero is treated as one.
    pub fn limited(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Some(Arc::new(Semaphore::new(limit))),
            limit: Some(limit),
        }
    }

    /// Gate that never refuses.
    pub fn unlimited() -> Self {
        Self {
            semaphore: None,
            limit: None,
        }
    }

    /// Build from an optional override, falling back to a provider default.
    pub fn from_override(limit: Option<usize>, default: Option<usize>) -> Self {
        match limit.or(default) {
            Some(limit) => Self::limited(limit),
            None => Self::unlimited(),
        }
    }

    /// Try to enter without waiting.
    pub fn try_enter(&self) -> Option<GatePermit> {
        match &self.semaphore {
            Some(semaphore) => semaphore
                .clone()
                .try_acquire_owned()
                .ok()
                .map(|permit| GatePermit {
                    _permit: Some(permit),
                }),
            None => Some(GatePermit { _permit: None }),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Calls currently holding a permit (always 0 for an unlimited gate).
    pub fn in_flight(&self) -> usize {
        match (&self.semaphore, self.limit) {
            (Some(semaphore), Some(limit)) => limit - semaphore.available_permits(),
            _ => 0,
        }
    }
}
