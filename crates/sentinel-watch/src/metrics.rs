//! Metric names and helpers for the watch loop.

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_RECEIVED_TOTAL: &str = "sentinel_frames_received_total";
    pub const TICKS_TOTAL: &str = "sentinel_ticks_total";
    pub const INFERENCE_DISPATCHED_TOTAL: &str = "sentinel_inference_dispatched_total";
    pub const INFERENCE_BUSY_TOTAL: &str = "sentinel_inference_busy_total";
    pub const INFERENCE_DROPPED_TOTAL: &str = "sentinel_inference_dropped_total";
    pub const RESULTS_DELIVERED_TOTAL: &str = "sentinel_results_delivered_total";
    pub const RESULTS_DISCARDED_TOTAL: &str = "sentinel_results_discarded_total";
    pub const SESSIONS_ACTIVE: &str = "sentinel_sessions_active";
    pub const SESSIONS_EVICTED_TOTAL: &str = "sentinel_sessions_evicted_total";
}

/// Record an inbound frame packet by ingest result.
pub fn record_frame_received(outcome: &'static str) {
    counter!(names::FRAMES_RECEIVED_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_tick(dispatched: bool) {
    let result = if dispatched { "dispatched" } else { "no_prompt" };
    counter!(names::TICKS_TOTAL, "result" => result).increment(1);
}

pub fn record_dispatched() {
    counter!(names::INFERENCE_DISPATCHED_TOTAL).increment(1);
}

pub fn record_busy() {
    counter!(names::INFERENCE_BUSY_TOTAL).increment(1);
}

pub fn record_dropped(reason: &'static str) {
    counter!(names::INFERENCE_DROPPED_TOTAL, "reason" => reason).increment(1);
}

pub fn record_delivered() {
    counter!(names::RESULTS_DELIVERED_TOTAL).increment(1);
}

pub fn record_discarded(reason: &'static str) {
    counter!(names::RESULTS_DISCARDED_TOTAL, "reason" => reason).increment(1);
}

pub fn set_sessions_active(count: usize) {
    gauge!(names::SESSIONS_ACTIVE).set(count as f64);
}

pub fn record_sessions_evicted(count: usize) {
    counter!(names::SESSIONS_EVICTED_TOTAL).increment(count as u64);
}
