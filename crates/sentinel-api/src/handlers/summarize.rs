//! Watch log summaries.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use sentinel_inference::InferenceBackend;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WatchLogSummaryRequest {
    pub events: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WatchLogSummaryResponse {
    pub summary: String,
}

/// Condense watch log reasons into one sentence.
pub async fn summarize_watch_logs(
    State(state): State<AppState>,
    Json(request): Json<WatchLogSummaryRequest>,
) -> ApiResult<Json<WatchLogSummaryResponse>> {
    let events: Vec<String> = request
        .events
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();

    if events.is_empty() {
        return Ok(Json(WatchLogSummaryResponse {
            summary: "No events to summarize".to_string(),
        }));
    }

    let summary = state
        .backend
        .summarize(&events)
        .await
        .map_err(|e| ApiError::from_inference("Summarization", e))?;

    Ok(Json(WatchLogSummaryResponse { summary }))
}
