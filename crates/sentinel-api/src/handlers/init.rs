//! UI bootstrap data.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use sentinel_inference::InferenceBackend;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct InitResponse {
    pub engine_name: String,
    pub email_address: Option<String>,
}

/// Active engine and the default notification address.
pub async fn init(State(state): State<AppState>) -> Json<InitResponse> {
    Json(InitResponse {
        engine_name: state.backend.name(),
        email_address: state.config.default_email.clone(),
    })
}
