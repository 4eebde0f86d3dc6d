//! UI string translation.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use sentinel_inference::InferenceBackend;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Base UI texts, relative to the static directory.
pub const BASE_TEXTS_PATH: &str = "locales/extracted_texts.json";

#[derive(Debug, Serialize)]
pub struct TranslationsResponse {
    pub translations: BTreeMap<String, String>,
}

/// UI texts in `language`. English is served from the file as-is.
pub async fn get_translations(
    State(state): State<AppState>,
    Path(language): Path<String>,
) -> ApiResult<Json<TranslationsResponse>> {
    let path = state.config.static_dir.join(BASE_TEXTS_PATH);
    let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "Base texts unavailable");
        ApiError::not_found("Base texts file not found")
    })?;
    let base: BTreeMap<String, String> = serde_json::from_str(&raw)
        .map_err(|e| ApiError::internal(format!("Invalid base texts: {}", e)))?;

    if language.to_lowercase().starts_with("en") {
        return Ok(Json(TranslationsResponse { translations: base }));
    }

    let (keys, texts): (Vec<String>, Vec<String>) = base.into_iter().unzip();
    let translated = state
        .backend
        .translate(&texts, &language)
        .await
        .map_err(|e| ApiError::from_inference("Translation", e))?;

    info!(language = %language, texts = translated.len(), "Translation completed");

    Ok(Json(TranslationsResponse {
        translations: keys.into_iter().zip(translated).collect(),
    }))
}
