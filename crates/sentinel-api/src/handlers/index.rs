//! UI entry point.

use axum::extract::State;
use axum::response::Html;
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use tracing::warn;

use crate::auth::{authenticate, session_cookie, session_id_from_jar};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Serve `index.html` to the guest and make sure the browser holds a valid
/// session cookie.
pub async fn index(
    State(state): State<AppState>,
    jar: CookieJar,
    credentials: Option<TypedHeader<Authorization<Basic>>>,
) -> ApiResult<(CookieJar, Html<String>)> {
    let username = authenticate(&state.config, credentials.as_ref())?;

    let path = state.config.static_dir.join("index.html");
    let page = tokio::fs::read_to_string(&path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "index.html unavailable");
        ApiError::not_found("index.html")
    })?;

    let known = match session_id_from_jar(&jar) {
        Some(id) => state.sessions.contains(&id).await,
        None => false,
    };

    let jar = if known {
        jar
    } else {
        let session = state.sessions.create(&username).await;
        jar.add(session_cookie(session.id()))
    };

    Ok((jar, Html(page)))
}
