//! Guest authentication and session cookies.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use axum_extra::headers::authorization::Basic;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

use sentinel_models::SessionId;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};

/// The only account allowed into the UI.
pub const GUEST_USERNAME: &str = "guest";

/// Cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "session_id";

/// Check HTTP Basic credentials against the guest account.
pub fn authenticate(
    config: &ApiConfig,
    credentials: Option<&TypedHeader<Authorization<Basic>>>,
) -> ApiResult<String> {
    let Some(expected) = config.guest_password.as_deref() else {
        return Err(ApiError::AuthNotConfigured);
    };
    let Some(TypedHeader(Authorization(basic))) = credentials else {
        return Err(ApiError::Unauthorized);
    };

    if basic.username() != GUEST_USERNAME
        || !constant_time_eq(basic.password().as_bytes(), expected.as_bytes())
    {
        return Err(ApiError::Unauthorized);
    }
    Ok(basic.username().to_string())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Session identifier from the cookie jar, if well-formed.
pub fn session_id_from_jar(jar: &CookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE)
        .and_then(|cookie| SessionId::parse(cookie.value()))
}

/// Cookie handing `id` to the browser.
pub fn session_cookie(id: &SessionId) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(password: Option<&str>) -> ApiConfig {
        ApiConfig {
            guest_password: password.map(String::from),
            ..Default::default()
        }
    }

    fn basic(user: &str, pass: &str) -> TypedHeader<Authorization<Basic>> {
        TypedHeader(Authorization::basic(user, pass))
    }

    #[test]
    fn test_guest_with_right_password() {
        let creds = basic("guest", "hunter2");
        assert_eq!(
            authenticate(&config(Some("hunter2")), Some(&creds)).unwrap(),
            "guest"
        );
    }

    #[test]
    fn test_wrong_user_or_password() {
        let config = config(Some("hunter2"));
        assert!(matches!(
            authenticate(&config, Some(&basic("admin", "hunter2"))),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            authenticate(&config, Some(&basic("guest", "hunter3"))),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(authenticate(&config, None), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn test_missing_password_config() {
        assert!(matches!(
            authenticate(&config(None), Some(&basic("guest", "x"))),
            Err(ApiError::AuthNotConfigured)
        ));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let id = SessionId::new();
        let cookie = session_cookie(&id);
        assert_eq!(cookie.value(), id.as_str());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));

        let jar = CookieJar::new().add(cookie);
        assert_eq!(session_id_from_jar(&jar), Some(id));
    }
}
