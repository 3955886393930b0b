//! Server-side login flow.
//!
//! These routes drive the session-backed authenticator. The session travels
//! in a cookie; every redirect the authenticator yields becomes a `302`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use keygate_core::{Identity, Redirect};
use keygate_session::Authentication;

use crate::auth::{BearerToken, SessionCookie};
use crate::error::ApiError;
use crate::state::GatewayState;

/// `?redirect=` on `/login` and `/logout`.
#[derive(Debug, Default, Deserialize)]
pub struct RedirectQuery {
    /// Local path to return to.
    #[serde(default)]
    pub redirect: Option<String>,
}

/// Parameters the provider appends to the callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code.
    #[serde(default)]
    pub code: Option<String>,
    /// CSRF nonce echoed by the provider.
    #[serde(default)]
    pub state: Option<String>,
}

/// `GET /login`
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    cookie: SessionCookie,
    Query(query): Query<RedirectQuery>,
) -> Result<Response, ApiError> {
    let redirect = state
        .authenticator(cookie.id)
        .login(safe_redirect(query.redirect.as_deref()))?;

    Ok(respond(redirect, new_session_cookie(&state, cookie)))
}

/// `GET /callback`
pub async fn callback(
    State(state): State<Arc<GatewayState>>,
    cookie: SessionCookie,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let redirect = state
        .authenticator(cookie.id)
        .handle_callback(query.code.as_deref(), query.state.as_deref())
        .await?;

    Ok(respond(redirect, new_session_cookie(&state, cookie)))
}

/// `GET /logout`
pub async fn logout(
    State(state): State<Arc<GatewayState>>,
    cookie: SessionCookie,
    Query(query): Query<RedirectQuery>,
) -> Result<Response, ApiError> {
    let redirect = state
        .authenticator(cookie.id)
        .logout(safe_redirect(query.redirect.as_deref()))?;

    Ok(respond(redirect, Some(state.config.expired_session_cookie())))
}

/// `GET /me`
///
/// A bearer token takes precedence over the session cookie.
pub async fn me(
    State(state): State<Arc<GatewayState>>,
    BearerToken(bearer): BearerToken,
    cookie: SessionCookie,
) -> Result<Json<Identity>, ApiError> {
    if let Some(context) = bearer {
        let outcome = state.bearer.check(context).await?;
        return outcome
            .identity()
            .cloned()
            .map(Json)
            .ok_or(ApiError::Unauthorized);
    }

    if cookie.is_new {
        return Err(ApiError::Unauthorized);
    }

    match state.authenticator(cookie.id).check().await? {
        Authentication::Authorized { identity, .. } => Ok(Json(identity)),
        Authentication::Unauthorized => Err(ApiError::Unauthorized),
    }
}

/// Keep only same-origin paths; anything else falls back to the default.
fn safe_redirect(target: Option<&str>) -> Option<&str> {
    let target = target?;
    let local = target.starts_with('/') && !target.starts_with("//") && !target.contains('\\');
    if !local {
        tracing::warn!(target = %target, "Ignoring off-site redirect target");
    }
    local.then_some(target)
}

fn new_session_cookie(state: &GatewayState, cookie: SessionCookie) -> Option<String> {
    cookie
        .is_new
        .then(|| state.config.session_cookie(&cookie.id.to_string()))
}

/// Turn the authenticator's outcome into a response.
fn respond(redirect: Option<Redirect>, set_cookie: Option<String>) -> Response {
    let mut response = match redirect {
        Some(redirect) => match HeaderValue::from_str(redirect.location()) {
            Ok(location) => (StatusCode::FOUND, [(LOCATION, location)]).into_response(),
            Err(_) => {
                ApiError::Internal("redirect target is not a valid header".to_string())
                    .into_response()
            }
        },
        None => StatusCode::NO_CONTENT.into_response(),
    };

    if let Some(value) = set_cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_paths_are_honoured() {
        assert_eq!(safe_redirect(Some("/dashboard?tab=1")), Some("/dashboard?tab=1"));
        assert_eq!(safe_redirect(Some("//evil.example.com")), None);
        assert_eq!(safe_redirect(Some("https://evil.example.com")), None);
        assert_eq!(safe_redirect(Some("/\\evil.example.com")), None);
        assert_eq!(safe_redirect(None), None);
    }

    #[test]
    fn redirect_becomes_found() {
        let response = respond(
            Some(Redirect::to("/home")),
            Some("keygate_session=x".to_string()),
        );
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/home");
        assert_eq!(response.headers()[SET_COOKIE], "keygate_session=x");
    }

    #[test]
    fn no_redirect_is_no_content() {
        assert_eq!(respond(None, None).status(), StatusCode::NO_CONTENT);
    }
}
