//! Request extractors for the two authentication variants.
//!
//! [`SessionCookie`] binds a request to a server-side session, minting a new
//! ID when the browser does not present one. [`BearerToken`] reads an
//! `Authorization: Bearer` header for the stateless variant.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use keygate_core::SessionId;
use keygate_session::BearerContext;

use crate::error::ApiError;
use crate::state::GatewayState;

/// The server-side session the request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCookie {
    /// Session identifier.
    pub id: SessionId,
    /// Whether the ID was minted for this request and still has to be sent
    /// to the browser.
    pub is_new: bool,
}

impl SessionCookie {
    /// Read the session ID from the request's cookies.
    ///
    /// A missing or unparseable cookie yields a fresh session.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        match find_cookie(headers, cookie_name).and_then(|value| value.parse().ok()) {
            Some(id) => Self { id, is_new: false },
            None => Self {
                id: SessionId::generate(),
                is_new: true,
            },
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<GatewayState>> for SessionCookie {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(
            &parts.headers,
            &state.config.session_cookie_name,
        ))
    }
}

/// The caller-supplied bearer token, if any.
#[derive(Debug, Clone)]
pub struct BearerToken(pub Option<BearerContext>);

#[axum::async_trait]
impl FromRequestParts<Arc<GatewayState>> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<GatewayState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Self(None));
        };

        let value = value.to_str().map_err(|_| ApiError::Unauthorized)?;
        let context = BearerContext::from_authorization_header(value).map_err(|e| {
            tracing::debug!(error = %e, "Malformed Authorization header");
            ApiError::Unauthorized
        })?;

        Ok(Self(Some(context)))
    }
}

/// Value of the cookie called `name` across all `Cookie` headers.
fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find_map(|(key, value)| (key == name).then_some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn existing_session_cookie_is_reused() {
        let id = SessionId::generate();
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("theme=dark; keygate_session={id}")).unwrap(),
        );

        let cookie = SessionCookie::from_headers(&headers, "keygate_session");
        assert_eq!(cookie.id, id);
        assert!(!cookie.is_new);
    }

    #[test]
    fn missing_or_garbled_cookie_mints_a_session() {
        let cookie = SessionCookie::from_headers(&HeaderMap::new(), "keygate_session");
        assert!(cookie.is_new);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("keygate_session=nope"));
        assert!(SessionCookie::from_headers(&headers, "keygate_session").is_new);
    }

    #[test]
    fn cookie_lookup_matches_whole_name() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("xkeygate_session=1; other=2"));
        assert_eq!(find_cookie(&headers, "keygate_session"), None);
        assert_eq!(find_cookie(&headers, "other"), Some("2"));
    }
}
