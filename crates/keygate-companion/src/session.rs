//! Browser-side session: PKCE login round trip, token storage and refresh.
//!
//! ```text
//!  start_login_flow()          provider           handle_login_callback()
//!  ─────────────────▶ [state, verifier stored] ──▶ [state checked, consumed]
//!                                                     │ exchange
//!                                                     ▼
//!  fire_pending_events() ◀── navigate ◀── [token stored, "login" queued]
//! ```
//!
//! Everything runs on one thread. Concurrent [`ClientSession::is_authenticated`]
//! calls made while a refresh is pending join that refresh instead of
//! starting their own.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use url::Url;

use keygate_auth::pkce::{generate_nonce, PkcePair};
use keygate_core::{Clock, Token};

use crate::config::CompanionConfig;
use crate::endpoints::CompanionEndpoints;
use crate::error::{CompanionError, Result};
use crate::events::{AuthEvent, Event, EventBus, ListenerId};
use crate::inflight::InFlight;
use crate::navigator::Navigator;
use crate::storage::{keys, Storage};

/// Name under which the pending refresh is memoised.
const REFRESH_OPERATION: &str = "refresh";

/// Query parameters the provider appends to the callback URL.
const CALLBACK_PARAMS: [&str; 4] = ["code", "state", "session_state", "iss"];

const LOGIN_TRIGGER: &str = "login";
const LOGOUT_TRIGGER: &str = "logout";

/// The companion's view of the user's session.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct ClientSession {
    pub(crate) inner: Rc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) config: CompanionConfig,
    pub(crate) storage: Rc<dyn Storage>,
    pub(crate) navigator: Rc<dyn Navigator>,
    pub(crate) endpoints: Rc<dyn CompanionEndpoints>,
    pub(crate) clock: Rc<dyn Clock>,
    pub(crate) events: EventBus,
    pub(crate) inflight: InFlight<Result<Token>>,
    pub(crate) http: reqwest::Client,
}

impl ClientSession {
    /// Create a session over the given browser seams.
    #[must_use]
    pub fn new(
        config: CompanionConfig,
        storage: Rc<dyn Storage>,
        navigator: Rc<dyn Navigator>,
        endpoints: Rc<dyn CompanionEndpoints>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let http = config.http_client();
        Self {
            inner: Rc::new(Inner {
                config,
                storage,
                navigator,
                endpoints,
                clock,
                events: EventBus::new(),
                inflight: InFlight::new(),
                http,
            }),
        }
    }

    /// The event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Shorthand for `events().subscribe(listener)`.
    pub fn subscribe(&self, listener: impl Fn(&Event) + 'static) -> ListenerId {
        self.inner.events.subscribe(listener)
    }

    /// Begin a login: wipe local state, store fresh PKCE and CSRF values and
    /// navigate to the provider.
    ///
    /// # Errors
    ///
    /// Returns an error (also emitted as an `error` event) if the login URL
    /// cannot be obtained or the browser cannot navigate.
    pub async fn start_login_flow(&self, redirect_after_login: Option<&str>) -> Result<()> {
        let result = self.begin_login(redirect_after_login).await;
        self.report(result)
    }

    async fn begin_login(&self, redirect_after_login: Option<&str>) -> Result<()> {
        let inner = &self.inner;
        inner.storage.clear();

        let pkce = PkcePair::generate();
        let state = generate_nonce();
        let callback = strip_callback_params(&inner.navigator.current_url())?;

        inner.storage.set(keys::CODE_VERIFIER, &pkce.verifier)?;
        inner.storage.set(keys::STATE, &state)?;
        inner.storage.set(keys::CALLBACK_URL, &callback)?;
        if let Some(target) = redirect_after_login.or(inner.config.default_redirect.as_deref()) {
            inner.storage.set(keys::REDIRECT_URL_AFTER_LOGIN, target)?;
        }

        let url = inner
            .endpoints
            .login_url(&callback, &pkce.challenge, &state)
            .await?;
        tracing::debug!(callback = %callback, "Starting login");
        inner.navigator.navigate(&url)
    }

    /// Finish a login on the page the provider redirected back to.
    ///
    /// Does nothing (and returns `Ok(false)`) unless a login is pending and the
    /// current URL carries a `state` parameter. The stored state and verifier
    /// are consumed either way.
    ///
    /// # Errors
    ///
    /// A state mismatch, a missing code or verifier, or a failed exchange
    /// clears storage and is returned and emitted as an `error` event.
    pub async fn handle_login_callback(&self) -> Result<bool> {
        let result = self.complete_login().await;
        self.report(result)
    }

    async fn complete_login(&self) -> Result<bool> {
        let inner = &self.inner;
        let storage = &inner.storage;

        let Some(expected) = storage.get(keys::STATE) else {
            return Ok(false);
        };
        let Ok(current) = Url::parse(&inner.navigator.current_url()) else {
            return Ok(false);
        };
        let Some(received) = query_param(&current, "state") else {
            return Ok(false);
        };

        let verifier = storage.get(keys::CODE_VERIFIER);
        storage.remove(keys::STATE);
        storage.remove(keys::CODE_VERIFIER);

        if received != expected {
            storage.clear();
            return Err(CompanionError::CsrfStateMismatch);
        }
        let Some(code) = query_param(&current, "code").filter(|c| !c.is_empty()) else {
            storage.clear();
            return Err(CompanionError::MissingAuthorizationCode);
        };
        let Some(verifier) = verifier.filter(|v| !v.is_empty()) else {
            storage.clear();
            return Err(CompanionError::MissingPkceVerifier);
        };

        let callback = match storage.get(keys::CALLBACK_URL) {
            Some(callback) => callback,
            None => strip_callback_params(current.as_str())?,
        };

        let token = match inner
            .endpoints
            .exchange_code(&code, &verifier, &callback)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                storage.clear();
                return Err(e);
            }
        };

        let target = storage
            .get(keys::REDIRECT_URL_AFTER_LOGIN)
            .unwrap_or(callback);
        storage.remove(keys::CALLBACK_URL);
        storage.remove(keys::REDIRECT_URL_AFTER_LOGIN);

        inner.store_token(&token)?;
        storage.set(keys::TRIGGER_EVENT_AFTER_REDIRECT, LOGIN_TRIGGER)?;
        tracing::debug!(target = %target, "Login completed");

        inner.navigator.navigate(&target)?;
        Ok(true)
    }

    /// Emit the `login` or `logout` event queued before the last redirect.
    ///
    /// Call once after listeners are attached. The queued event is consumed.
    pub fn fire_pending_events(&self) -> Option<AuthEvent> {
        let storage = &self.inner.storage;
        let trigger = storage.get(keys::TRIGGER_EVENT_AFTER_REDIRECT)?;
        storage.remove(keys::TRIGGER_EVENT_AFTER_REDIRECT);

        let (event, authenticated) = match trigger.as_str() {
            LOGIN_TRIGGER => (AuthEvent::Login, true),
            LOGOUT_TRIGGER => (AuthEvent::Logout, false),
            other => {
                tracing::warn!(trigger = other, "Ignoring unknown pending event");
                return None;
            }
        };

        self.inner.events.emit(event.clone());
        self.inner
            .events
            .emit(AuthEvent::AuthStateChanged { authenticated });
        Some(event)
    }

    /// Whether a usable token is held, refreshing it first if it is expiring.
    ///
    /// No token, or a token that is not expiring, is answered without any
    /// network call.
    pub async fn is_authenticated(&self) -> bool {
        let Some(token) = self.inner.stored_token() else {
            return false;
        };
        if !token.is_expiring(self.inner.clock.now(), self.inner.config.refresh_skew()) {
            return true;
        }
        self.refresh().await.is_ok()
    }

    /// Refresh the token, joining a refresh that is already pending.
    ///
    /// # Errors
    ///
    /// Returns `CompanionError::RefreshFailed`, or
    /// `CompanionError::OptionalFeatureDisabled` when the gateway has the
    /// refresh endpoint turned off. The stored token is discarded either way.
    pub async fn refresh(&self) -> Result<Token> {
        let inner = Rc::clone(&self.inner);
        self.inner
            .inflight
            .run(REFRESH_OPERATION, move || async move { inner.refresh_once().await })
            .await
    }

    /// End the session: wipe local state, queue the `logout` event and
    /// navigate to the provider's end-session URL.
    ///
    /// When the gateway has the logout-URL endpoint disabled, the browser goes
    /// straight to the target instead.
    ///
    /// # Errors
    ///
    /// Returns an error (also emitted) if the logout URL cannot be obtained or
    /// the browser cannot navigate.
    pub async fn logout(&self, redirect: Option<&str>) -> Result<()> {
        let result = self.end_session(redirect).await;
        self.report(result)
    }

    async fn end_session(&self, redirect: Option<&str>) -> Result<()> {
        let inner = &self.inner;
        let id_token = inner.storage.get(keys::ID_TOKEN);
        let target = match redirect.or(inner.config.default_redirect.as_deref()) {
            Some(target) => target.to_string(),
            None => strip_callback_params(&inner.navigator.current_url())?,
        };

        inner.storage.clear();
        inner
            .storage
            .set(keys::TRIGGER_EVENT_AFTER_REDIRECT, LOGOUT_TRIGGER)?;

        let location = match inner.endpoints.logout_url(&target, id_token.as_deref()).await {
            Ok(url) => url,
            Err(CompanionError::OptionalFeatureDisabled(_)) => {
                tracing::debug!("Logout URL endpoint disabled, redirecting locally");
                target
            }
            Err(e) => return Err(e),
        };
        inner.navigator.navigate(&location)
    }

    /// The stored access token.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.storage.get(keys::TOKEN)
    }

    /// The stored refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.inner.storage.get(keys::REFRESH_TOKEN)
    }

    /// The stored identity token.
    #[must_use]
    pub fn id_token(&self) -> Option<String> {
        self.inner.storage.get(keys::ID_TOKEN)
    }

    /// Expiry of the stored access token.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.inner
            .storage
            .get(keys::TOKEN_EXPIRES)
            .and_then(|secs| secs.parse().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        result.map_err(|e| self.inner.fail(e))
    }
}

impl Inner {
    async fn refresh_once(&self) -> Result<Token> {
        let Some(refresh) = self
            .storage
            .get(keys::REFRESH_TOKEN)
            .filter(|t| !t.is_empty())
        else {
            self.discard_token();
            return Err(self.fail(CompanionError::RefreshFailed(
                "no refresh token".to_string(),
            )));
        };

        match self.endpoints.refresh_token(&refresh).await {
            Ok(token) => {
                self.store_token(&token).map_err(|e| self.fail(e))?;
                tracing::debug!("Token refreshed");
                self.events.emit(AuthEvent::TokenRefresh);
                self.events
                    .emit(AuthEvent::AuthStateChanged { authenticated: true });
                Ok(token)
            }
            Err(e @ CompanionError::OptionalFeatureDisabled(_)) => {
                tracing::debug!("Refresh endpoint disabled, discarding session");
                self.discard_token();
                Err(self.fail(e))
            }
            Err(e) => {
                tracing::debug!(error = %e, "Token refresh failed, discarding session");
                self.discard_token();
                Err(self.fail(CompanionError::RefreshFailed(e.to_string())))
            }
        }
    }

    /// The stored token; a missing or garbled expiry counts as expired.
    fn stored_token(&self) -> Option<Token> {
        let access = self.storage.get(keys::TOKEN).filter(|t| !t.is_empty())?;
        let expires_at = self
            .storage
            .get(keys::TOKEN_EXPIRES)
            .and_then(|secs| secs.parse().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Some(Token::new(
            access,
            self.storage.get(keys::REFRESH_TOKEN),
            self.storage.get(keys::ID_TOKEN),
            expires_at,
        ))
    }

    fn store_token(&self, token: &Token) -> Result<()> {
        self.storage.set(keys::TOKEN, token.access_token())?;
        self.storage.set(
            keys::TOKEN_EXPIRES,
            &token.expires_at().timestamp().to_string(),
        )?;
        self.store_optional(keys::REFRESH_TOKEN, token.refresh_token())?;
        self.store_optional(keys::ID_TOKEN, token.id_token())
    }

    fn store_optional(&self, key: &str, value: Option<&str>) -> Result<()> {
        match value {
            Some(value) => self.storage.set(key, value),
            None => {
                self.storage.remove(key);
                Ok(())
            }
        }
    }

    fn discard_token(&self) {
        let had_token = self.storage.get(keys::TOKEN).is_some();
        for key in keys::TOKEN_KEYS {
            self.storage.remove(key);
        }
        if had_token {
            self.events
                .emit(AuthEvent::AuthStateChanged { authenticated: false });
        }
    }

    /// Emit `error` for `error` and hand it back.
    pub(crate) fn fail(&self, error: CompanionError) -> CompanionError {
        self.events.emit(AuthEvent::Error(error.clone()));
        error
    }
}

/// `url` without the parameters the provider adds to the callback.
///
/// # Errors
///
/// Returns `CompanionError::Navigation` if `url` is not absolute.
pub fn strip_callback_params(url: &str) -> Result<String> {
    let mut parsed = Url::parse(url)
        .map_err(|e| CompanionError::Navigation(format!("invalid page URL {url}: {e}")))?;

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !CALLBACK_PARAMS.contains(&&**key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    parsed.set_query(None);
    if !kept.is_empty() {
        parsed.query_pairs_mut().extend_pairs(kept);
    }
    Ok(parsed.into())
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_params_are_stripped() {
        assert_eq!(
            strip_callback_params(
                "https://app.test/page?tab=2&code=abc&state=xyz&session_state=s&iss=https%3A%2F%2Fidp"
            )
            .unwrap(),
            "https://app.test/page?tab=2"
        );
        assert_eq!(
            strip_callback_params("https://app.test/page?code=abc#frag").unwrap(),
            "https://app.test/page#frag"
        );
        assert_eq!(
            strip_callback_params("https://app.test").unwrap(),
            "https://app.test/"
        );
    }

    #[test]
    fn relative_urls_are_rejected() {
        assert_eq!(
            strip_callback_params("/relative").unwrap_err().code(),
            "navigation-failed"
        );
    }
}
