//! Realm-scoped identity provider adapter.
//!
//! [`IdentityProvider`] is the seam the session state machines talk through.
//! [`RealmProvider`] implements it against a Keycloak-style realm: URL
//! construction is local, token exchange and the realm epoch go over HTTPS.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

use keygate_core::{decode_claims, Clock, EpochStamp, Token};

use crate::error::{AuthError, Result};
use crate::AuthConfig;

/// Operations the authentication flow needs from the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the authorize URL for an authorization-code + PKCE (S256) login.
    fn authorization_url(&self, redirect_uri: &str, code_challenge: &str, state: &str) -> String;

    /// Build the end-session URL the browser is sent to on logout.
    fn logout_redirect_url(&self, redirect_uri: &str, id_token: Option<&str>) -> String;

    /// Exchange an authorization code for token material.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Provider` when the provider rejects the grant and a
    /// transport or response error otherwise.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<Token>;

    /// Obtain new token material with a refresh token.
    ///
    /// # Errors
    ///
    /// Same as [`IdentityProvider::exchange_code`].
    async fn refresh(&self, refresh_token: &str) -> Result<Token>;

    /// Fetch the realm's current epoch stamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the realm cannot be read.
    async fn epoch(&self) -> Result<EpochStamp>;
}

/// Append `pairs` as a URL-encoded query to `base`.
fn with_query(base: &str, pairs: &[(&str, &str)]) -> String {
    let query = serde_urlencoded::to_string(pairs).unwrap_or_default();
    format!("{base}?{query}")
}

/// The `sid` claim of an identity token, if it carries one.
fn session_id_of(id_token: &str) -> Option<String> {
    decode_claims(id_token)?
        .get("sid")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Raw body of a token endpoint response, success or error.
#[derive(Debug, Deserialize)]
struct RawTokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    id_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Subset of the realm representation we care about.
#[derive(Debug, Deserialize)]
struct RealmInfo {
    #[serde(rename = "tokens-not-before")]
    tokens_not_before: Option<EpochStamp>,
}

/// HTTP implementation of [`IdentityProvider`] for a single realm.
pub struct RealmProvider {
    config: AuthConfig,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl RealmProvider {
    /// Create a provider for the realm described by `config`.
    #[must_use]
    pub fn new(config: AuthConfig, clock: Arc<dyn Clock>) -> Self {
        let client = config.http_client();
        Self {
            config,
            client,
            clock,
        }
    }

    /// The configuration this provider was built with.
    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// POST a form to the token endpoint and turn the answer into a [`Token`].
    async fn token_request(
        &self,
        params: &[(&str, &str)],
        previous_refresh: Option<&str>,
    ) -> Result<Token> {
        let mut form = params.to_vec();
        form.push(("client_id", self.config.client_id.as_str()));
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self
            .client
            .post(self.config.token_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let raw: Option<RawTokenResponse> = serde_json::from_slice(&body).ok();

        match raw {
            Some(RawTokenResponse {
                error: Some(error),
                error_description,
                ..
            }) => {
                tracing::debug!(status = status.as_u16(), error = %error, "Token endpoint returned an error");
                Err(AuthError::provider(error, error_description))
            }
            _ if !status.is_success() => Err(AuthError::Http {
                status: status.as_u16(),
            }),
            None => Err(AuthError::InvalidTokenResponse(
                "body is not a JSON object".to_string(),
            )),
            Some(raw) => self.build_token(raw, previous_refresh),
        }
    }

    fn build_token(&self, raw: RawTokenResponse, previous_refresh: Option<&str>) -> Result<Token> {
        let access_token = raw
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::InvalidTokenResponse("missing access_token".to_string()))?;

        // Providers may omit the refresh token on refresh; the old one stays valid.
        let refresh_token = raw
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_owned));

        let now = self.clock.now();
        let token = match raw.expires_in {
            Some(expires_in) => {
                Token::from_expires_in(access_token, refresh_token, raw.id_token, expires_in, now)
            }
            None => {
                let expires_at = decode_claims(&access_token)
                    .and_then(|claims| claims.get("exp").and_then(Value::as_i64))
                    .and_then(|secs| DateTime::from_timestamp(secs, 0))
                    .unwrap_or(now);
                Token::new(access_token, refresh_token, raw.id_token, expires_at)
            }
        };

        Ok(token)
    }
}

#[async_trait]
impl IdentityProvider for RealmProvider {
    fn authorization_url(&self, redirect_uri: &str, code_challenge: &str, state: &str) -> String {
        with_query(
            &self.config.authorize_url(),
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", "openid"),
                ("state", state),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "S256"),
            ],
        )
    }

    fn logout_redirect_url(&self, redirect_uri: &str, id_token: Option<&str>) -> String {
        let sid = id_token.and_then(session_id_of);

        let mut pairs = vec![
            ("client_id", self.config.client_id.as_str()),
            ("post_logout_redirect_uri", redirect_uri),
        ];
        if let Some(id_token) = id_token {
            pairs.push(("id_token_hint", id_token));
        }
        if let Some(sid) = sid.as_deref() {
            pairs.push(("sid", sid));
        }

        with_query(&self.config.logout_url(), &pairs)
    }

    #[tracing::instrument(skip_all)]
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: &str,
    ) -> Result<Token> {
        tracing::debug!(url = %self.config.token_url(), "Exchanging authorization code");
        self.token_request(
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("code_verifier", code_verifier),
                ("redirect_uri", redirect_uri),
            ],
            None,
        )
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<Token> {
        tracing::debug!(url = %self.config.token_url(), "Refreshing token");
        self.token_request(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
            Some(refresh_token),
        )
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn epoch(&self) -> Result<EpochStamp> {
        let url = self.config.realm_url();
        tracing::debug!(url = %url, "Fetching realm epoch");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Http {
                status: status.as_u16(),
            });
        }

        let info: RealmInfo = response
            .json()
            .await
            .map_err(|e| AuthError::Internal(format!("invalid realm response: {e}")))?;

        info.tokens_not_before
            .ok_or_else(|| AuthError::Internal("realm carries no tokens-not-before".to_string()))
    }
}

/// Scripted in-memory provider for tests.
///
/// Exchange and refresh hand out the configured token (or fail with the
/// configured provider error code). Every call is counted.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockIdentityProvider {
    exchange: parking_lot::Mutex<std::result::Result<Token, String>>,
    refresh: parking_lot::Mutex<std::result::Result<Token, String>>,
    epoch: parking_lot::Mutex<Option<EpochStamp>>,
    exchange_calls: std::sync::atomic::AtomicUsize,
    refresh_calls: std::sync::atomic::AtomicUsize,
    epoch_calls: std::sync::atomic::AtomicUsize,
    last_code_verifier: parking_lot::Mutex<Option<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockIdentityProvider {
    /// Base URL used in the URLs this mock builds.
    pub const BASE_URL: &'static str = "https://idp.test";

    /// Create a mock issuing `token` on exchange and refresh, at `epoch`.
    #[must_use]
    pub fn new(token: Token, epoch: EpochStamp) -> Self {
        Self {
            exchange: parking_lot::Mutex::new(Ok(token.clone())),
            refresh: parking_lot::Mutex::new(Ok(token)),
            epoch: parking_lot::Mutex::new(Some(epoch)),
            exchange_calls: std::sync::atomic::AtomicUsize::new(0),
            refresh_calls: std::sync::atomic::AtomicUsize::new(0),
            epoch_calls: std::sync::atomic::AtomicUsize::new(0),
            last_code_verifier: parking_lot::Mutex::new(None),
        }
    }

    /// Token handed out by the next exchanges.
    pub fn set_exchanged(&self, token: Token) {
        *self.exchange.lock() = Ok(token);
    }

    /// Make exchanges fail with a provider error code.
    pub fn fail_exchange(&self, error: &str) {
        *self.exchange.lock() = Err(error.to_string());
    }

    /// Token handed out by the next refreshes.
    pub fn set_refreshed(&self, token: Token) {
        *self.refresh.lock() = Ok(token);
    }

    /// Make refreshes fail with a provider error code.
    pub fn fail_refresh(&self, error: &str) {
        *self.refresh.lock() = Err(error.to_string());
    }

    /// Change the realm epoch; `None` makes the epoch endpoint fail.
    pub fn set_epoch(&self, epoch: Option<EpochStamp>) {
        *self.epoch.lock() = epoch;
    }

    /// Number of code exchanges performed.
    #[must_use]
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Number of refreshes performed.
    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Number of epoch lookups performed.
    #[must_use]
    pub fn epoch_calls(&self) -> usize {
        self.epoch_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Code verifier sent with the last exchange.
    #[must_use]
    pub fn last_code_verifier(&self) -> Option<String> {
        self.last_code_verifier.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn authorization_url(&self, redirect_uri: &str, code_challenge: &str, state: &str) -> String {
        with_query(
            &format!("{}/auth", Self::BASE_URL),
            &[
                ("redirect_uri", redirect_uri),
                ("state", state),
                ("code_challenge", code_challenge),
            ],
        )
    }

    fn logout_redirect_url(&self, redirect_uri: &str, id_token: Option<&str>) -> String {
        let mut pairs = vec![("post_logout_redirect_uri", redirect_uri)];
        if let Some(id_token) = id_token {
            pairs.push(("id_token_hint", id_token));
        }
        with_query(&format!("{}/logout", Self::BASE_URL), &pairs)
    }

    async fn exchange_code(
        &self,
        _code: &str,
        code_verifier: &str,
        _redirect_uri: &str,
    ) -> Result<Token> {
        self.exchange_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.last_code_verifier.lock() = Some(code_verifier.to_string());
        self.exchange
            .lock()
            .clone()
            .map_err(|error| AuthError::provider(error, None))
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<Token> {
        self.refresh_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.refresh
            .lock()
            .clone()
            .map_err(|error| AuthError::provider(error, None))
    }

    async fn epoch(&self) -> Result<EpochStamp> {
        self.epoch_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.epoch
            .lock()
            .clone()
            .ok_or_else(|| AuthError::Transport("realm unreachable".to_string()))
    }
}
