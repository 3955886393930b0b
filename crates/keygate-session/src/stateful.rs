//! Session-backed authentication state machine.
//!
//! One [`StatefulAuthenticator`] is built per request from the shared
//! [`AuthServices`] and the request's [`SessionStore`]. Every operation that
//! may send the browser elsewhere yields `Option<Redirect>`; the host turns a
//! `Some` into an HTTP redirect.
//!
//! ```text
//!            login()                 handle_callback()
//!   ──────▶ [state stored] ──IdP──▶ [state taken] ──exchange──▶ [record stored]
//!                                        │                           │
//!                                  mismatch: hook /            authenticate()
//!                                  InvalidOAuthState          expired ─▶ refresh
//! ```

use std::sync::Arc;

use keygate_auth::pkce::{generate_nonce, PkcePair};
use keygate_auth::{EpochGate, IdentityProvider, IdentityResolver, ResolveError};
use keygate_core::{Clock, Identity, OAuthState, Redirect, SessionRecord, Token};

use crate::config::AuthenticatorConfig;
use crate::error::{Result, SessionError};
use crate::guard::Guard;
use crate::hooks::CallbackHooks;
use crate::store::SessionStore;

/// Outcome of checking the current session without running any hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Authentication {
    /// A valid (possibly just refreshed) token and the identity behind it.
    Authorized {
        /// The current token.
        token: Token,
        /// The resolved identity.
        identity: Identity,
    },
    /// No usable session.
    Unauthorized,
}

/// Collaborators shared by all requests.
#[derive(Clone)]
pub struct AuthServices {
    provider: Arc<dyn IdentityProvider>,
    epoch: Arc<EpochGate>,
    resolver: Arc<dyn IdentityResolver>,
    clock: Arc<dyn Clock>,
    hooks: Arc<dyn CallbackHooks>,
    config: AuthenticatorConfig,
}

impl AuthServices {
    /// Bundle the shared collaborators.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        epoch: Arc<EpochGate>,
        resolver: Arc<dyn IdentityResolver>,
        clock: Arc<dyn Clock>,
        hooks: Arc<dyn CallbackHooks>,
        config: AuthenticatorConfig,
    ) -> Self {
        Self {
            provider,
            epoch,
            resolver,
            clock,
            hooks,
            config,
        }
    }

    /// The authenticator configuration.
    #[must_use]
    pub const fn config(&self) -> &AuthenticatorConfig {
        &self.config
    }

    /// Build the authenticator for one request's session.
    #[must_use]
    pub fn authenticator(&self, store: SessionStore) -> StatefulAuthenticator {
        StatefulAuthenticator {
            services: self.clone(),
            store,
        }
    }
}

/// Drives login, callback, refresh and logout for one server-side session.
pub struct StatefulAuthenticator {
    services: AuthServices,
    store: SessionStore,
}

impl StatefulAuthenticator {
    /// The session store this authenticator works on.
    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Start a login: store fresh PKCE/nonce state and redirect to the
    /// provider's authorize URL. No network call is made.
    ///
    /// # Errors
    ///
    /// Returns an error if the login state cannot be stored.
    pub fn login(&self, return_to: Option<&str>) -> Result<Option<Redirect>> {
        let pkce = PkcePair::generate();
        let state = OAuthState {
            nonce: generate_nonce(),
            code_verifier: pkce.verifier,
            return_to: return_to.filter(|r| !r.is_empty()).map(str::to_owned),
        };
        self.store.save_state(&state)?;

        let url = self.services.provider.authorization_url(
            &self.services.config.redirect_uri,
            &pkce.challenge,
            &state.nonce,
        );
        tracing::debug!(session_id = %self.store.session_id(), "Starting login");

        Ok(self.dispatch(Some(Redirect::to(url))))
    }

    /// Handle the provider's redirect back to the callback URL.
    ///
    /// A missing code restarts the login, as does a provider or transport
    /// failure during the exchange. A state mismatch wipes the whole session
    /// before the invalid-state hook runs.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidOAuthState` when `state` does not match
    /// and the invalid-state hook does not redirect.
    pub async fn handle_callback(
        &self,
        code: Option<&str>,
        state: Option<&str>,
    ) -> Result<Option<Redirect>> {
        let Some(code) = code.filter(|c| !c.is_empty()) else {
            tracing::debug!(session_id = %self.store.session_id(), "Callback without code, restarting login");
            return self.login(None);
        };

        let stored = self.store.take_state()?;
        let Some(stored) = stored.filter(|s| s.matches(state)) else {
            tracing::warn!(session_id = %self.store.session_id(), "OAuth state mismatch on callback");
            self.store.clear()?;
            return match self.services.hooks.on_invalid_state() {
                Some(redirect) => Ok(self.dispatch(Some(redirect))),
                None => Err(SessionError::InvalidOAuthState),
            };
        };

        let token = match self
            .services
            .provider
            .exchange_code(code, &stored.code_verifier, &self.services.config.redirect_uri)
            .await
        {
            Ok(token) => token,
            Err(e) if e.is_recoverable() => {
                tracing::warn!(session_id = %self.store.session_id(), error = %e, "Code exchange failed, restarting login");
                return self.login(stored.return_to.as_deref());
            }
            Err(e) => return Err(e.into()),
        };

        let epoch = self.services.epoch.current().await;
        self.store.save_record(&SessionRecord::new(token.clone(), epoch))?;
        tracing::debug!(session_id = %self.store.session_id(), "Login completed");

        let redirect = self.services.hooks.on_login(
            &token,
            stored.return_to.as_deref(),
            &self.services.config.default_redirect,
        );
        Ok(self.dispatch(redirect))
    }

    /// Run `on_authorized` with the current token and identity, or
    /// `on_unauthorized` when there is no usable session.
    ///
    /// An expired token is refreshed exactly once first.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure or when the identity cannot be
    /// resolved either way.
    pub async fn authenticate<U, A>(
        &self,
        on_unauthorized: U,
        on_authorized: A,
    ) -> Result<Option<Redirect>>
    where
        U: FnOnce() -> Option<Redirect> + Send,
        A: FnOnce(&Token, &Identity) -> Option<Redirect> + Send,
    {
        let redirect = match self.check().await? {
            Authentication::Authorized { token, identity } => on_authorized(&token, &identity),
            Authentication::Unauthorized => on_unauthorized(),
        };
        Ok(self.dispatch(redirect))
    }

    /// Decide whether the session is authorized, without running hooks.
    ///
    /// # Errors
    ///
    /// Same as [`StatefulAuthenticator::authenticate`].
    pub async fn check(&self) -> Result<Authentication> {
        let Some(record) = self.current_record().await? else {
            return Ok(Authentication::Unauthorized);
        };

        let token = if record.token().is_expired(self.services.clock.now()) {
            match self.refresh_record(record).await {
                Ok(token) => token,
                Err(e) => {
                    tracing::debug!(session_id = %self.store.session_id(), error = %e, "Expired session could not be refreshed");
                    return Ok(Authentication::Unauthorized);
                }
            }
        } else {
            record.into_token()
        };

        match self.resolve(&token).await? {
            Some(identity) => Ok(Authentication::Authorized { token, identity }),
            None => Ok(Authentication::Unauthorized),
        }
    }

    /// Refresh the session's token.
    ///
    /// The stored session is cleared before the provider is called, so a
    /// failed refresh leaves no session behind.
    ///
    /// # Errors
    ///
    /// Returns an error only on storage failure; a failed refresh is `Ok(None)`.
    pub async fn refresh_token(&self) -> Result<Option<Token>> {
        let Some(record) = self.current_record().await? else {
            return Ok(None);
        };

        match self.refresh_record(record).await {
            Ok(token) => Ok(Some(token)),
            Err(SessionError::RefreshFailed(reason)) => {
                tracing::debug!(session_id = %self.store.session_id(), reason = %reason, "Refresh failed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// End the session and redirect to the provider's logout URL, or straight
    /// to the target when there was no session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be deleted.
    pub fn logout(&self, redirect: Option<&str>) -> Result<Option<Redirect>> {
        let record = self.store.load_record()?;
        self.store.clear()?;

        let target = self.services.config.redirect_or_default(redirect);
        let location = match record {
            Some(record) => self
                .services
                .provider
                .logout_redirect_url(target, record.token().id_token()),
            None => target.to_string(),
        };
        tracing::debug!(session_id = %self.store.session_id(), "Logged out");

        Ok(self.dispatch(Some(Redirect::to(location))))
    }

    /// The identity behind the current token, if it is still accepted.
    ///
    /// An expired token yields `None` without contacting the provider.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure or when the resolver is unavailable.
    pub async fn identity(&self) -> Result<Option<Identity>> {
        let Some(token) = self.token().await? else {
            return Ok(None);
        };
        if token.is_expired(self.services.clock.now()) {
            return Ok(None);
        }
        self.resolve(&token).await
    }

    /// The stored token, after the epoch check.
    ///
    /// # Errors
    ///
    /// Returns an error on storage failure.
    pub async fn token(&self) -> Result<Option<Token>> {
        Ok(self.current_record().await?.map(SessionRecord::into_token))
    }

    /// A [`Guard`] for the current identity.
    ///
    /// # Errors
    ///
    /// Same as [`StatefulAuthenticator::identity`].
    pub async fn guard(&self) -> Result<Option<Guard>> {
        Ok(self
            .identity()
            .await?
            .map(|identity| Guard::new(identity, self.services.config.client_id.clone())))
    }

    /// Load the record, treating a stale epoch as no session.
    async fn current_record(&self) -> Result<Option<SessionRecord>> {
        let Some(record) = self.store.load_record()? else {
            return Ok(None);
        };
        if self.services.epoch.is_stale(record.epoch()).await {
            tracing::debug!(session_id = %self.store.session_id(), "Discarding session from an older epoch");
            self.store.clear_record()?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn refresh_record(&self, record: SessionRecord) -> Result<Token> {
        self.store.clear_record()?;

        let token = record.into_token();
        let refresh = token
            .refresh_token()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SessionError::RefreshFailed("no refresh token".to_string()))?;

        let refreshed = self
            .services
            .provider
            .refresh(refresh)
            .await
            .map_err(|e| {
                tracing::warn!(session_id = %self.store.session_id(), error = %e, "Token refresh rejected");
                SessionError::RefreshFailed(e.to_string())
            })?;

        let epoch = self.services.epoch.current().await;
        self.store
            .save_record(&SessionRecord::new(refreshed.clone(), epoch))?;
        tracing::debug!(session_id = %self.store.session_id(), "Token refreshed");

        Ok(refreshed)
    }

    /// Resolve `token`; a rejection clears the session.
    async fn resolve(&self, token: &Token) -> Result<Option<Identity>> {
        match self.services.resolver.resolve(token).await {
            Ok(identity) => Ok(Some(identity)),
            Err(ResolveError::Rejected(reason)) => {
                tracing::debug!(session_id = %self.store.session_id(), reason = %reason, "Token rejected, clearing session");
                self.store.clear_record()?;
                Ok(None)
            }
            Err(ResolveError::Unavailable(reason)) => Err(SessionError::IdentityUnavailable(reason)),
        }
    }

    /// Single exit point for redirects.
    fn dispatch(&self, redirect: Option<Redirect>) -> Option<Redirect> {
        if let Some(redirect) = &redirect {
            tracing::debug!(session_id = %self.store.session_id(), location = %redirect.location(), "Redirecting");
        }
        redirect
    }
}
