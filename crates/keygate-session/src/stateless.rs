//! Bearer-token authentication for stateless requests.
//!
//! Nothing is stored between calls: every request brings its own token in the
//! `Authorization` header and is resolved on its own. An expired token is
//! simply unauthorized since there is nothing to refresh with.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use keygate_auth::{IdentityResolver, ResolveError};
use keygate_core::{decode_claims, Clock, Identity, Redirect, Token};

use crate::error::{Result, SessionError};

/// The token supplied with the current request.
#[derive(Debug, Clone, PartialEq)]
pub struct BearerContext {
    token: Token,
}

impl BearerContext {
    /// Wrap an already built token.
    #[must_use]
    pub const fn new(token: Token) -> Self {
        Self { token }
    }

    /// Build a context from a raw access token.
    ///
    /// JWT claims are decoded and the expiry taken from `exp`; a JWT without
    /// `exp` and an opaque token never expire on their own.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidBearerToken` for an empty token or a JWT
    /// whose `exp` is not a timestamp.
    pub fn from_access_token(access_token: &str) -> Result<Self> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(SessionError::InvalidBearerToken("empty token".to_string()));
        }

        let token = if decode_claims(access_token).is_some() {
            Token::from_jwt(access_token)
                .map_err(|e| SessionError::InvalidBearerToken(e.to_string()))?
        } else {
            Token::new(access_token, None, None, DateTime::<Utc>::MAX_UTC)
        };

        Ok(Self { token })
    }

    /// Parse an `Authorization: Bearer <token>` header value.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidBearerToken` if the scheme is not
    /// `Bearer` or the token is unusable.
    pub fn from_authorization_header(value: &str) -> Result<Self> {
        let (scheme, token) = value
            .trim()
            .split_once(' ')
            .ok_or_else(|| SessionError::InvalidBearerToken("missing scheme".to_string()))?;

        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(SessionError::InvalidBearerToken(format!(
                "unsupported scheme {scheme}"
            )));
        }

        Self::from_access_token(token)
    }

    /// The supplied token.
    #[must_use]
    pub const fn token(&self) -> &Token {
        &self.token
    }
}

/// What a bearer check found for the current call.
#[derive(Debug, Clone, PartialEq)]
pub struct BearerOutcome {
    token: Token,
    identity: Option<Identity>,
}

impl BearerOutcome {
    /// The token that was supplied.
    #[must_use]
    pub const fn token(&self) -> &Token {
        &self.token
    }

    /// The identity, when the token was accepted.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Whether the token was accepted.
    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        self.identity.is_some()
    }
}

/// Authenticates requests that carry their own bearer token.
#[derive(Clone)]
pub struct BearerAuthenticator {
    resolver: Arc<dyn IdentityResolver>,
    clock: Arc<dyn Clock>,
}

impl BearerAuthenticator {
    /// Create an authenticator resolving identities through `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn IdentityResolver>, clock: Arc<dyn Clock>) -> Self {
        Self { resolver, clock }
    }

    /// Resolve the identity for `context` once.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::IdentityUnavailable` when the resolver cannot
    /// decide.
    pub async fn check(&self, context: BearerContext) -> Result<BearerOutcome> {
        let token = context.token;

        if token.is_expired(self.clock.now()) {
            tracing::debug!("Bearer token expired");
            return Ok(BearerOutcome {
                token,
                identity: None,
            });
        }

        let identity = match self.resolver.resolve(&token).await {
            Ok(identity) => Some(identity),
            Err(ResolveError::Rejected(reason)) => {
                tracing::debug!(reason = %reason, "Bearer token rejected");
                None
            }
            Err(ResolveError::Unavailable(reason)) => {
                return Err(SessionError::IdentityUnavailable(reason))
            }
        };

        Ok(BearerOutcome { token, identity })
    }

    /// Run `on_authorized` or `on_unauthorized` for the supplied token.
    ///
    /// # Errors
    ///
    /// Same as [`BearerAuthenticator::check`].
    pub async fn authenticate<U, A>(
        &self,
        context: BearerContext,
        on_unauthorized: U,
        on_authorized: A,
    ) -> Result<Option<Redirect>>
    where
        U: FnOnce() -> Option<Redirect> + Send,
        A: FnOnce(&Token, &Identity) -> Option<Redirect> + Send,
    {
        let outcome = self.check(context).await?;
        Ok(match outcome.identity() {
            Some(identity) => on_authorized(outcome.token(), identity),
            None => on_unauthorized(),
        })
    }
}
