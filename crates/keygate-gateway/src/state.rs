//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use keygate_auth::IdentityProvider;
use keygate_core::SessionId;
use keygate_session::{AuthServices, BearerAuthenticator, SessionStore, StatefulAuthenticator};
use keygate_store::SessionBackend;

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
///
/// Collaborators are trait objects so the binary and the tests can wire in
/// different providers, resolvers and backends without changing the router.
#[derive(Clone)]
pub struct GatewayState {
    /// The identity provider, called directly by the companion endpoints.
    pub provider: Arc<dyn IdentityProvider>,
    /// Collaborators for the session-backed flow.
    pub services: AuthServices,
    /// Authenticator for requests carrying their own bearer token.
    pub bearer: BearerAuthenticator,
    /// Storage for server-side sessions.
    pub backend: Arc<dyn SessionBackend>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl GatewayState {
    /// Create a new gateway state.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        services: AuthServices,
        bearer: BearerAuthenticator,
        backend: Arc<dyn SessionBackend>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            provider,
            services,
            bearer,
            backend,
            config,
        }
    }

    /// The session-backed authenticator for `session_id`.
    #[must_use]
    pub fn authenticator(&self, session_id: SessionId) -> StatefulAuthenticator {
        self.services
            .authenticator(SessionStore::new(Arc::clone(&self.backend), session_id))
    }
}
