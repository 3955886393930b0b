//! OpenID-Connect provider integration for keygate.
//!
//! This crate talks to a realm-scoped identity provider and covers:
//!
//! - Authorization and logout URL construction
//! - Authorization-code and refresh-token exchange
//! - The realm epoch (`tokens-not-before`) and its gate
//! - Identity resolution, via the userinfo endpoint or locally against the
//!   realm JWKS
//! - PKCE verifier/challenge and nonce generation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │  Authenticator   │────▶│ IdentityProvider │     │ IdentityResolver │
//! │  (session crate) │     │ (trait)          │     │ (trait)          │
//! └────────┬─────────┘     └────────┬─────────┘     └────────┬─────────┘
//!          │                        │                        │
//!          │               ┌────────▼─────────┐     ┌────────▼─────────┐
//!          └──────────────▶│  EpochGate       │     │ UserInfo / JWKS  │
//!                          │  (stamp cache)   │     │ resolvers        │
//!                          └────────┬─────────┘     └────────┬─────────┘
//!                                   │ HTTPS                  │ HTTPS
//!                          ┌────────▼────────────────────────▼─────────┐
//!                          │        {base}/realms/{realm}/...           │
//!                          └────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keygate_auth::{pkce, AuthConfig, IdentityProvider, RealmProvider};
//! use keygate_core::SystemClock;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig {
//!     base_url: "https://sso.example.com".to_string(),
//!     realm: "acme".to_string(),
//!     client_id: "web".to_string(),
//!     ..AuthConfig::default()
//! };
//!
//! let provider = RealmProvider::new(config, Arc::new(SystemClock));
//! let pair = pkce::PkcePair::generate();
//! let url = provider.authorization_url(
//!     "https://app.example.com/callback",
//!     &pair.challenge,
//!     &pkce::generate_nonce(),
//! );
//! println!("Send the user to {url}");
//!
//! let token = provider
//!     .exchange_code("code-from-callback", &pair.verifier, "https://app.example.com/callback")
//!     .await?;
//! println!("Access token expires at {}", token.expires_at());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod epoch;
pub mod error;
pub mod jwks;
pub mod pkce;
pub mod provider;
pub mod resolver;

pub use epoch::{EpochGate, EpochReading};
pub use error::{AuthError, ResolveError, Result};
pub use provider::{IdentityProvider, RealmProvider};
pub use resolver::{IdentityResolver, JwksResolver, UserInfoResolver};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockIdentityProvider;
#[cfg(any(test, feature = "test-utils"))]
pub use resolver::MockIdentityResolver;

use serde::Deserialize;

/// Configuration for a realm-scoped OpenID-Connect provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Base URL of the provider (e.g., `https://sso.example.com`).
    pub base_url: String,
    /// Realm name.
    pub realm: String,
    /// OAuth client identifier.
    pub client_id: String,
    /// OAuth client secret, for confidential clients.
    pub client_secret: Option<String>,
    /// Callback URL registered with the provider.
    pub redirect_uri: String,
    /// Expected `aud` claim for locally validated tokens. Not checked when unset.
    pub audience: Option<String>,
    /// How long a fetched epoch stamp is reused, in seconds. `0` disables caching.
    pub epoch_cache_seconds: u64,
    /// How often to refresh the JWKS cache, in seconds.
    pub jwks_refresh_seconds: u64,
    /// Timeout for every provider request, in seconds.
    pub request_timeout_seconds: u64,
}

impl AuthConfig {
    /// Get the realm base URL, which is also the token issuer.
    #[must_use]
    pub fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.base_url.trim_end_matches('/'), self.realm)
    }

    fn protocol_url(&self, endpoint: &str) -> String {
        format!("{}/protocol/openid-connect/{endpoint}", self.realm_url())
    }

    /// Get the authorization endpoint URL.
    #[must_use]
    pub fn authorize_url(&self) -> String {
        self.protocol_url("auth")
    }

    /// Get the token endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> String {
        self.protocol_url("token")
    }

    /// Get the end-session endpoint URL.
    #[must_use]
    pub fn logout_url(&self) -> String {
        self.protocol_url("logout")
    }

    /// Get the userinfo endpoint URL.
    #[must_use]
    pub fn userinfo_url(&self) -> String {
        self.protocol_url("userinfo")
    }

    /// Get the JWKS endpoint URL.
    #[must_use]
    pub fn jwks_url(&self) -> String {
        self.protocol_url("certs")
    }

    /// Get the expected JWT issuer.
    #[must_use]
    pub fn issuer(&self) -> String {
        self.realm_url()
    }

    pub(crate) fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.request_timeout_seconds))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            })
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8180".to_string(),
            realm: "master".to_string(),
            client_id: "keygate".to_string(),
            client_secret: None,
            redirect_uri: "http://localhost:8080/callback".to_string(),
            audience: None,
            epoch_cache_seconds: 30,
            jwks_refresh_seconds: 300,
            request_timeout_seconds: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.realm, "master");
        assert_eq!(config.epoch_cache_seconds, 30);
        assert_eq!(config.jwks_refresh_seconds, 300);
        assert!(config.client_secret.is_none());
    }

    #[test]
    fn config_urls() {
        let config = AuthConfig {
            base_url: "https://sso.example.com/".to_string(),
            realm: "acme".to_string(),
            ..AuthConfig::default()
        };

        assert_eq!(config.realm_url(), "https://sso.example.com/realms/acme");
        assert_eq!(
            config.authorize_url(),
            "https://sso.example.com/realms/acme/protocol/openid-connect/auth"
        );
        assert_eq!(
            config.token_url(),
            "https://sso.example.com/realms/acme/protocol/openid-connect/token"
        );
        assert_eq!(
            config.logout_url(),
            "https://sso.example.com/realms/acme/protocol/openid-connect/logout"
        );
        assert_eq!(
            config.userinfo_url(),
            "https://sso.example.com/realms/acme/protocol/openid-connect/userinfo"
        );
        assert_eq!(
            config.jwks_url(),
            "https://sso.example.com/realms/acme/protocol/openid-connect/certs"
        );
        assert_eq!(config.issuer(), config.realm_url());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: AuthConfig =
            serde_json::from_str(r#"{"base_url":"https://sso","realm":"r","client_id":"c"}"#)
                .unwrap();
        assert_eq!(config.realm_url(), "https://sso/realms/r");
        assert_eq!(config.request_timeout_seconds, 10);
    }

    #[test]
    fn auth_error_status_codes() {
        assert_eq!(AuthError::TokenExpired.http_status_code(), 401);
        assert_eq!(AuthError::InvalidSignature.http_status_code(), 401);
        assert_eq!(AuthError::Http { status: 500 }.http_status_code(), 502);
        assert_eq!(
            AuthError::JwksFetchFailed("test".into()).http_status_code(),
            500
        );
    }
}
