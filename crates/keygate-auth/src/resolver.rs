//! Identity resolution.
//!
//! An [`IdentityResolver`] turns a bearer token into an [`Identity`], or
//! reports that the token is no longer accepted. The stateful authenticator
//! uses the network-backed [`UserInfoResolver`]; bearer-only deployments
//! usually validate locally with [`JwksResolver`].

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Validation};
use serde_json::{Map, Value};

use keygate_core::{Identity, Token};

use crate::error::{AuthError, ResolveError};
use crate::jwks::JwksProvider;
use crate::AuthConfig;

/// Resolves the identity behind an access token.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve the identity for `token`.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Rejected` when the token is not accepted and
    /// `ResolveError::Unavailable` when no decision could be reached.
    async fn resolve(&self, token: &Token) -> Result<Identity, ResolveError>;
}

/// Asks the realm's userinfo endpoint who the token belongs to.
pub struct UserInfoResolver {
    config: AuthConfig,
    client: reqwest::Client,
}

impl UserInfoResolver {
    /// Create a resolver for the realm described by `config`.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let client = config.http_client();
        Self { config, client }
    }
}

#[async_trait]
impl IdentityResolver for UserInfoResolver {
    #[tracing::instrument(skip_all)]
    async fn resolve(&self, token: &Token) -> Result<Identity, ResolveError> {
        let response = self
            .client
            .get(self.config.userinfo_url())
            .bearer_auth(token.access_token())
            .send()
            .await
            .map_err(|e| ResolveError::Unavailable(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            200..=299 => {}
            401 | 403 => {
                tracing::debug!(status = status.as_u16(), "Userinfo rejected token");
                return Err(ResolveError::Rejected(format!("userinfo returned {status}")));
            }
            _ => return Err(ResolveError::Unavailable(format!("userinfo returned {status}"))),
        }

        let claims: Map<String, Value> = response
            .json()
            .await
            .map_err(|e| ResolveError::Unavailable(format!("invalid userinfo body: {e}")))?;

        Identity::from_claims(claims)
            .ok_or_else(|| ResolveError::Unavailable("userinfo carries no sub".to_string()))
    }
}

/// Audience claim that can be either a string or array.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(untagged)]
enum Audience {
    Single(String),
    Multiple(Vec<String>),
    #[default]
    None,
}

impl Audience {
    fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(s) => s == value,
            Self::Multiple(v) => v.iter().any(|s| s == value),
            Self::None => false,
        }
    }
}

/// Validates access tokens locally against the realm JWKS.
pub struct JwksResolver {
    config: AuthConfig,
    jwks: JwksProvider,
}

impl JwksResolver {
    /// Create a JWKS-backed resolver.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let jwks = JwksProvider::new(config.clone());
        Self { config, jwks }
    }

    /// Get a reference to the JWKS provider for manual operations.
    #[must_use]
    pub const fn jwks(&self) -> &JwksProvider {
        &self.jwks
    }

    /// Verify signature, issuer, expiry and audience; return the claims.
    ///
    /// # Errors
    ///
    /// Returns the matching `AuthError` for whichever check fails.
    pub async fn validate(&self, access_token: &str) -> crate::Result<Map<String, Value>> {
        let header =
            decode_header(access_token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let kid = header
            .kid
            .ok_or_else(|| AuthError::MissingClaim("kid".to_string()))?;

        let key = self.jwks.get_key(&kid).await?;

        let mut validation = Validation::new(key.algorithm);
        validation.set_issuer(&[self.config.issuer()]);
        // Audience is checked by hand since it can be a string or an array.
        validation.validate_aud = false;
        validation.validate_exp = true;

        let token_data = decode::<Map<String, Value>>(access_token, &key.key, &validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim) => {
                    AuthError::MissingClaim(claim.clone())
                }
                _ => AuthError::InvalidToken(e.to_string()),
            })?;

        let claims = token_data.claims;

        if let Some(expected) = &self.config.audience {
            let audience: Audience = claims
                .get("aud")
                .cloned()
                .and_then(|aud| serde_json::from_value(aud).ok())
                .unwrap_or_default();
            if !audience.contains(expected) {
                return Err(AuthError::InvalidAudience);
            }
        }

        Ok(claims)
    }
}

#[async_trait]
impl IdentityResolver for JwksResolver {
    async fn resolve(&self, token: &Token) -> Result<Identity, ResolveError> {
        let claims = self.validate(token.access_token()).await?;
        Identity::from_claims(claims)
            .ok_or_else(|| ResolveError::Rejected("token carries no sub".to_string()))
    }
}

/// A resolver for tests.
///
/// Accepts any token unless told otherwise. The identity is built from the
/// token's decoded claims, or is `mock-user` when they carry no `sub`.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct MockIdentityResolver {
    reject: std::sync::atomic::AtomicBool,
    unavailable: std::sync::atomic::AtomicBool,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockIdentityResolver {
    /// Make every following resolution fail with `Rejected`.
    pub fn reject_all(&self, reject: bool) {
        self.reject
            .store(reject, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make every following resolution fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable
            .store(unavailable, std::sync::atomic::Ordering::SeqCst);
    }

    /// Number of resolutions performed.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl IdentityResolver for MockIdentityResolver {
    async fn resolve(&self, token: &Token) -> Result<Identity, ResolveError> {
        use std::sync::atomic::Ordering;

        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.load(Ordering::SeqCst) {
            return Err(ResolveError::Rejected("mock rejection".to_string()));
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ResolveError::Unavailable("mock outage".to_string()));
        }

        Ok(Identity::from_claims(token.claims().clone())
            .unwrap_or_else(|| Identity::new("mock-user", Map::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwks::TEST_RSA_N;
    use chrono::Utc;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SIGNING_KEY: &[u8] = include_bytes!("../tests/fixtures/realm_signing_key.pem");

    fn config_for(server: &MockServer) -> AuthConfig {
        AuthConfig {
            base_url: server.uri(),
            realm: "acme".to_string(),
            audience: Some("web".to_string()),
            ..AuthConfig::default()
        }
    }

    fn sign(claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some("k1".to_string());
        let key = EncodingKey::from_rsa_pem(SIGNING_KEY).unwrap();
        encode(&header, claims, &key).unwrap()
    }

    async fn mount_jwks(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/realms/acme/protocol/openid-connect/certs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{"kty": "RSA", "kid": "k1", "use": "sig", "alg": "RS256", "n": TEST_RSA_N, "e": "AQAB"}]
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn userinfo_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/realms/acme/protocol/openid-connect/userinfo"))
            .and(header("authorization", "Bearer at-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sub": "user-1",
                "email": "u@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = UserInfoResolver::new(config_for(&server));
        let identity = resolver
            .resolve(&Token::new("at-1", None, None, Utc::now()))
            .await
            .unwrap();

        assert_eq!(identity.subject(), "user-1");
        assert_eq!(identity.email(), Some("u@example.com"));
    }

    #[tokio::test]
    async fn userinfo_unauthorized_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/realms/acme/protocol/openid-connect/userinfo"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let resolver = UserInfoResolver::new(config_for(&server));
        let result = resolver
            .resolve(&Token::new("revoked", None, None, Utc::now()))
            .await;
        assert!(matches!(result, Err(ResolveError::Rejected(_))));
    }

    #[tokio::test]
    async fn userinfo_server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/realms/acme/protocol/openid-connect/userinfo"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let resolver = UserInfoResolver::new(config_for(&server));
        let result = resolver
            .resolve(&Token::new("at", None, None, Utc::now()))
            .await;
        assert!(matches!(result, Err(ResolveError::Unavailable(_))));
    }

    #[tokio::test]
    async fn jwks_resolver_accepts_valid_token() {
        let server = MockServer::start().await;
        mount_jwks(&server).await;
        let config = config_for(&server);

        let access = sign(&json!({
            "iss": config.issuer(),
            "sub": "user-7",
            "aud": ["account", "web"],
            "exp": Utc::now().timestamp() + 3600,
            "preferred_username": "ada"
        }));

        let resolver = JwksResolver::new(config);
        let identity = resolver
            .resolve(&Token::from_jwt(access).unwrap())
            .await
            .unwrap();

        assert_eq!(identity.subject(), "user-7");
        assert_eq!(identity.preferred_username(), Some("ada"));
    }

    #[tokio::test]
    async fn jwks_resolver_rejects_wrong_issuer_and_audience() {
        let server = MockServer::start().await;
        mount_jwks(&server).await;
        let config = config_for(&server);
        let exp = Utc::now().timestamp() + 3600;

        let resolver = JwksResolver::new(config.clone());

        let foreign = sign(&json!({"iss": "https://other", "sub": "u", "aud": "web", "exp": exp}));
        assert!(matches!(
            resolver.validate(&foreign).await,
            Err(AuthError::InvalidIssuer)
        ));

        let wrong_aud = sign(&json!({"iss": config.issuer(), "sub": "u", "aud": "api", "exp": exp}));
        assert!(matches!(
            resolver.validate(&wrong_aud).await,
            Err(AuthError::InvalidAudience)
        ));
    }

    #[tokio::test]
    async fn jwks_resolver_rejects_expired_token() {
        let server = MockServer::start().await;
        mount_jwks(&server).await;
        let config = config_for(&server);

        let expired = sign(&json!({
            "iss": config.issuer(),
            "sub": "u",
            "aud": "web",
            "exp": Utc::now().timestamp() - 3600
        }));

        let resolver = JwksResolver::new(config);
        let result = resolver
            .resolve(&Token::new(expired, None, None, Utc::now()))
            .await;
        assert!(matches!(result, Err(ResolveError::Rejected(_))));
    }

    #[tokio::test]
    async fn jwks_outage_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/realms/acme/protocol/openid-connect/certs"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let config = config_for(&server);

        let access = sign(&json!({"iss": config.issuer(), "sub": "u", "aud": "web", "exp": Utc::now().timestamp() + 60}));
        let resolver = JwksResolver::new(config);
        let result = resolver
            .resolve(&Token::new(access, None, None, Utc::now()))
            .await;
        assert!(matches!(result, Err(ResolveError::Unavailable(_))));
    }

    #[tokio::test]
    async fn mock_resolver_switches() {
        let resolver = MockIdentityResolver::default();
        let token = Token::new("opaque", None, None, Utc::now());

        assert_eq!(resolver.resolve(&token).await.unwrap().subject(), "mock-user");
        resolver.reject_all(true);
        assert!(matches!(
            resolver.resolve(&token).await,
            Err(ResolveError::Rejected(_))
        ));
        assert_eq!(resolver.calls(), 2);
    }
}
