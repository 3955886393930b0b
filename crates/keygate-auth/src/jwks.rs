//! Realm JWKS fetching and caching.
//!
//! Keys are fetched from the realm `certs` endpoint and cached by key ID. A
//! lookup for an unknown `kid` forces a refetch so key rotation is picked up
//! without waiting for the refresh interval.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::prelude::*;
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::{AuthError, Result};
use crate::AuthConfig;

/// JWKS document served by the realm.
#[derive(Debug, Deserialize)]
pub struct JwksResponse {
    /// The list of keys.
    pub keys: Vec<JwkKey>,
}

/// A single JWK (JSON Web Key).
#[derive(Debug, Default, Deserialize)]
pub struct JwkKey {
    /// Key type (`RSA`, `EC` or `OKP`).
    pub kty: String,
    /// Key ID.
    pub kid: Option<String>,
    /// Key use; only `sig` keys are kept.
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// Algorithm (e.g., `RS256`).
    pub alg: Option<String>,
    /// RSA modulus (base64url).
    pub n: Option<String>,
    /// RSA exponent (base64url).
    pub e: Option<String>,
    /// Curve name for `EC` and `OKP` keys.
    pub crv: Option<String>,
    /// Public x coordinate / Ed25519 public key (base64url).
    pub x: Option<String>,
    /// EC y coordinate (base64url).
    pub y: Option<String>,
}

/// A parsed verification key and the algorithm it is bound to.
#[derive(Clone)]
pub struct VerificationKey {
    /// Key material.
    pub key: DecodingKey,
    /// Algorithm the key may verify.
    pub algorithm: Algorithm,
}

struct CachedKeys {
    keys: HashMap<String, VerificationKey>,
    fetched_at: Option<Instant>,
}

/// Fetches and caches the realm signing keys.
pub struct JwksProvider {
    config: AuthConfig,
    client: reqwest::Client,
    cache: RwLock<CachedKeys>,
}

impl JwksProvider {
    /// Create a new JWKS provider with the given configuration.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let client = config.http_client();
        Self {
            config,
            client,
            cache: RwLock::new(CachedKeys {
                keys: HashMap::new(),
                fetched_at: None,
            }),
        }
    }

    /// Get a verification key by key ID, fetching the JWKS if necessary.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotFound` if the realm does not publish `kid`, or
    /// `JwksFetchFailed` if the document cannot be fetched.
    pub async fn get_key(&self, kid: &str) -> Result<VerificationKey> {
        {
            let cache = self.cache.read();
            let refresh_interval = Duration::from_secs(self.config.jwks_refresh_seconds);
            let fresh = cache
                .fetched_at
                .is_some_and(|at| at.elapsed() < refresh_interval);
            if fresh {
                if let Some(key) = cache.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        self.refresh_keys().await?;

        self.cache
            .read()
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    /// Refetch the JWKS document and replace the cache.
    ///
    /// # Errors
    ///
    /// Returns `JwksFetchFailed` if the document cannot be fetched.
    pub async fn refresh_keys(&self) -> Result<()> {
        let jwks_url = self.config.jwks_url();
        tracing::debug!(url = %jwks_url, "Fetching JWKS");

        let response: JwksResponse = self
            .client
            .get(&jwks_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthError::JwksFetchFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchFailed(e.to_string()))?;

        let mut keys = HashMap::new();
        for jwk in &response.keys {
            if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
                continue;
            }
            let Some(kid) = &jwk.kid else { continue };
            match parse_key(jwk) {
                Ok(Some(key)) => {
                    keys.insert(kid.clone(), key);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(kid = %kid, error = %e, "Skipping malformed JWK"),
            }
        }

        tracing::debug!(count = keys.len(), "Cached JWKS keys");

        let mut cache = self.cache.write();
        cache.keys = keys;
        cache.fetched_at = Some(Instant::now());

        Ok(())
    }
}

fn required<'a>(value: Option<&'a String>, name: &str) -> Result<&'a str> {
    value
        .map(String::as_str)
        .ok_or_else(|| AuthError::InvalidToken(format!("missing {name} parameter")))
}

/// Parse a JWK into a verification key. Unsupported key types yield `None`.
fn parse_key(jwk: &JwkKey) -> Result<Option<VerificationKey>> {
    let invalid = |e: jsonwebtoken::errors::Error| AuthError::InvalidToken(e.to_string());

    match jwk.kty.as_str() {
        "RSA" => {
            let key = DecodingKey::from_rsa_components(
                required(jwk.n.as_ref(), "n")?,
                required(jwk.e.as_ref(), "e")?,
            )
            .map_err(invalid)?;
            let algorithm = match jwk.alg.as_deref() {
                None | Some("RS256") => Algorithm::RS256,
                Some("RS384") => Algorithm::RS384,
                Some("RS512") => Algorithm::RS512,
                Some("PS256") => Algorithm::PS256,
                Some(other) => {
                    tracing::debug!(alg = other, "Skipping RSA key with unsupported alg");
                    return Ok(None);
                }
            };
            Ok(Some(VerificationKey { key, algorithm }))
        }
        "EC" => {
            let algorithm = match jwk.crv.as_deref() {
                Some("P-256") => Algorithm::ES256,
                Some("P-384") => Algorithm::ES384,
                other => {
                    tracing::debug!(crv = ?other, "Skipping EC key with unsupported curve");
                    return Ok(None);
                }
            };
            let key = DecodingKey::from_ec_components(
                required(jwk.x.as_ref(), "x")?,
                required(jwk.y.as_ref(), "y")?,
            )
            .map_err(invalid)?;
            Ok(Some(VerificationKey { key, algorithm }))
        }
        "OKP" => {
            if jwk.crv.as_deref() != Some("Ed25519") {
                tracing::warn!(crv = ?jwk.crv, "Unsupported OKP curve");
                return Ok(None);
            }
            let public_key = BASE64_URL_SAFE_NO_PAD
                .decode(required(jwk.x.as_ref(), "x")?)
                .map_err(|e| AuthError::InvalidToken(format!("invalid base64: {e}")))?;
            Ok(Some(VerificationKey {
                key: DecodingKey::from_ed_der(&public_key),
                algorithm: Algorithm::EdDSA,
            }))
        }
        other => {
            tracing::warn!(kty = other, "Unknown key type");
            Ok(None)
        }
    }
}

/// Modulus of `tests/fixtures/realm_signing_key.pem`.
#[cfg(test)]
pub(crate) const TEST_RSA_N: &str = "oMwoHfkMwkbItFlB0tr4eWLP0R5gjwzUHyXTqHzsNY8mDrMDKTEZzLIfe0ixmUa_v_XzAR43WfK5fiYGf6DfPLeyxpjOMQ0btk0oKWN60RbesTif8jG_ORGm4CkqfkngDipf9A4xyzOOi-gsrrk43JqhKSd6GLLHLuSDdQxXpLb-FUBypnPjtfT7oDfXQ7sO2JfoxZ-zCz6FBa7aI7OCkV7Nt-xieu0hUi6qo0FIuxU55kQgxMQXhYaaHdQowQ1oDZaMl0t6oF1N0HTkItUin5v8RfhgSdRyS8vy-dzdZTX490THsRI8tu4CoyclurycmBPuRpDe4vJWTwYknLTT4Q";
