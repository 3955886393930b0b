//! Token material issued by the identity provider.
//!
//! A [`Token`] is immutable: a refresh produces a brand new value, the old one
//! is simply dropped. Claims are decoded from the access token's JWT payload
//! without signature verification; they are informational only; signature
//! checks belong to the identity resolver.

use base64::prelude::*;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Access, refresh and identity token values plus their absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    access_token: String,
    refresh_token: Option<String>,
    id_token: Option<String>,
    expires_at: DateTime<Utc>,
    #[serde(default)]
    claims: Map<String, Value>,
}

impl Token {
    /// Build a token with an absolute expiry instant.
    ///
    /// The claim map is decoded from `access_token` when it is a JWT and left
    /// empty otherwise.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        id_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let access_token = access_token.into();
        let claims = decode_claims(&access_token).unwrap_or_default();
        Self {
            access_token,
            refresh_token,
            id_token,
            expires_at,
            claims,
        }
    }

    /// Build a token from a relative `expires_in` (seconds) as returned by a
    /// token endpoint.
    #[must_use]
    pub fn from_expires_in(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        id_token: Option<String>,
        expires_in: u64,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = i64::try_from(expires_in)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(access_token, refresh_token, id_token, expires_at)
    }

    /// Build a token from a raw JWT access token, taking the expiry from its
    /// `exp` claim.
    ///
    /// A JWT without `exp` never expires on its own.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidToken` if the value is not a decodable JWT or
    /// the `exp` claim is not a valid timestamp.
    pub fn from_jwt(access_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into();
        let claims = decode_claims(&access_token)
            .ok_or_else(|| CoreError::InvalidToken("not a JWT".to_string()))?;

        let expires_at = match claims.get("exp") {
            None => DateTime::<Utc>::MAX_UTC,
            Some(exp) => exp
                .as_i64()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .ok_or_else(|| CoreError::InvalidToken("invalid exp claim".to_string()))?,
        };

        Ok(Self {
            access_token,
            refresh_token: None,
            id_token: None,
            expires_at,
            claims,
        })
    }

    /// The bearer value sent on protected calls.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// The refresh token, if the provider issued one.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// The OpenID identity token, if the provider issued one.
    #[must_use]
    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    /// Absolute expiry instant of the access token.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Decoded claims of the access token.
    #[must_use]
    pub const fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Look up a single access-token claim.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Whether the token is expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the token is expired or will expire within `skew`.
    #[must_use]
    pub fn is_expiring(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now.checked_add_signed(skew)
            .map_or(true, |deadline| deadline >= self.expires_at)
    }

    /// Whether a refresh can be attempted with this token.
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Seconds remaining until expiry, clamped at zero.
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Decode the payload segment of a compact JWT into a claim map.
///
/// Returns `None` for anything that is not three dot-separated segments with
/// a base64url JSON object in the middle. No signature check is performed.
#[must_use]
pub fn decode_claims(jwt: &str) -> Option<Map<String, Value>> {
    let mut parts = jwt.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;

    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jwt(payload: &Value) -> String {
        let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let body = BASE64_URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.sig")
    }

    #[test]
    fn claims_decoded_from_jwt_access_token() {
        let access = jwt(&json!({"sub": "user-1", "sid": "abc"}));
        let token = Token::new(access, None, None, Utc::now());

        assert_eq!(token.claim("sub"), Some(&json!("user-1")));
        assert_eq!(token.claim("sid"), Some(&json!("abc")));
    }

    #[test]
    fn opaque_access_token_has_no_claims() {
        let token = Token::new("opaque", None, None, Utc::now());
        assert!(token.claims().is_empty());
    }

    #[test]
    fn garbled_jwt_is_not_decoded() {
        assert!(decode_claims("a.b").is_none());
        assert!(decode_claims("a.!!!.c").is_none());
        assert!(decode_claims("a.b.c.d").is_none());

        let array_payload = BASE64_URL_SAFE_NO_PAD.encode("[1,2]");
        assert!(decode_claims(&format!("h.{array_payload}.s")).is_none());
    }

    #[test]
    fn expiry_boundaries() {
        let now = Utc::now();
        let token = Token::from_expires_in("a", None, None, 60, now);

        assert!(!token.is_expired(now));
        assert!(!token.is_expired(now + Duration::seconds(59)));
        assert!(token.is_expired(now + Duration::seconds(60)));
        assert!(token.is_expiring(now, Duration::seconds(60)));
        assert!(!token.is_expiring(now, Duration::seconds(30)));
        assert_eq!(token.seconds_until_expiry(now), 60);
        assert_eq!(token.seconds_until_expiry(now + Duration::hours(1)), 0);
    }

    #[test]
    fn can_refresh_requires_non_empty_refresh_token() {
        let now = Utc::now();
        assert!(!Token::new("a", None, None, now).can_refresh());
        assert!(!Token::new("a", Some(String::new()), None, now).can_refresh());
        assert!(Token::new("a", Some("r".into()), None, now).can_refresh());
    }

    #[test]
    fn from_jwt_reads_exp() {
        let token = Token::from_jwt(jwt(&json!({"sub": "u", "exp": 1_700_000_000}))).unwrap();
        assert_eq!(token.expires_at().timestamp(), 1_700_000_000);

        let forever = Token::from_jwt(jwt(&json!({"sub": "u"}))).unwrap();
        assert_eq!(forever.expires_at(), DateTime::<Utc>::MAX_UTC);

        assert!(Token::from_jwt("opaque").is_err());
        assert!(Token::from_jwt(jwt(&json!({"exp": "soon"}))).is_err());
    }

    #[test]
    fn token_serde_json() {
        let token = Token::new(
            jwt(&json!({"sub": "u"})),
            Some("r".into()),
            Some("i".into()),
            Utc::now(),
        );
        let json = serde_json::to_string(&token).unwrap();
        let parsed: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, token);
    }
}
