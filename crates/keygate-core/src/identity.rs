//! Resolved user identity.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An authenticated identity with its server-supplied claims.
///
/// Claims arrive with provider-specific names, so they are kept as an explicit
/// map and read through [`Identity::claim`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    subject: String,
    #[serde(default)]
    claims: Map<String, Value>,
}

impl Identity {
    /// Build an identity from a subject and claim map.
    #[must_use]
    pub fn new(subject: impl Into<String>, claims: Map<String, Value>) -> Self {
        Self {
            subject: subject.into(),
            claims,
        }
    }

    /// Build an identity from a claim map, taking the subject from `sub`.
    ///
    /// Returns `None` when `sub` is absent or not a string.
    #[must_use]
    pub fn from_claims(claims: Map<String, Value>) -> Option<Self> {
        let subject = claims.get("sub")?.as_str()?.to_string();
        Some(Self { subject, claims })
    }

    /// The stable subject identifier (`sub`).
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// All claims.
    #[must_use]
    pub const fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Look up a claim by name.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// Look up a string claim by name.
    #[must_use]
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.claim(name).and_then(Value::as_str)
    }

    /// `preferred_username`, if present.
    #[must_use]
    pub fn preferred_username(&self) -> Option<&str> {
        self.claim_str("preferred_username")
    }

    /// `email`, if present.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.claim_str("email")
    }
}
