//! Epoch stamps and the server-side session record.
//!
//! The identity provider publishes an opaque "not before" stamp. A session
//! remembers the stamp that was current when its token was issued; once the
//! provider reissues the stamp every older session is treated as stale.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::token::Token;

/// Opaque provider-issued version marker.
///
/// Only equality is meaningful: two unequal stamps mean "newer", no ordering
/// is implied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EpochStamp {
    /// Numeric stamp, usually a unix timestamp.
    Number(i64),
    /// Free-form string stamp.
    Text(String),
}

impl fmt::Display for EpochStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EpochStamp {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<String> for EpochStamp {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A token together with the epoch it was issued under.
///
/// There is no way to build a record without an epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    token: Token,
    epoch: EpochStamp,
}

impl SessionRecord {
    /// Pair a freshly issued token with the epoch captured alongside it.
    #[must_use]
    pub const fn new(token: Token, epoch: EpochStamp) -> Self {
        Self { token, epoch }
    }

    /// The stored token.
    #[must_use]
    pub const fn token(&self) -> &Token {
        &self.token
    }

    /// The epoch current when the token was stored.
    #[must_use]
    pub const fn epoch(&self) -> &EpochStamp {
        &self.epoch
    }

    /// Consume the record, returning the token.
    #[must_use]
    pub fn into_token(self) -> Token {
        self.token
    }
}
