//! Key encoding for session values.
//!
//! Keys are `session_id || slot`, so every value of one session shares a
//! 16-byte prefix and can be removed with a single range delete.

use keygate_core::SessionId;

/// The fixed value slots of a server-side session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Pending login round trip (CSRF nonce, PKCE verifier, return URL).
    OAuthState,
    /// The current token and the epoch it was issued under.
    TokenBlob,
}

impl SessionKey {
    /// Every slot, in storage order.
    pub const ALL: [Self; 2] = [Self::OAuthState, Self::TokenBlob];

    /// Stable name of the slot.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OAuthState => "oauth-state",
            Self::TokenBlob => "token-blob",
        }
    }

    /// Single-byte tag used in encoded keys.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::OAuthState => 1,
            Self::TokenBlob => 2,
        }
    }
}

/// Encode a session value key: `session_id || slot`.
#[must_use]
pub fn session_value_key(session_id: &SessionId, key: SessionKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(17);
    out.extend_from_slice(session_id.as_bytes());
    out.push(key.as_u8());
    out
}

/// Encode the prefix shared by all values of a session.
#[must_use]
pub fn session_prefix(session_id: &SessionId) -> Vec<u8> {
    session_id.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_key_layout() {
        let id = SessionId::generate();
        let key = session_value_key(&id, SessionKey::TokenBlob);
        assert_eq!(key.len(), 17);
        assert!(key.starts_with(&session_prefix(&id)));
        assert_eq!(key[16], 2);
    }

    #[test]
    fn slot_names_are_stable() {
        assert_eq!(SessionKey::OAuthState.as_str(), "oauth-state");
        assert_eq!(SessionKey::TokenBlob.as_str(), "token-blob");
    }
}
