//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while talking to the identity provider or
/// validating its tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider answered with an OAuth error payload.
    #[error("provider error: {error}{}", description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Provider {
        /// The `error` code, e.g. `invalid_grant`.
        error: String,
        /// The optional `error_description`.
        description: Option<String>,
    },

    /// The token endpoint answered 2xx without usable token material.
    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// The provider answered with an unexpected HTTP status and no error payload.
    #[error("unexpected HTTP status {status}")]
    Http {
        /// The HTTP status code.
        status: u16,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The JWT has expired.
    #[error("token expired")]
    TokenExpired,

    /// The JWT signature is invalid.
    #[error("invalid signature")]
    InvalidSignature,

    /// The JWT issuer does not match the realm.
    #[error("invalid issuer")]
    InvalidIssuer,

    /// The JWT audience does not match the expected value.
    #[error("invalid audience")]
    InvalidAudience,

    /// A required claim is missing from the token.
    #[error("missing required claim: {0}")]
    MissingClaim(String),

    /// Failed to fetch the realm JWKS.
    #[error("JWKS fetch failed: {0}")]
    JwksFetchFailed(String),

    /// The key ID specified in the token was not found.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The token format is invalid.
    #[error("invalid token format: {0}")]
    InvalidToken(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Build a provider error from its wire fields.
    #[must_use]
    pub fn provider(error: impl Into<String>, description: Option<String>) -> Self {
        Self::Provider {
            error: error.into(),
            description,
        }
    }

    /// Returns `true` if a login flow hitting this error should start over
    /// instead of failing.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. }
                | Self::InvalidTokenResponse(_)
                | Self::Http { .. }
                | Self::Transport(_)
        )
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::Provider { .. }
            | Self::TokenExpired
            | Self::InvalidSignature
            | Self::InvalidIssuer
            | Self::InvalidAudience
            | Self::MissingClaim(_)
            | Self::InvalidToken(_) => 401,
            Self::InvalidTokenResponse(_) | Self::Http { .. } | Self::Transport(_) => 502,
            Self::KeyNotFound(_) | Self::JwksFetchFailed(_) | Self::Internal(_) => 500,
        }
    }
}

/// Why an identity could not be resolved from a token.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The provider or the validator rejected the token.
    #[error("token rejected: {0}")]
    Rejected(String),

    /// The resolver could not reach a decision.
    #[error("identity resolution unavailable: {0}")]
    Unavailable(String),
}

impl From<AuthError> for ResolveError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::JwksFetchFailed(_) | AuthError::Transport(_) | AuthError::Internal(_) => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Rejected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display() {
        let err = AuthError::provider("invalid_grant", Some("Code not valid".into()));
        assert_eq!(err.to_string(), "provider error: invalid_grant (Code not valid)");

        let bare = AuthError::provider("invalid_grant", None);
        assert_eq!(bare.to_string(), "provider error: invalid_grant");
    }

    #[test]
    fn recoverable_errors() {
        assert!(AuthError::provider("invalid_grant", None).is_recoverable());
        assert!(AuthError::Http { status: 503 }.is_recoverable());
        assert!(AuthError::Transport("reset".into()).is_recoverable());
        assert!(!AuthError::InvalidSignature.is_recoverable());
        assert!(!AuthError::Internal("x".into()).is_recoverable());
    }

    #[test]
    fn resolve_error_classification() {
        assert!(matches!(
            ResolveError::from(AuthError::TokenExpired),
            ResolveError::Rejected(_)
        ));
        assert!(matches!(
            ResolveError::from(AuthError::JwksFetchFailed("down".into())),
            ResolveError::Unavailable(_)
        ));
    }
}
