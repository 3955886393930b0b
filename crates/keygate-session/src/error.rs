//! Error types for the authentication state machines.

use thiserror::Error;

/// A result type using `SessionError`.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while driving a login or checking a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The callback's `state` does not match the stored login nonce.
    #[error("OAuth state mismatch")]
    InvalidOAuthState,

    /// The `Authorization` header does not carry a usable bearer token.
    #[error("invalid bearer token: {0}")]
    InvalidBearerToken(String),

    /// The session could not be refreshed.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The identity resolver could not reach a decision.
    #[error("identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// Session storage failed.
    #[error("storage error: {0}")]
    Store(#[from] keygate_store::StoreError),

    /// Identity provider error.
    #[error("authentication error: {0}")]
    Auth(#[from] keygate_auth::AuthError),
}

impl SessionError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidOAuthState => 400,
            Self::InvalidBearerToken(_) | Self::RefreshFailed(_) => 401,
            Self::IdentityUnavailable(_) => 503,
            Self::Store(_) => 500,
            Self::Auth(e) => e.http_status_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keygate_auth::AuthError;

    #[test]
    fn status_codes() {
        assert_eq!(SessionError::InvalidOAuthState.http_status_code(), 400);
        assert_eq!(
            SessionError::InvalidBearerToken("empty".into()).http_status_code(),
            401
        );
        assert_eq!(
            SessionError::IdentityUnavailable("down".into()).http_status_code(),
            503
        );
        assert_eq!(
            SessionError::from(AuthError::Http { status: 500 }).http_status_code(),
            502
        );
    }
}
