//! Error types for the companion.

use thiserror::Error;

/// Errors surfaced by the companion, either returned or emitted as `error`
/// events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompanionError {
    /// The callback's `state` does not match the one stored at login.
    #[error("login state does not match the pending login")]
    CsrfStateMismatch,

    /// The callback carried no authorization code.
    #[error("login callback carried no authorization code")]
    MissingAuthorizationCode,

    /// No PKCE verifier was stored for the pending login.
    #[error("no PKCE verifier stored for the pending login")]
    MissingPkceVerifier,

    /// The gateway answered with unusable token material.
    #[error("invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// The token could not be refreshed.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The request was still unauthorized after a refresh and one retry.
    #[error("request still unauthorized after refresh and retry")]
    RequestStillUnauthorizedAfterRetry,

    /// The gateway has the named endpoint switched off.
    #[error("optional feature disabled: {0}")]
    OptionalFeatureDisabled(String),

    /// A gateway call failed.
    #[error("fetch failed: {message}")]
    Fetch {
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// What went wrong.
        message: String,
    },

    /// Local storage refused a write.
    #[error("storage error: {0}")]
    Storage(String),

    /// The browser could not be sent somewhere.
    #[error("navigation error: {0}")]
    Navigation(String),
}

/// Result type for companion operations.
pub type Result<T> = std::result::Result<T, CompanionError>;

impl CompanionError {
    /// Stable code carried by `error` events.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CsrfStateMismatch => "login-state-mismatch",
            Self::MissingAuthorizationCode => "login-missing-code",
            Self::MissingPkceVerifier => "login-missing-verifier",
            Self::InvalidTokenResponse(_) => "invalid-token-response",
            Self::RefreshFailed(_) => "refresh-failed",
            Self::RequestStillUnauthorizedAfterRetry => "request-unauthorized-after-retry",
            Self::OptionalFeatureDisabled(_) => "optional-feature-disabled",
            Self::Fetch { .. } => "fetch-failed",
            Self::Storage(_) => "storage-failed",
            Self::Navigation(_) => "navigation-failed",
        }
    }

    pub(crate) fn fetch(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Fetch {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CompanionError {
    fn from(err: reqwest::Error) -> Self {
        Self::fetch(err.status().map(|s| s.as_u16()), err.to_string())
    }
}
