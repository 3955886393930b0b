//! API error types and responses.
//!
//! Every failure leaves the gateway as `{"error": {"code", "message"}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use keygate_auth::AuthError;
use keygate_session::SessionError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid authentication.
    #[error("unauthorized")]
    Unauthorized,

    /// The endpoint does not exist or is disabled.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The login callback did not match the pending login.
    #[error("login state mismatch")]
    InvalidState,

    /// The identity provider rejected the grant.
    #[error("provider rejected the request: {0}")]
    ProviderRejected(String),

    /// The identity provider could not be used.
    #[error("identity provider unavailable: {0}")]
    BadGateway(String),

    /// A dependency could not answer.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::InvalidState | Self::ProviderRejected(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::InvalidState => "login_state_mismatch",
            Self::ProviderRejected(_) => "provider_rejected",
            Self::BadGateway(_) => "bad_gateway",
            Self::Unavailable(_) => "unavailable",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Provider { error, description } => Self::ProviderRejected(
                description.map_or_else(|| error.clone(), |d| format!("{error}: {d}")),
            ),
            AuthError::TokenExpired
            | AuthError::InvalidSignature
            | AuthError::InvalidIssuer
            | AuthError::InvalidAudience
            | AuthError::MissingClaim(_)
            | AuthError::InvalidToken(_) => Self::Unauthorized,
            AuthError::InvalidTokenResponse(_) | AuthError::Http { .. } | AuthError::Transport(_) => {
                tracing::warn!(error = %err, "Identity provider call failed");
                Self::BadGateway(err.to_string())
            }
            AuthError::KeyNotFound(_) | AuthError::JwksFetchFailed(_) | AuthError::Internal(_) => {
                tracing::error!(error = %err, "Auth internal error");
                Self::Internal("authentication service error".to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidOAuthState => Self::InvalidState,
            SessionError::InvalidBearerToken(_) | SessionError::RefreshFailed(_) => {
                Self::Unauthorized
            }
            SessionError::IdentityUnavailable(reason) => Self::Unavailable(reason),
            SessionError::Auth(auth_err) => Self::from(auth_err),
            SessionError::Store(store_err) => {
                tracing::error!(error = %store_err, "Store error");
                Self::Internal("storage error".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_codes() {
        assert_eq!(
            ApiError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::NotFound("test".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::InvalidState.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::BadGateway("test".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Internal("test".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn provider_errors_map_to_rejection() {
        let err = ApiError::from(AuthError::provider("invalid_grant", Some("Code not valid".into())));
        assert_eq!(err.code(), "provider_rejected");
        assert_eq!(
            err.to_string(),
            "provider rejected the request: invalid_grant: Code not valid"
        );

        let err = ApiError::from(AuthError::Http { status: 503 });
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn session_errors() {
        assert_eq!(
            ApiError::from(SessionError::InvalidOAuthState).code(),
            "login_state_mismatch"
        );
        assert_eq!(
            ApiError::from(SessionError::IdentityUnavailable("down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
