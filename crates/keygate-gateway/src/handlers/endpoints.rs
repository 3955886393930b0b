//! Endpoints consumed by the browser companion.
//!
//! All four are JSON `POST`s with camelCase bodies. Each can be switched off
//! in [`Features`](crate::config::Features); a disabled endpoint answers 404
//! so the companion can tell "not offered" apart from "failed".

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use keygate_core::Token;

use crate::error::ApiError;
use crate::state::GatewayState;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request for the provider's authorize URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginUrlBody {
    /// Where the provider sends the browser back to.
    pub redirect_url: String,
    /// S256 PKCE challenge.
    pub code_challenge: String,
    /// CSRF nonce echoed back on the callback.
    pub state: String,
}

/// Request for the provider's end-session URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutUrlBody {
    /// Where the provider sends the browser after logout.
    pub redirect_url: String,
    /// Identity token of the session being ended.
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Request to exchange an authorization code.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeBody {
    /// Authorization code from the callback.
    pub code: String,
    /// PKCE verifier generated when the login started.
    pub code_verifier: String,
    /// Redirect URI used for the authorize request.
    pub redirect_url: String,
}

/// Request to refresh a token.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshBody {
    /// Refresh token to redeem.
    pub refresh_token: String,
}

/// A URL for the browser to navigate to.
#[derive(Debug, Serialize)]
pub struct UrlResponse {
    /// Target URL.
    pub url: String,
}

/// Token material handed to the companion.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    /// Access token.
    pub token: String,
    /// Refresh token, if issued.
    pub refresh_token: Option<String>,
    /// Identity token, if issued.
    pub id_token: Option<String>,
    /// Expiry as unix seconds.
    pub expires: i64,
}

impl From<Token> for TokenResponse {
    fn from(token: Token) -> Self {
        Self {
            token: token.access_token().to_string(),
            refresh_token: token.refresh_token().map(str::to_owned),
            id_token: token.id_token().map(str::to_owned),
            expires: token.expires_at().timestamp(),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

fn require(enabled: bool, name: &str) -> Result<(), ApiError> {
    if enabled {
        Ok(())
    } else {
        tracing::debug!(endpoint = name, "Disabled endpoint called");
        Err(ApiError::NotFound(format!("{name} is disabled")))
    }
}

/// `POST /auth-login-url`
pub async fn login_url(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<LoginUrlBody>,
) -> Result<Json<UrlResponse>, ApiError> {
    require(state.config.features.login_url, "auth-login-url")?;

    let url = state
        .provider
        .authorization_url(&body.redirect_url, &body.code_challenge, &body.state);
    Ok(Json(UrlResponse { url }))
}

/// `POST /auth-logout-url`
pub async fn logout_url(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<LogoutUrlBody>,
) -> Result<Json<UrlResponse>, ApiError> {
    require(state.config.features.logout_url, "auth-logout-url")?;

    let id_token = body.id_token.as_deref().filter(|t| !t.is_empty());
    let url = state
        .provider
        .logout_redirect_url(&body.redirect_url, id_token);
    Ok(Json(UrlResponse { url }))
}

/// `POST /auth-exchange-code-for-token`
pub async fn exchange_code(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<ExchangeBody>,
) -> Result<Json<TokenResponse>, ApiError> {
    require(state.config.features.exchange, "auth-exchange-code-for-token")?;

    if body.code.is_empty() || body.code_verifier.is_empty() {
        return Err(ApiError::BadRequest(
            "code and codeVerifier are required".to_string(),
        ));
    }

    let token = state
        .provider
        .exchange_code(&body.code, &body.code_verifier, &body.redirect_url)
        .await?;
    tracing::debug!("Exchanged authorization code for the companion");

    Ok(Json(token.into()))
}

/// `POST /auth-refresh-token`
pub async fn refresh_token(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<RefreshBody>,
) -> Result<Json<TokenResponse>, ApiError> {
    require(state.config.features.refresh, "auth-refresh-token")?;

    if body.refresh_token.is_empty() {
        return Err(ApiError::BadRequest("refreshToken is required".to_string()));
    }

    let token = state.provider.refresh(&body.refresh_token).await?;
    Ok(Json(token.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn token_response_shape() {
        let expires_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let token = Token::new("access", Some("refresh".into()), None, expires_at);

        let json = serde_json::to_value(TokenResponse::from(token)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "token": "access",
                "refreshToken": "refresh",
                "idToken": null,
                "expires": 1_700_000_000
            })
        );
    }

    #[test]
    fn logout_body_without_id_token() {
        let body: LogoutUrlBody = serde_json::from_str(r#"{"redirectUrl":"/"}"#).unwrap();
        assert_eq!(body.redirect_url, "/");
        assert!(body.id_token.is_none());
    }
}
