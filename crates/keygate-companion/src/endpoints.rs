//! Client for the gateway endpoints the companion depends on.
//!
//! A 404 means the gateway has the endpoint switched off and is reported as
//! [`CompanionError::OptionalFeatureDisabled`]; any other non-2xx answer is a
//! plain [`CompanionError::Fetch`].

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use keygate_core::Token;

use crate::config::CompanionConfig;
use crate::error::{CompanionError, Result};

/// `POST /auth-login-url`
pub const LOGIN_URL: &str = "auth-login-url";
/// `POST /auth-logout-url`
pub const LOGOUT_URL: &str = "auth-logout-url";
/// `POST /auth-exchange-code-for-token`
pub const EXCHANGE_CODE: &str = "auth-exchange-code-for-token";
/// `POST /auth-refresh-token`
pub const REFRESH_TOKEN: &str = "auth-refresh-token";

/// Gateway operations used by the login flow.
#[async_trait(?Send)]
pub trait CompanionEndpoints {
    /// Provider authorize URL for a PKCE login.
    async fn login_url(&self, redirect_url: &str, code_challenge: &str, state: &str)
        -> Result<String>;

    /// Provider end-session URL.
    async fn logout_url(&self, redirect_url: &str, id_token: Option<&str>) -> Result<String>;

    /// Redeem an authorization code.
    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_url: &str,
    ) -> Result<Token>;

    /// Redeem a refresh token.
    async fn refresh_token(&self, refresh_token: &str) -> Result<Token>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginUrlBody<'a> {
    redirect_url: &'a str,
    code_challenge: &'a str,
    state: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutUrlBody<'a> {
    redirect_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id_token: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeBody<'a> {
    code: &'a str,
    code_verifier: &'a str,
    redirect_url: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct UrlResponse {
    url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    expires: Option<i64>,
}

impl TryFrom<TokenResponse> for Token {
    type Error = CompanionError;

    fn try_from(body: TokenResponse) -> Result<Self> {
        let access = body
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CompanionError::InvalidTokenResponse("missing token".to_string()))?;
        let expires_at = body
            .expires
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| {
                CompanionError::InvalidTokenResponse("missing or invalid expires".to_string())
            })?;

        Ok(Self::new(
            access,
            body.refresh_token.filter(|t| !t.is_empty()),
            body.id_token.filter(|t| !t.is_empty()),
            expires_at,
        ))
    }
}

/// [`CompanionEndpoints`] over HTTP.
pub struct HttpEndpoints {
    client: reqwest::Client,
    config: CompanionConfig,
}

impl HttpEndpoints {
    /// Create a client for the gateway named in `config`.
    #[must_use]
    pub fn new(config: CompanionConfig) -> Self {
        Self {
            client: config.http_client(),
            config,
        }
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(&self, name: &str, body: &B) -> Result<R> {
        let response = self
            .client
            .post(self.config.endpoint_url(name))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(endpoint = name, "Gateway endpoint disabled");
            return Err(CompanionError::OptionalFeatureDisabled(name.to_string()));
        }
        if !status.is_success() {
            tracing::warn!(endpoint = name, status = status.as_u16(), "Gateway call failed");
            return Err(CompanionError::fetch(
                Some(status.as_u16()),
                format!("{name} answered {status}"),
            ));
        }

        response.json::<R>().await.map_err(|e| {
            CompanionError::InvalidTokenResponse(format!("{name} returned an unreadable body: {e}"))
        })
    }
}

#[async_trait(?Send)]
impl CompanionEndpoints for HttpEndpoints {
    async fn login_url(
        &self,
        redirect_url: &str,
        code_challenge: &str,
        state: &str,
    ) -> Result<String> {
        let body = LoginUrlBody {
            redirect_url,
            code_challenge,
            state,
        };
        let response: UrlResponse = self.post(LOGIN_URL, &body).await?;
        Ok(response.url)
    }

    async fn logout_url(&self, redirect_url: &str, id_token: Option<&str>) -> Result<String> {
        let body = LogoutUrlBody {
            redirect_url,
            id_token,
        };
        let response: UrlResponse = self.post(LOGOUT_URL, &body).await?;
        Ok(response.url)
    }

    async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_url: &str,
    ) -> Result<Token> {
        let body = ExchangeBody {
            code,
            code_verifier,
            redirect_url,
        };
        let response: TokenResponse = self.post(EXCHANGE_CODE, &body).await?;
        response.try_into()
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<Token> {
        let response: TokenResponse = self
            .post(REFRESH_TOKEN, &RefreshBody { refresh_token })
            .await?;
        response.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoints_for(server: &MockServer) -> HttpEndpoints {
        HttpEndpoints::new(CompanionConfig {
            gateway_url: server.uri(),
            ..CompanionConfig::default()
        })
    }

    #[tokio::test]
    async fn exchange_sends_camel_case_and_parses_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth-exchange-code-for-token"))
            .and(body_json(json!({
                "code": "c",
                "codeVerifier": "v",
                "redirectUrl": "https://app.test/"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token": "at",
                "refreshToken": "rt",
                "idToken": null,
                "expires": 1_700_000_000
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = endpoints_for(&server)
            .exchange_code("c", "v", "https://app.test/")
            .await
            .unwrap();
        assert_eq!(token.access_token(), "at");
        assert_eq!(token.refresh_token(), Some("rt"));
        assert_eq!(token.id_token(), None);
        assert_eq!(token.expires_at().timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn not_found_means_feature_disabled() {
        let server = MockServer::start().await;
        Mock::given(path("/auth-refresh-token"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = endpoints_for(&server).refresh_token("rt").await.unwrap_err();
        assert_eq!(
            err,
            CompanionError::OptionalFeatureDisabled("auth-refresh-token".to_string())
        );
    }

    #[tokio::test]
    async fn other_failures_are_fetch_errors() {
        let server = MockServer::start().await;
        Mock::given(path("/auth-login-url"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = endpoints_for(&server)
            .login_url("https://app.test/", "ch", "st")
            .await
            .unwrap_err();
        assert!(matches!(err, CompanionError::Fetch { status: Some(502), .. }));
    }

    #[tokio::test]
    async fn token_without_access_value_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(path("/auth-refresh-token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"token": "", "expires": 1})),
            )
            .mount(&server)
            .await;

        let err = endpoints_for(&server).refresh_token("rt").await.unwrap_err();
        assert_eq!(err.code(), "invalid-token-response");
    }
}
