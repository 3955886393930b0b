//! Bearer-authenticated requests with one refresh-and-retry.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, Response, StatusCode};

use crate::error::{CompanionError, Result};
use crate::session::ClientSession;
use crate::storage::keys;

impl ClientSession {
    /// HTTP client for building requests passed to
    /// [`ClientSession::authenticated_fetch`].
    #[must_use]
    pub fn http_client(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Send `request` with the stored bearer token.
    ///
    /// On a 401 the token is refreshed once and the request replayed once.
    /// A second 401, a failed refresh, or a request whose body cannot be
    /// replayed hands the 401 response back unchanged.
    ///
    /// # Errors
    ///
    /// Returns `CompanionError::Fetch` if a request cannot be sent at all.
    pub async fn authenticated_fetch(&self, request: Request) -> Result<Response> {
        let replay = request.try_clone();
        let response = self.send_with_token(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(replay) = replay else {
            tracing::debug!("Unauthorized request has a streaming body, not retrying");
            return Ok(response);
        };
        if self.refresh().await.is_err() {
            return Ok(response);
        }

        let response = self.send_with_token(replay).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(url = %response.url(), "Still unauthorized after refresh");
            self.inner
                .fail(CompanionError::RequestStillUnauthorizedAfterRetry);
        }
        Ok(response)
    }

    async fn send_with_token(&self, mut request: Request) -> Result<Response> {
        if let Some(token) = self.inner.storage.get(keys::TOKEN).filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                CompanionError::InvalidTokenResponse(
                    "stored token is not a valid header value".to_string(),
                )
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(self.inner.http.execute(request).await?)
    }
}
