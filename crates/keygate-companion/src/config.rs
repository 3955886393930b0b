//! Companion configuration.

use chrono::Duration;
use serde::Deserialize;

/// Where the gateway lives and how eagerly tokens are refreshed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Base URL of the keygate gateway.
    pub gateway_url: String,
    /// Where to land after login when the caller names no target.
    pub default_redirect: Option<String>,
    /// A token this close to expiry is refreshed before use, in seconds.
    pub refresh_skew_seconds: i64,
    /// Timeout for every gateway request, in seconds.
    pub request_timeout_seconds: u64,
}

impl CompanionConfig {
    /// URL of the gateway endpoint `name`.
    #[must_use]
    pub fn endpoint_url(&self, name: &str) -> String {
        format!("{}/{name}", self.gateway_url.trim_end_matches('/'))
    }

    /// Refresh skew as a `Duration`.
    #[must_use]
    pub fn refresh_skew(&self) -> Duration {
        Duration::try_seconds(self.refresh_skew_seconds.max(0)).unwrap_or_else(Duration::zero)
    }

    pub(crate) fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.request_timeout_seconds))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            })
    }
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8080".to_string(),
            default_redirect: None,
            refresh_skew_seconds: 10,
            request_timeout_seconds: 10,
        }
    }
}
