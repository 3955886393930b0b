//! Gateway configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Endpoints the companion may call; each can be switched off on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all(serialize = "camelCase"))]
pub struct Features {
    /// `POST /auth-login-url`.
    pub login_url: bool,
    /// `POST /auth-logout-url`.
    pub logout_url: bool,
    /// `POST /auth-exchange-code-for-token`.
    pub exchange: bool,
    /// `POST /auth-refresh-token`.
    pub refresh: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            login_url: true,
            logout_url: true,
            exchange: true,
            refresh: true,
        }
    }
}

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Name of the cookie carrying the session ID.
    #[serde(default = "GatewayConfig::default_cookie_name")]
    pub session_cookie_name: String,

    /// Whether the session cookie is marked `Secure`.
    #[serde(default)]
    pub session_cookie_secure: bool,

    /// RocksDB directory for sessions; sessions live in memory when unset.
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Companion endpoint switches.
    #[serde(default)]
    pub features: Features,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    const fn default_max_body() -> usize {
        64 * 1024
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    fn default_cookie_name() -> String {
        "keygate_session".to_string()
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// `Set-Cookie` value binding the browser to `session_id`.
    #[must_use]
    pub fn session_cookie(&self, session_id: &str) -> String {
        format!(
            "{}={session_id}; Path=/; HttpOnly; SameSite=Lax{}",
            self.session_cookie_name,
            if self.session_cookie_secure { "; Secure" } else { "" }
        )
    }

    /// `Set-Cookie` value removing the session cookie.
    #[must_use]
    pub fn expired_session_cookie(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.session_cookie_name
        )
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
            session_cookie_name: Self::default_cookie_name(),
            session_cookie_secure: false,
            data_dir: None,
            features: Features::default(),
        }
    }
}
