//! Authenticator configuration.

use serde::Deserialize;

/// Settings shared by every per-request authenticator.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatorConfig {
    /// OAuth client identifier, used for client-role lookups.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Callback URL sent with the authorize request and the code exchange.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Where to send the user when no other target is known.
    #[serde(default = "default_redirect")]
    pub default_redirect: String,
}

fn default_client_id() -> String {
    "keygate".to_string()
}

fn default_redirect_uri() -> String {
    "http://localhost:8080/callback".to_string()
}

fn default_redirect() -> String {
    "/".to_string()
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            redirect_uri: default_redirect_uri(),
            default_redirect: default_redirect(),
        }
    }
}

impl AuthenticatorConfig {
    /// The redirect target to use, falling back to `default_redirect`.
    #[must_use]
    pub fn redirect_or_default<'a>(&'a self, redirect: Option<&'a str>) -> &'a str {
        redirect
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.default_redirect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AuthenticatorConfig::default();
        assert_eq!(config.default_redirect, "/");
        assert_eq!(config.redirect_or_default(None), "/");
        assert_eq!(config.redirect_or_default(Some("")), "/");
        assert_eq!(config.redirect_or_default(Some("/app")), "/app");
    }
}
