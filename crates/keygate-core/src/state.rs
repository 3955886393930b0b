//! One-shot OAuth login state.

use serde::{Deserialize, Serialize};

/// CSRF nonce, PKCE verifier and post-login return URL.
///
/// Lives only between login initiation and the callback, and is removed
/// before the authorization code is exchanged whatever the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    /// One-time CSRF nonce echoed back by the provider as `state`.
    pub nonce: String,
    /// PKCE code verifier.
    pub code_verifier: String,
    /// Where to send the user after a successful login.
    pub return_to: Option<String>,
}

impl OAuthState {
    /// Whether the `state` value from the callback query matches this nonce.
    #[must_use]
    pub fn matches(&self, state: Option<&str>) -> bool {
        state.is_some_and(|s| !s.is_empty() && s == self.nonce)
    }
}
