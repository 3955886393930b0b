//! Extension points of the callback handler.

use keygate_core::{Redirect, Token};

/// Decides where a callback ends up.
///
/// Both methods have defaults, so implementors only override what they need.
pub trait CallbackHooks: Send + Sync {
    /// Called after a successful code exchange, once the session is stored.
    ///
    /// The default sends the user back to `return_to`, or to
    /// `default_redirect` when the login carried no target.
    fn on_login(
        &self,
        _token: &Token,
        return_to: Option<&str>,
        default_redirect: &str,
    ) -> Option<Redirect> {
        Some(Redirect::to(
            return_to.filter(|r| !r.is_empty()).unwrap_or(default_redirect),
        ))
    }

    /// Called when the callback's `state` does not match the stored nonce.
    ///
    /// Returning `None` turns the mismatch into `SessionError::InvalidOAuthState`.
    fn on_invalid_state(&self) -> Option<Redirect> {
        None
    }
}

/// Hooks with the default behaviour.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl CallbackHooks for DefaultHooks {}
