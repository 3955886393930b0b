//! The redirect seam.
//!
//! Every flow operation ends either with nothing to do or with a place to send
//! the user. Operations return `Option<Redirect>` and the host decides how to
//! realise it (an HTTP 302, a channel message, a browser navigation).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A redirect target produced by a flow operation or a hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    location: String,
}

impl Redirect {
    /// Create a redirect to `location`.
    #[must_use]
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// The target URL.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Consume the redirect, returning the target URL.
    #[must_use]
    pub fn into_location(self) -> String {
        self.location
    }
}

impl fmt::Display for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)
    }
}
