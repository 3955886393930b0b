//! Browser location seam.

use std::cell::RefCell;

use crate::error::Result;

/// Reads the current page URL and sends the browser elsewhere.
pub trait Navigator {
    /// The URL of the current page.
    fn current_url(&self) -> String;

    /// Navigate to `url`.
    ///
    /// # Errors
    ///
    /// Returns `CompanionError::Navigation` if the navigation cannot start.
    fn navigate(&self, url: &str) -> Result<()>;
}

/// A [`Navigator`] that records navigations instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    current: RefCell<String>,
    visited: RefCell<Vec<String>>,
}

impl RecordingNavigator {
    /// Start on `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            current: RefCell::new(url.into()),
            visited: RefCell::new(Vec::new()),
        }
    }

    /// Simulate a page load of `url` (e.g. the provider redirecting back).
    pub fn load(&self, url: impl Into<String>) {
        *self.current.borrow_mut() = url.into();
    }

    /// Every URL navigated to, oldest first.
    #[must_use]
    pub fn visited(&self) -> Vec<String> {
        self.visited.borrow().clone()
    }

    /// The most recent navigation target.
    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.visited.borrow().last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn current_url(&self) -> String {
        self.current.borrow().clone()
    }

    fn navigate(&self, url: &str) -> Result<()> {
        self.visited.borrow_mut().push(url.to_string());
        *self.current.borrow_mut() = url.to_string();
        Ok(())
    }
}
