//! Future cache keyed by operation name.
//!
//! While an operation is pending, every caller gets a clone of the same
//! [`Shared`] future. The entry removes itself when the operation settles, so
//! the next call starts afresh.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};

type Pending<T> = Rc<RefCell<HashMap<&'static str, Shared<LocalBoxFuture<'static, T>>>>>;

/// Memoises pending operations by name.
pub struct InFlight<T: Clone + 'static> {
    pending: Pending<T>,
}

impl<T: Clone + 'static> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            pending: Rc::new(RefCell::new(HashMap::new())),
        }
    }
}

impl<T: Clone + 'static> InFlight<T> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the pending `key` operation, or start one with `start`.
    pub fn run<F, Fut>(&self, key: &'static str, start: F) -> Shared<LocalBoxFuture<'static, T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + 'static,
    {
        if let Some(pending) = self.pending.borrow().get(key) {
            tracing::trace!(operation = key, "Joining pending operation");
            return pending.clone();
        }

        let registry = Rc::downgrade(&self.pending);
        let operation = start();
        let shared = async move {
            let output = operation.await;
            if let Some(registry) = registry.upgrade() {
                registry.borrow_mut().remove(key);
            }
            output
        }
        .boxed_local()
        .shared();

        self.pending.borrow_mut().insert(key, shared.clone());
        shared
    }

    /// Whether `key` is pending.
    #[must_use]
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.borrow().contains_key(key)
    }
}
