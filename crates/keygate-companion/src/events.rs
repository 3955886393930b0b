//! Events emitted to observers of the companion.
//!
//! `error` events are cancelable: when no listener cancels one, the default
//! reporter runs. The stock reporter logs through `tracing`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::error::CompanionError;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Login, logout or refresh changed whether the user is authenticated.
    AuthStateChanged {
        /// Whether a token is now held.
        authenticated: bool,
    },
    /// A login completed; fired on the page load after the redirect.
    Login,
    /// A logout completed; fired on the page load after the redirect.
    Logout,
    /// The token was refreshed.
    TokenRefresh,
    /// Something failed.
    Error(CompanionError),
}

impl AuthEvent {
    /// Event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AuthStateChanged { .. } => "auth-state-changed",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::TokenRefresh => "token-refresh",
            Self::Error(_) => "error",
        }
    }
}

/// An event being dispatched.
#[derive(Debug)]
pub struct Event {
    kind: AuthEvent,
    cancelled: Cell<bool>,
}

impl Event {
    /// The event payload.
    #[must_use]
    pub const fn kind(&self) -> &AuthEvent {
        &self.kind
    }

    /// Event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Only `error` events can be cancelled.
    #[must_use]
    pub const fn is_cancelable(&self) -> bool {
        matches!(self.kind, AuthEvent::Error(_))
    }

    /// Skip the default reporter for this event. No-op on other events.
    pub fn cancel(&self) {
        if self.is_cancelable() {
            self.cancelled.set(true);
        }
    }

    /// Whether a listener cancelled the event.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&Event)>;
type Reporter = Rc<dyn Fn(&CompanionError)>;

/// Listener registry.
pub struct EventBus {
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_id: Cell<u64>,
    reporter: RefCell<Reporter>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            reporter: RefCell::new(Rc::new(log_error)),
        }
    }
}

impl EventBus {
    /// Create a bus with the `tracing` reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for every event.
    pub fn subscribe(&self, listener: impl Fn(&Event) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Replace the reporter run for uncancelled errors.
    pub fn set_reporter(&self, reporter: impl Fn(&CompanionError) + 'static) {
        *self.reporter.borrow_mut() = Rc::new(reporter);
    }

    /// Dispatch `kind` to every listener. Returns whether it was cancelled.
    pub fn emit(&self, kind: AuthEvent) -> bool {
        let event = Event {
            kind,
            cancelled: Cell::new(false),
        };

        // Listeners may subscribe or unsubscribe while being called.
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&event);
        }

        if let AuthEvent::Error(error) = &event.kind {
            if !event.is_cancelled() {
                let reporter = Rc::clone(&self.reporter.borrow());
                reporter(error);
            }
        }
        event.is_cancelled()
    }
}

fn log_error(error: &CompanionError) {
    tracing::error!(code = error.code(), error = %error, "Authentication error");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_bus() -> (EventBus, Rc<RefCell<Vec<String>>>, Rc<Cell<usize>>) {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let reported = Rc::new(Cell::new(0));

        let sink = Rc::clone(&seen);
        bus.subscribe(move |event| sink.borrow_mut().push(event.name().to_string()));
        let count = Rc::clone(&reported);
        bus.set_reporter(move |_| count.set(count.get() + 1));

        (bus, seen, reported)
    }

    #[test]
    fn listeners_see_events_in_order() {
        let (bus, seen, reported) = recording_bus();

        bus.emit(AuthEvent::Login);
        bus.emit(AuthEvent::AuthStateChanged {
            authenticated: true,
        });

        assert_eq!(*seen.borrow(), vec!["login", "auth-state-changed"]);
        assert_eq!(reported.get(), 0);
    }

    #[test]
    fn uncancelled_errors_reach_the_reporter() {
        let (bus, _seen, reported) = recording_bus();

        assert!(!bus.emit(AuthEvent::Error(CompanionError::CsrfStateMismatch)));
        assert_eq!(reported.get(), 1);
    }

    #[test]
    fn cancelled_errors_skip_the_reporter() {
        let (bus, _seen, reported) = recording_bus();
        bus.subscribe(Event::cancel);

        assert!(bus.emit(AuthEvent::Error(CompanionError::CsrfStateMismatch)));
        assert_eq!(reported.get(), 0);
    }

    #[test]
    fn non_error_events_cannot_be_cancelled() {
        let (bus, _seen, _reported) = recording_bus();
        bus.subscribe(Event::cancel);

        assert!(!bus.emit(AuthEvent::Logout));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let id = bus.subscribe(move |_| c.set(c.get() + 1));

        bus.emit(AuthEvent::Login);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(AuthEvent::Login);

        assert_eq!(count.get(), 1);
    }
}
