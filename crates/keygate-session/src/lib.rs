//! Authentication state machines for keygate.
//!
//! Two flavours share the same provider, resolver and redirect conventions:
//!
//! - [`StatefulAuthenticator`]: server-side sessions. Drives the
//!   authorization-code + PKCE login, keeps the token in a [`SessionStore`],
//!   refreshes it when it expires and invalidates it when the realm epoch
//!   moves.
//! - [`BearerAuthenticator`]: stateless requests that carry their own token
//!   in a [`BearerContext`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Gateway (HTTP)                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ per request
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   StatefulAuthenticator                     │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  login /    │ │ authenticate│ │  refresh / logout   │    │
//! │  │  callback   │ │  / check    │ │                     │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌──────────────┬──────┴───────┬──────────────┐
//!        ▼              ▼              ▼              ▼
//!  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//!  │ Session  │   │ Identity │   │  Epoch   │   │ Identity │
//!  │  Store   │   │ Provider │   │  Gate    │   │ Resolver │
//!  └──────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keygate_auth::{AuthConfig, EpochGate, RealmProvider, UserInfoResolver};
//! use keygate_core::{SessionId, SystemClock};
//! use keygate_session::{AuthServices, AuthenticatorConfig, DefaultHooks, SessionStore};
//! use keygate_store::MemoryBackend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth = AuthConfig::default();
//! let clock = Arc::new(SystemClock);
//! let provider = Arc::new(RealmProvider::new(auth.clone(), clock.clone()));
//! let epoch = Arc::new(EpochGate::new(provider.clone(), clock.clone(), auth.epoch_cache_seconds));
//!
//! let services = AuthServices::new(
//!     provider,
//!     epoch,
//!     Arc::new(UserInfoResolver::new(auth)),
//!     clock,
//!     Arc::new(DefaultHooks),
//!     AuthenticatorConfig::default(),
//! );
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let authenticator = services.authenticator(SessionStore::new(backend, SessionId::generate()));
//!
//! if let Some(redirect) = authenticator.login(Some("/dashboard"))? {
//!     println!("302 -> {}", redirect.location());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod guard;
pub mod hooks;
pub mod stateful;
pub mod stateless;
pub mod store;

pub use config::AuthenticatorConfig;
pub use error::{Result, SessionError};
pub use guard::Guard;
pub use hooks::{CallbackHooks, DefaultHooks};
pub use stateful::{AuthServices, Authentication, StatefulAuthenticator};
pub use stateless::{BearerAuthenticator, BearerContext, BearerOutcome};
pub use store::SessionStore;
