//! Browser-side companion for keygate.
//!
//! The companion runs the authorization-code + PKCE login in a single-threaded
//! page context, keeps the resulting tokens in local storage, and wraps
//! outbound calls so they carry a bearer token and survive one expired-token
//! 401 through a silent refresh.
//!
//! Browser facilities are reached through small seams so the state machine
//! can run anywhere:
//!
//! - [`Storage`] for local storage ([`MemoryStorage`] in-process)
//! - [`Navigator`] for the page location ([`RecordingNavigator`] in-process)
//! - [`CompanionEndpoints`] for the gateway ([`HttpEndpoints`] over `reqwest`)
//! - [`Clock`](keygate_core::Clock) for expiry checks
//!
//! # Example
//!
//! ```no_run
//! use std::rc::Rc;
//! use keygate_companion::{
//!     ClientSession, CompanionConfig, HttpEndpoints, MemoryStorage, RecordingNavigator,
//! };
//! use keygate_core::SystemClock;
//!
//! # async fn example() -> Result<(), keygate_companion::CompanionError> {
//! let config = CompanionConfig {
//!     gateway_url: "https://app.example.com/api".to_string(),
//!     ..CompanionConfig::default()
//! };
//! let session = ClientSession::new(
//!     config.clone(),
//!     Rc::new(MemoryStorage::new()),
//!     Rc::new(RecordingNavigator::new("https://app.example.com/")),
//!     Rc::new(HttpEndpoints::new(config)),
//!     Rc::new(SystemClock),
//! );
//!
//! session.subscribe(|event| println!("auth event: {}", event.name()));
//! session.fire_pending_events();
//!
//! if !session.handle_login_callback().await? && !session.is_authenticated().await {
//!     session.start_login_flow(Some("/dashboard")).await?;
//! }
//!
//! let request = session
//!     .http_client()
//!     .get("https://app.example.com/api/profile")
//!     .build()?;
//! let response = session.authenticated_fetch(request).await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod fetch;
pub mod inflight;
pub mod navigator;
pub mod session;
pub mod storage;

pub use config::CompanionConfig;
pub use endpoints::{CompanionEndpoints, HttpEndpoints};
pub use error::{CompanionError, Result};
pub use events::{AuthEvent, Event, EventBus, ListenerId};
pub use inflight::InFlight;
pub use navigator::{Navigator, RecordingNavigator};
pub use session::{strip_callback_params, ClientSession};
pub use storage::{keys, MemoryStorage, Storage};
