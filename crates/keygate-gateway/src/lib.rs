//! HTTP gateway for keygate.
//!
//! The gateway hosts both authentication variants behind one axum router:
//!
//! - the endpoints the browser companion calls to build provider URLs and
//!   redeem codes and refresh tokens
//! - a cookie-bound server-side login flow driven by
//!   [`StatefulAuthenticator`](keygate_session::StatefulAuthenticator)
//! - bearer-token authentication of `/me` through
//!   [`BearerAuthenticator`](keygate_session::BearerAuthenticator)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Browser / companion / API clients              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       keygate-gateway                        │
//! │  ┌──────────────┐ ┌──────────────────┐ ┌────────────────┐   │
//! │  │ Cookie /     │ │ Companion        │ │ Session flow   │   │
//! │  │ bearer       │ │ endpoints        │ │ /login /logout │   │
//! │  │ extractors   │ │ /auth-*          │ │ /callback /me  │   │
//! │  └──────────────┘ └──────────────────┘ └────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │ Identity │   │ Session  │   │ Identity │
//!        │ provider │   │ backend  │   │ resolver │
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use keygate_auth::{AuthConfig, EpochGate, RealmProvider, UserInfoResolver};
//! use keygate_core::SystemClock;
//! use keygate_gateway::{create_router, GatewayConfig, GatewayState};
//! use keygate_session::{AuthServices, AuthenticatorConfig, BearerAuthenticator, DefaultHooks};
//! use keygate_store::MemoryBackend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let auth_config = AuthConfig::default();
//! let clock = Arc::new(SystemClock);
//! let provider = Arc::new(RealmProvider::new(auth_config.clone(), clock.clone()));
//! let resolver = Arc::new(UserInfoResolver::new(auth_config.clone()));
//! let epoch = Arc::new(EpochGate::new(provider.clone(), clock.clone(), 30));
//!
//! let services = AuthServices::new(
//!     provider.clone(),
//!     epoch,
//!     resolver.clone(),
//!     clock.clone(),
//!     Arc::new(DefaultHooks),
//!     AuthenticatorConfig::default(),
//! );
//! let bearer = BearerAuthenticator::new(resolver, clock);
//!
//! let state = GatewayState::new(
//!     provider,
//!     services,
//!     bearer,
//!     Arc::new(MemoryBackend::new()),
//!     GatewayConfig::default(),
//! );
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::{BearerToken, SessionCookie};
pub use config::{Features, GatewayConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
