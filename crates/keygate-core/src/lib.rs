//! Core types and utilities for keygate.
//!
//! This crate provides the foundational types shared by the server-side
//! authenticator, the HTTP gateway and the browser companion:
//!
//! - **Token material**: [`Token`] with its decoded claim map and expiry
//! - **Login round trip**: [`OAuthState`] (CSRF nonce, PKCE verifier, return URL)
//! - **Session invalidation**: [`EpochStamp`] and [`SessionRecord`]
//! - **Identity**: [`Identity`] with explicit claim lookup
//! - **Control flow**: [`Redirect`], the single value every flow operation may yield
//! - **Time**: the [`Clock`] seam with [`SystemClock`] and [`ManualClock`]
//! - **Identifiers**: [`SessionId`]
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use keygate_core::{EpochStamp, SessionRecord, Token};
//!
//! let now = Utc::now();
//! let token = Token::from_expires_in("opaque-access", Some("refresh".into()), None, 300, now);
//! assert!(!token.is_expired(now));
//! assert!(token.is_expired(now + Duration::seconds(301)));
//!
//! let record = SessionRecord::new(token, EpochStamp::Number(0));
//! assert_eq!(record.epoch(), &EpochStamp::Number(0));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod clock;
pub mod epoch;
pub mod error;
pub mod identity;
pub mod ids;
pub mod redirect;
pub mod state;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use epoch::{EpochStamp, SessionRecord};
pub use error::{CoreError, Result};
pub use identity::Identity;
pub use ids::{IdError, SessionId};
pub use redirect::Redirect;
pub use state::OAuthState;
pub use token::{decode_claims, Token};
