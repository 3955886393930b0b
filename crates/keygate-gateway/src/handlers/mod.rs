//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod endpoints;
pub mod flow;
pub mod health;
