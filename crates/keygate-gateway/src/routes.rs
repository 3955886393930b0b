//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{endpoints, flow, health};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Companion endpoints (JSON, individually switchable)
/// - `POST /auth-login-url` - Authorize URL for a PKCE login
/// - `POST /auth-logout-url` - End-session URL
/// - `POST /auth-exchange-code-for-token` - Redeem an authorization code
/// - `POST /auth-refresh-token` - Redeem a refresh token
///
/// ## Session flow (cookie-bound)
/// - `GET /login` - Start a login, `302` to the provider
/// - `GET /callback` - Provider callback, `302` to the return URL
/// - `GET /logout` - End the session, `302` to the provider
/// - `GET /me` - Current identity (bearer header or session cookie)
pub fn create_router(state: GatewayState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health::health))
        // Companion
        .route("/auth-login-url", post(endpoints::login_url))
        .route("/auth-logout-url", post(endpoints::logout_url))
        .route(
            "/auth-exchange-code-for-token",
            post(endpoints::exchange_code),
        )
        .route("/auth-refresh-token", post(endpoints::refresh_token))
        // Session flow
        .route("/login", get(flow::login))
        .route("/callback", get(flow::callback))
        .route("/logout", get(flow::logout))
        .route("/me", get(flow::me))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
