//! Keygate Gateway - HTTP front end for the OpenID-Connect login flow.
//!
//! This is the main entry point for the gateway service. Settings come from
//! the environment:
//!
//! | Variable | Default |
//! |---|---|
//! | `LISTEN_ADDR` | `0.0.0.0:8080` |
//! | `DATA_DIR` | unset: sessions are kept in memory |
//! | `KEYGATE_BASE_URL` | `http://localhost:8180` |
//! | `KEYGATE_REALM` | `master` |
//! | `KEYGATE_CLIENT_ID` | `keygate` |
//! | `KEYGATE_CLIENT_SECRET` | unset (public client) |
//! | `KEYGATE_REDIRECT_URI` | `http://localhost:8080/callback` |
//! | `KEYGATE_DEFAULT_REDIRECT` | `/` |
//! | `KEYGATE_AUDIENCE` | unset: `aud` is not checked |
//! | `KEYGATE_REFRESH_ENABLED` | `true` |

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use keygate_auth::{AuthConfig, EpochGate, JwksResolver, RealmProvider, UserInfoResolver};
use keygate_core::{Clock, SystemClock};
use keygate_gateway::{create_router, GatewayConfig, GatewayState};
use keygate_session::{AuthServices, AuthenticatorConfig, BearerAuthenticator, DefaultHooks};
use keygate_store::{MemoryBackend, RocksBackend, SessionBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,keygate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Keygate Gateway");

    // Load configuration from environment
    let defaults = AuthConfig::default();
    let auth_config = AuthConfig {
        base_url: std::env::var("KEYGATE_BASE_URL").unwrap_or(defaults.base_url),
        realm: std::env::var("KEYGATE_REALM").unwrap_or(defaults.realm),
        client_id: std::env::var("KEYGATE_CLIENT_ID").unwrap_or(defaults.client_id),
        client_secret: std::env::var("KEYGATE_CLIENT_SECRET").ok(),
        redirect_uri: std::env::var("KEYGATE_REDIRECT_URI").unwrap_or(defaults.redirect_uri),
        audience: std::env::var("KEYGATE_AUDIENCE").ok(),
        ..defaults
    };

    let mut gateway_config = GatewayConfig::default();
    if let Ok(listen_addr) = std::env::var("LISTEN_ADDR") {
        gateway_config.listen_addr = listen_addr;
    }
    gateway_config.data_dir = std::env::var("DATA_DIR").ok();
    gateway_config.features.refresh = std::env::var("KEYGATE_REFRESH_ENABLED")
        .map_or(true, |v| !matches!(v.trim(), "false" | "0" | "no" | "off"));

    let authenticator_config = AuthenticatorConfig {
        client_id: auth_config.client_id.clone(),
        redirect_uri: auth_config.redirect_uri.clone(),
        default_redirect: std::env::var("KEYGATE_DEFAULT_REDIRECT")
            .unwrap_or_else(|_| "/".into()),
    };

    tracing::info!(
        listen_addr = %gateway_config.listen_addr,
        data_dir = ?gateway_config.data_dir,
        realm_url = %auth_config.realm_url(),
        client_id = %auth_config.client_id,
        refresh_enabled = gateway_config.features.refresh,
        "Gateway configuration loaded"
    );

    // Session storage
    let backend: Arc<dyn SessionBackend> = match &gateway_config.data_dir {
        Some(data_dir) => {
            tracing::info!(path = %data_dir, "Opening RocksDB session store");
            Arc::new(RocksBackend::open(data_dir)?)
        }
        None => {
            tracing::warn!("No DATA_DIR set - sessions are kept in memory");
            Arc::new(MemoryBackend::new())
        }
    };

    // Provider, epoch gate and resolvers
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let provider = Arc::new(RealmProvider::new(auth_config.clone(), Arc::clone(&clock)));
    let epoch = Arc::new(EpochGate::new(
        provider.clone(),
        Arc::clone(&clock),
        auth_config.epoch_cache_seconds,
    ));
    let session_resolver = Arc::new(UserInfoResolver::new(auth_config.clone()));
    let bearer_resolver = Arc::new(JwksResolver::new(auth_config));

    let services = AuthServices::new(
        provider.clone(),
        epoch,
        session_resolver,
        Arc::clone(&clock),
        Arc::new(DefaultHooks),
        authenticator_config,
    );
    let bearer = BearerAuthenticator::new(bearer_resolver, clock);
    tracing::info!("Authenticators initialized");

    let listen_addr = gateway_config.listen_addr.clone();
    let state = GatewayState::new(provider, services, bearer, backend, gateway_config);
    let app = create_router(state);

    // Start HTTP server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
