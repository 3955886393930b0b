//! Router-level tests for the gateway, with the provider and resolver mocked.

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Duration;
use serde_json::{json, Value};

use keygate_auth::{EpochGate, MockIdentityProvider, MockIdentityResolver};
use keygate_core::{Clock, EpochStamp, ManualClock, Token};
use keygate_gateway::{create_router, GatewayConfig, GatewayState};
use keygate_session::{AuthServices, AuthenticatorConfig, BearerAuthenticator, DefaultHooks};
use keygate_store::MemoryBackend;

struct Harness {
    server: TestServer,
    provider: Arc<MockIdentityProvider>,
    resolver: Arc<MockIdentityResolver>,
}

fn harness_with(config: GatewayConfig) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let token = Token::new(
        "access-1",
        Some("refresh-1".to_string()),
        Some("id-1".to_string()),
        clock.now() + Duration::hours(1),
    );
    let provider = Arc::new(MockIdentityProvider::new(token, EpochStamp::Number(1)));
    let resolver = Arc::new(MockIdentityResolver::default());
    let epoch = Arc::new(EpochGate::new(provider.clone(), clock.clone(), 0));

    let services = AuthServices::new(
        provider.clone(),
        epoch,
        resolver.clone(),
        clock.clone(),
        Arc::new(DefaultHooks),
        AuthenticatorConfig {
            client_id: "web".to_string(),
            redirect_uri: "http://gateway.test/callback".to_string(),
            default_redirect: "/home".to_string(),
        },
    );
    let bearer = BearerAuthenticator::new(resolver.clone(), clock);

    let state = GatewayState::new(
        provider.clone(),
        services,
        bearer,
        Arc::new(MemoryBackend::new()),
        config,
    );

    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        provider,
        resolver,
    }
}

fn harness() -> Harness {
    harness_with(GatewayConfig::default())
}

/// `name=value` from a `Set-Cookie` header.
fn cookie_pair(set_cookie: &HeaderValue) -> HeaderValue {
    let raw = set_cookie.to_str().unwrap();
    let pair = raw.split(';').next().unwrap();
    HeaderValue::from_str(pair).unwrap()
}

fn query_param(url: &str, name: &str) -> String {
    let query = url.split_once('?').unwrap().1;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .unwrap()
}

#[tokio::test]
async fn session_login_round_trip() {
    let h = harness();

    let login = h
        .server
        .get("/login")
        .add_query_param("redirect", "/app")
        .await;
    assert_eq!(login.status_code(), StatusCode::FOUND);
    let location = login.header("location");
    let location = location.to_str().unwrap();
    assert!(location.starts_with("https://idp.test/auth?"));
    let cookie = cookie_pair(&login.header("set-cookie"));
    let state = query_param(location, "state");

    let callback = h
        .server
        .get("/callback")
        .add_query_param("code", "code-1")
        .add_query_param("state", &state)
        .add_header(COOKIE, cookie.clone())
        .await;
    assert_eq!(callback.status_code(), StatusCode::FOUND);
    assert_eq!(callback.header("location"), "/app");
    assert_eq!(h.provider.exchange_calls(), 1);

    let me = h.server.get("/me").add_header(COOKIE, cookie.clone()).await;
    assert_eq!(me.status_code(), StatusCode::OK);
    assert_eq!(me.json::<Value>()["subject"], "mock-user");

    let logout = h
        .server
        .get("/logout")
        .add_query_param("redirect", "/bye")
        .add_header(COOKIE, cookie.clone())
        .await;
    assert_eq!(logout.status_code(), StatusCode::FOUND);
    let location = logout.header("location");
    let location = location.to_str().unwrap();
    assert!(location.starts_with("https://idp.test/logout?"));
    assert_eq!(query_param(location, "post_logout_redirect_uri"), "%2Fbye");
    assert_eq!(query_param(location, "id_token_hint"), "id-1");
    assert!(logout
        .header("set-cookie")
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    let me = h.server.get("/me").add_header(COOKIE, cookie).await;
    assert_eq!(me.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(me.json::<Value>()["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn callback_state_mismatch_is_rejected() {
    let h = harness();

    let login = h.server.get("/login").await;
    let cookie = cookie_pair(&login.header("set-cookie"));

    let callback = h
        .server
        .get("/callback")
        .add_query_param("code", "code-1")
        .add_query_param("state", "forged")
        .add_header(COOKIE, cookie.clone())
        .await;
    assert_eq!(callback.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        callback.json::<Value>()["error"]["code"],
        "login_state_mismatch"
    );
    assert_eq!(h.provider.exchange_calls(), 0);

    let me = h.server.get("/me").add_header(COOKIE, cookie).await;
    assert_eq!(me.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn callback_without_code_restarts_login() {
    let h = harness();

    let callback = h.server.get("/callback").await;
    assert_eq!(callback.status_code(), StatusCode::FOUND);
    assert!(callback
        .header("location")
        .to_str()
        .unwrap()
        .starts_with("https://idp.test/auth?"));
    assert_eq!(h.provider.exchange_calls(), 0);
}

#[tokio::test]
async fn off_site_redirect_falls_back_to_default() {
    let h = harness();

    let login = h
        .server
        .get("/login")
        .add_query_param("redirect", "https://evil.example.com")
        .await;
    let cookie = cookie_pair(&login.header("set-cookie"));
    let location = login.header("location");
    let state = query_param(location.to_str().unwrap(), "state");

    let callback = h
        .server
        .get("/callback")
        .add_query_param("code", "code-1")
        .add_query_param("state", &state)
        .add_header(COOKIE, cookie)
        .await;
    assert_eq!(callback.header("location"), "/home");
}

#[tokio::test]
async fn me_accepts_bearer_tokens() {
    let h = harness();

    let me = h
        .server
        .get("/me")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer opaque-token"))
        .await;
    assert_eq!(me.status_code(), StatusCode::OK);
    assert_eq!(me.json::<Value>()["subject"], "mock-user");

    h.resolver.reject_all(true);
    let me = h
        .server
        .get("/me")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer opaque-token"))
        .await;
    assert_eq!(me.status_code(), StatusCode::UNAUTHORIZED);

    let me = h
        .server
        .get("/me")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="))
        .await;
    assert_eq!(me.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_reports_unavailable_resolver() {
    let h = harness();
    h.resolver.set_unavailable(true);

    let me = h
        .server
        .get("/me")
        .add_header(AUTHORIZATION, HeaderValue::from_static("Bearer opaque-token"))
        .await;
    assert_eq!(me.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn companion_url_endpoints() {
    let h = harness();

    let login = h
        .server
        .post("/auth-login-url")
        .json(&json!({
            "redirectUrl": "https://app.test/cb",
            "codeChallenge": "challenge",
            "state": "nonce"
        }))
        .await;
    assert_eq!(login.status_code(), StatusCode::OK);
    let url = login.json::<Value>()["url"].as_str().unwrap().to_string();
    assert_eq!(query_param(&url, "state"), "nonce");
    assert_eq!(query_param(&url, "code_challenge"), "challenge");

    let logout = h
        .server
        .post("/auth-logout-url")
        .json(&json!({"redirectUrl": "https://app.test/", "idToken": "id-1"}))
        .await;
    let url = logout.json::<Value>()["url"].as_str().unwrap().to_string();
    assert_eq!(query_param(&url, "id_token_hint"), "id-1");
}

#[tokio::test]
async fn companion_token_endpoints() {
    let h = harness();

    let exchanged = h
        .server
        .post("/auth-exchange-code-for-token")
        .json(&json!({
            "code": "code-1",
            "codeVerifier": "verifier-1",
            "redirectUrl": "https://app.test/cb"
        }))
        .await;
    assert_eq!(exchanged.status_code(), StatusCode::OK);
    let body = exchanged.json::<Value>();
    assert_eq!(body["token"], "access-1");
    assert_eq!(body["refreshToken"], "refresh-1");
    assert_eq!(body["idToken"], "id-1");
    assert!(body["expires"].is_i64());
    assert_eq!(h.provider.last_code_verifier().as_deref(), Some("verifier-1"));

    let refreshed = h
        .server
        .post("/auth-refresh-token")
        .json(&json!({"refreshToken": "refresh-1"}))
        .await;
    assert_eq!(refreshed.status_code(), StatusCode::OK);
    assert_eq!(h.provider.refresh_calls(), 1);
}

#[tokio::test]
async fn provider_rejection_is_a_bad_request() {
    let h = harness();
    h.provider.fail_exchange("invalid_grant");

    let response = h
        .server
        .post("/auth-exchange-code-for-token")
        .json(&json!({
            "code": "stale",
            "codeVerifier": "verifier-1",
            "redirectUrl": "https://app.test/cb"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["error"]["code"],
        "provider_rejected"
    );
}

#[tokio::test]
async fn disabled_refresh_answers_not_found() {
    let mut config = GatewayConfig::default();
    config.features.refresh = false;
    let h = harness_with(config);

    let response = h
        .server
        .post("/auth-refresh-token")
        .json(&json!({"refreshToken": "refresh-1"}))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(h.provider.refresh_calls(), 0);

    let health = h.server.get("/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);
    let body = health.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["features"]["refresh"], false);
    assert_eq!(body["features"]["loginUrl"], true);
}
