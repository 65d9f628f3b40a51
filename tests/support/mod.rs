//! Shared fixtures for router-level tests
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
    Router,
};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use warden::{
    api::{create_router, AppState},
    audit::{AuditLogEntry, MemoryAuditStorage},
    auth::password::hash_password,
    clock::ManualClock,
    config::{Config, Environment, RateLimitPolicy, SeedUser},
};

pub const START_MS: i64 = 1_700_000_000_000;
pub const PASSWORD: &str = "Correct-Horse-42!";
pub const CLIENT_IP: &str = "1.2.3.4";

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const VIEWER_EMAIL: &str = "viewer@example.com";
pub const ATTACKER_TARGET: &str = "attacker@example.com";
pub const DISABLED_EMAIL: &str = "disabled@example.com";

// Argon2 is slow in debug builds; hash once per test binary
static PASSWORD_HASH: Lazy<String> = Lazy::new(|| hash_password(PASSWORD).unwrap());

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub audit: MemoryAuditStorage,
    pub clock: ManualClock,
}

fn seed(id: &str, email: &str, role: &str, active: bool) -> SeedUser {
    SeedUser {
        id: id.to_string(),
        email: email.to_string(),
        name: format!("User {}", id),
        role: role.to_string(),
        password_hash: Some(PASSWORD_HASH.clone()),
        password: None,
        active,
    }
}

/// Test configuration with a generous auth budget so throttle behaviour is
/// observable without tripping the gatekeeper first
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.environment = Environment::Test;
    config.auth.jwt_secret = Some("integration-test-secret-with-enough-length".to_string());
    config.rate_limit.auth = RateLimitPolicy::new(100, 900);
    config.audit.batch_size = 1;
    config.audit.flush_interval_ms = 10;
    config.auth.seed_users = vec![
        seed("1", ADMIN_EMAIL, "admin", true),
        seed("2", VIEWER_EMAIL, "viewer", true),
        seed("3", ATTACKER_TARGET, "security_analyst", true),
        seed("4", DISABLED_EMAIL, "viewer", false),
    ];
    config
}

pub async fn build_app(config: Config) -> TestApp {
    let clock = ManualClock::new(START_MS);
    let audit = MemoryAuditStorage::new();
    let state = AppState::from_config(config, Arc::new(clock.clone()), Arc::new(audit.clone()))
        .await
        .unwrap();

    TestApp {
        router: create_router(state.clone()),
        state,
        audit,
        clock,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> Response<Body> {
        self.send(json_request(
            "POST",
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        ))
        .await
    }

    /// Log in and return the session token from the cookie
    pub async fn token_for(&self, email: &str) -> String {
        let response = self.login(email, PASSWORD).await;
        assert_eq!(response.status(), 200, "login for {} failed", email);
        cookie_value(&response, "auth_token").expect("auth_token cookie")
    }

    /// Audit entries after the batch processor has flushed
    pub async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.audit.entries().await
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::USER_AGENT, "integration-test")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .body(Body::empty())
        .unwrap()
}

pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response).into_iter().find_map(|cookie| {
        let (pair, _) = cookie.split_once(';')?;
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}
