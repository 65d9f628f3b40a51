//! Session-protected routes and role-based permissions

mod support;

use axum::http::StatusCode;
use support::*;
use warden::{
    api::AppState,
    config::Environment,
    AppError,
};

#[tokio::test]
async fn test_roles_require_team_view() {
    let app = build_app(test_config()).await;

    let response = app.send(get("/api/roles")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let viewer = app.token_for(VIEWER_EMAIL).await;
    let response = app.send(get_with_bearer("/api/roles", &viewer)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let admin = app.token_for(ADMIN_EMAIL).await;
    let response = app.send(get_with_bearer("/api/roles", &admin)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let roles = body["roles"].as_array().unwrap();
    assert_eq!(roles.len(), 5);
    assert_eq!(roles[0]["role"], "super_admin");
    assert_eq!(roles[4]["role"], "readonly");
}

#[tokio::test]
async fn test_session_lists_permissions() {
    let app = build_app(test_config()).await;
    let token = app.token_for(ATTACKER_TARGET).await;

    let response = app.send(get_with_bearer("/api/auth/session", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["user"]["role"], "security_analyst");
    let permissions: Vec<&str> = body["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert!(permissions.contains(&"scan:full"));
    assert!(permissions.contains(&"quarantine:restore"));
    assert!(!permissions.contains(&"admin:full"));
}

#[tokio::test]
async fn test_tampered_token_rejected() {
    let app = build_app(test_config()).await;
    let token = app.token_for(VIEWER_EMAIL).await;

    // Swap the signature for another token's
    let admin = app.token_for(ADMIN_EMAIL).await;
    let (head, _) = token.rsplit_once('.').unwrap();
    let (_, signature) = admin.rsplit_once('.').unwrap();
    let forged = format!("{}.{}", head, signature);

    let response = app.send(get_with_bearer("/api/auth/session", &forged)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejected_session_clears_cookies() {
    let app = build_app(test_config()).await;

    let response = app
        .send(get_with_bearer("/api/auth/session", "not.a.token"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies
        .iter()
        .all(|c| c.contains("Max-Age=0") && !c.contains("Secure")));
}

#[tokio::test]
async fn test_rejected_session_clears_secure_cookies_in_production() {
    let mut config = test_config();
    config.environment = Environment::Production;
    config.security.cors_allowed_origins = vec!["https://app.example.com".to_string()];
    let app = build_app(config).await;

    let response = app
        .send(get_with_bearer("/api/auth/session", "not.a.token"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 2);
    assert!(cookies
        .iter()
        .all(|c| c.contains("Max-Age=0") && c.contains("Secure")));

    // The verify endpoint clears the same way
    let response = app.send(get_with_bearer("/api/auth/verify", "not.a.token")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).iter().all(|c| c.contains("Secure")));
}

#[tokio::test]
async fn test_production_without_secret_refuses_to_start() {
    let mut config = test_config();
    config.environment = Environment::Production;
    config.auth.jwt_secret = None;
    config.security.cors_allowed_origins = vec!["https://app.example.com".to_string()];

    assert!(matches!(config.validate(), Err(AppError::Configuration(_))));

    let result = AppState::from_config(
        config,
        std::sync::Arc::new(warden::clock::ManualClock::new(START_MS)),
        std::sync::Arc::new(warden::audit::MemoryAuditStorage::new()),
    )
    .await;
    assert!(matches!(result, Err(AppError::Configuration(_))));
}
