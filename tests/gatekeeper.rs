//! Admission pipeline behaviour as seen through the router

mod support;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use support::*;
use warden::{config::RateLimitPolicy, rate_limit::RouteClass};

#[tokio::test]
async fn test_path_traversal_rejected_before_rate_limiting() {
    let app = build_app(test_config()).await;

    for uri in [
        "/api/files/../../etc/passwd",
        "/api/files/%2e%2e%2f%2e%2e%2fetc%2fpasswd",
        "/api/files/%252e%252e%252fetc",
    ] {
        let response = app.send(get(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(!body.contains("passwd"));
        assert!(!body.contains(".."));
    }

    assert!(app
        .state
        .limiter
        .peek(CLIENT_IP, RouteClass::General)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_injection_in_query_rejected() {
    let app = build_app(test_config()).await;

    let response = app
        .send(get("/api/threats?id=1%20UNION%20SELECT%20password%20FROM%20users"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.send(get("/api/search?q=%3Cscript%3Ealert(1)%3C/script%3E")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rate_limit_returns_429_with_retry_after() {
    let mut config = test_config();
    config.rate_limit.general = RateLimitPolicy::new(2, 60);
    let app = build_app(config).await;

    for remaining in ["1", "0"] {
        let response = app.send(get("/health/live")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "2");
        assert_eq!(
            response.headers().get("x-ratelimit-remaining").unwrap(),
            remaining
        );
    }

    let response = app.send(get("/health/live")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");

    // A new window opens once the old one has passed
    app.clock.advance_secs(61);
    let response = app.send(get("/health/live")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "1");
}

#[tokio::test]
async fn test_clients_have_separate_budgets() {
    let mut config = test_config();
    config.rate_limit.general = RateLimitPolicy::new(1, 60);
    let app = build_app(config).await;

    assert_eq!(app.send(get("/health/live")).await.status(), StatusCode::OK);
    assert_eq!(
        app.send(get("/health/live")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let other = Request::builder()
        .uri("/health/live")
        .header("x-forwarded-for", "5.6.7.8, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(other).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_preflight_returns_204_with_cors_headers() {
    let app = build_app(test_config()).await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/auth/login")
        .header(header::ORIGIN, "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(
        headers.get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );
    assert!(headers.get("access-control-allow-methods").is_some());
    assert!(headers.get("access-control-allow-headers").is_some());
    assert_eq!(headers.get("access-control-max-age").unwrap(), "86400");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
}

#[tokio::test]
async fn test_unlisted_origin_not_echoed() {
    let app = build_app(test_config()).await;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/auth/login")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let app = build_app(test_config()).await;

    for (uri, status) in [
        ("/health/live", StatusCode::OK),
        ("/api/auth/session", StatusCode::UNAUTHORIZED),
        ("/does/not/exist", StatusCode::NOT_FOUND),
    ] {
        let response = app.send(get(uri)).await;
        assert_eq!(response.status(), status, "{}", uri);
        let headers = response.headers();
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert!(headers
            .get("strict-transport-security")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("includeSubDomains"));
        assert!(headers.get("content-security-policy").is_some());
    }
}

#[tokio::test]
async fn test_scanner_user_agent_is_not_blocked() {
    let app = build_app(test_config()).await;

    let request = Request::builder()
        .uri("/health/live")
        .header(header::USER_AGENT, "sqlmap/1.7")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint_exports_text() {
    let app = build_app(test_config()).await;
    app.send(get("/health/live")).await;

    let response = app.send(get("/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("gatekeeper_decisions_total"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_requests_at_boundary_admit_exactly_one() {
    let mut config = test_config();
    config.rate_limit.general = RateLimitPolicy::new(5, 60);
    let app = build_app(config).await;

    for _ in 0..4 {
        assert_eq!(app.send(get("/health/live")).await.status(), StatusCode::OK);
    }

    let responses =
        futures::future::join_all((0..16).map(|_| app.send(get("/health/live")))).await;
    let admitted = responses
        .iter()
        .filter(|r| r.status() == StatusCode::OK)
        .count();
    assert_eq!(admitted, 1);
    assert!(responses
        .iter()
        .all(|r| r.status() == StatusCode::OK || r.status() == StatusCode::TOO_MANY_REQUESTS));
}
