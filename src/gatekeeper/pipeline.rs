// Inbound request admission: patterns, rate limits, security headers, CORS

use crate::config::Config;
use crate::errors::{AppError, Result};
use crate::gatekeeper::client::{self, is_suspicious_user_agent};
use crate::gatekeeper::cors::CorsPolicy;
use crate::gatekeeper::headers::SecurityHeaders;
use crate::gatekeeper::patterns::detect_malicious_input;
use crate::observability::MetricsRecorder;
use crate::rate_limit::{apply_rate_limit_headers, is_rate_limit_header, RateLimiter, RouteClass};
use axum::{
    extract::{Request, State},
    http::{header, request::Parts, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;

/// The parts of a request the gatekeeper looks at
#[derive(Debug, Clone, Copy)]
pub struct InboundRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
}

impl<'a> InboundRequest<'a> {
    pub fn from_parts(parts: &'a Parts) -> Self {
        Self {
            method: &parts.method,
            path: parts.uri.path(),
            query: parts.uri.query(),
            headers: &parts.headers,
        }
    }
}

#[derive(Debug)]
pub enum GateDecision {
    /// Hand the request to the router
    Proceed,
    /// Answer a CORS preflight with an empty 204
    Preflight,
    Reject(AppError),
}

impl GateDecision {
    fn outcome(&self) -> &'static str {
        match self {
            GateDecision::Proceed => "proceed",
            GateDecision::Preflight => "preflight",
            GateDecision::Reject(AppError::RateLimited { .. }) => "rate_limited",
            GateDecision::Reject(_) => "malformed",
        }
    }
}

/// Decision plus the headers every resulting response must carry
#[derive(Debug)]
pub struct GateVerdict {
    pub decision: GateDecision,
    pub headers: HeaderMap,
    pub client_ip: String,
    pub route_class: RouteClass,
}

pub struct RequestGatekeeper {
    limiter: Arc<RateLimiter>,
    security_headers: SecurityHeaders,
    cors: CorsPolicy,
}

impl RequestGatekeeper {
    pub fn new(limiter: Arc<RateLimiter>, security_headers: SecurityHeaders, cors: CorsPolicy) -> Self {
        Self {
            limiter,
            security_headers,
            cors,
        }
    }

    pub fn from_config(config: &Config, limiter: Arc<RateLimiter>) -> Result<Self> {
        Ok(Self::new(
            limiter,
            SecurityHeaders::from_config(&config.security)?,
            CorsPolicy::from_config(&config.security)?,
        ))
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run the admission pipeline
    ///
    /// Security headers (and CORS headers on API routes) are collected before
    /// any check runs, so rejections carry them too.
    pub async fn admit(&self, request: InboundRequest<'_>) -> GateVerdict {
        let client_ip = client::client_ip(request.headers);
        let route_class = RouteClass::classify(request.path);

        let mut headers = HeaderMap::new();
        self.security_headers.apply(&mut headers);
        if CorsPolicy::applies_to(request.path) {
            self.cors
                .apply(request.headers.get(header::ORIGIN), &mut headers);
        }

        let decision = self
            .evaluate(&request, &client_ip, route_class, &mut headers)
            .await;

        MetricsRecorder::record_gatekeeper_decision(decision.outcome());

        GateVerdict {
            decision,
            headers,
            client_ip,
            route_class,
        }
    }

    async fn evaluate(
        &self,
        request: &InboundRequest<'_>,
        client_ip: &str,
        route_class: RouteClass,
        headers: &mut HeaderMap,
    ) -> GateDecision {
        // 1. Malicious input, before any budget is spent
        let rejection = match detect_malicious_input(request.path, request.query) {
            Ok(None) => None,
            Ok(Some(signature)) => {
                tracing::warn!(
                    ip = %client_ip,
                    path = %request.path,
                    signature = signature,
                    "Blocked malicious request"
                );
                Some(AppError::MalformedRequest)
            }
            Err(err) => {
                tracing::warn!(ip = %client_ip, path = %request.path, "Blocked undecodable request");
                Some(err)
            }
        };
        if let Some(err) = rejection {
            // Report the standing budget; nothing was counted
            match self.limiter.standing(client_ip, route_class).await {
                Ok(standing) => apply_rate_limit_headers(headers, &standing),
                Err(err) => tracing::debug!(error = %err, "Rate limit standing unavailable"),
            }
            return GateDecision::Reject(err);
        }

        // 2. Rate limit per route class
        match self.limiter.check_and_consume(client_ip, route_class).await {
            Ok(decision) => {
                apply_rate_limit_headers(headers, &decision);
                if !decision.allowed {
                    MetricsRecorder::record_rate_limit_exceeded(route_class.as_str());
                    tracing::warn!(
                        ip = %client_ip,
                        path = %request.path,
                        route_class = %route_class,
                        "Rate limit exceeded"
                    );
                    return GateDecision::Reject(AppError::RateLimited {
                        retry_after_secs: decision.retry_after_secs(self.limiter.now_ms()),
                    });
                }
            }
            Err(err) => {
                // Fail open: an unavailable store must not take the service down
                MetricsRecorder::record_rate_limit_store_error();
                tracing::error!(
                    error = %err,
                    ip = %client_ip,
                    route_class = %route_class,
                    "Rate limit store unavailable, admitting request"
                );
            }
        }

        // 3. Observe scanners without blocking them
        let user_agent = client::user_agent(request.headers);
        if is_suspicious_user_agent(&user_agent) {
            MetricsRecorder::record_suspicious_user_agent();
            tracing::warn!(ip = %client_ip, user_agent = %user_agent, "Suspicious user agent");
        }

        // 4. Preflight
        if *request.method == Method::OPTIONS {
            return GateDecision::Preflight;
        }

        GateDecision::Proceed
    }
}

/// Axum middleware running every request through the gatekeeper
pub async fn gatekeeper_middleware(
    State(gatekeeper): State<Arc<RequestGatekeeper>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    // The body is not Sync, so only the head is borrowed across the await
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    let GateVerdict {
        decision,
        headers,
        route_class,
        ..
    } = gatekeeper.admit(InboundRequest::from_parts(&parts)).await;

    let mut response = match decision {
        GateDecision::Proceed => next.run(Request::from_parts(parts, body)).await,
        GateDecision::Preflight => StatusCode::NO_CONTENT.into_response(),
        GateDecision::Reject(err) => err.into_response(),
    };
    for (name, value) in headers.iter() {
        if is_rate_limit_header(name) {
            // A handler that enforced its own budget reports that one
            response
                .headers_mut()
                .entry(name)
                .or_insert_with(|| value.clone());
        } else {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }

    let class = route_class.as_str();
    MetricsRecorder::record_http_request(method.as_str(), class, response.status().as_u16());
    MetricsRecorder::record_http_duration(method.as_str(), class, started.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{RateLimitConfig, RateLimitPolicy, SecurityConfig};
    use crate::rate_limit::InMemoryRateLimitStore;
    use axum::http::HeaderValue;

    fn gatekeeper() -> (RequestGatekeeper, Arc<RateLimiter>) {
        let clock = ManualClock::new(1_700_000_000_000);
        let config = RateLimitConfig {
            general: RateLimitPolicy::new(2, 60),
            ..RateLimitConfig::default()
        };
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(InMemoryRateLimitStore::new()),
            config,
            Arc::new(clock),
        ));
        let security = SecurityConfig {
            cors_allowed_origins: vec!["https://app.example.com".to_string()],
            ..SecurityConfig::default()
        };
        let gatekeeper = RequestGatekeeper::new(
            limiter.clone(),
            SecurityHeaders::from_config(&security).unwrap(),
            CorsPolicy::from_config(&security).unwrap(),
        );
        (gatekeeper, limiter)
    }

    fn headers_from(ip: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(ip).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_traversal_rejected_before_rate_limiting() {
        let (gatekeeper, limiter) = gatekeeper();
        let headers = headers_from("1.2.3.4");

        for path in ["/../../etc/passwd", "/%2e%2e%2fetc/passwd"] {
            let verdict = gatekeeper
                .admit(InboundRequest {
                    method: &Method::GET,
                    path,
                    query: None,
                    headers: &headers,
                })
                .await;
            assert!(matches!(
                verdict.decision,
                GateDecision::Reject(AppError::MalformedRequest)
            ));
            assert_eq!(verdict.headers.get("x-frame-options").unwrap(), "DENY");
            assert_eq!(verdict.headers.get("x-ratelimit-limit").unwrap(), "2");
            assert_eq!(verdict.headers.get("x-ratelimit-remaining").unwrap(), "2");
        }

        assert!(limiter
            .peek("1.2.3.4", RouteClass::General)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_verdict_carries_headers() {
        let (gatekeeper, _) = gatekeeper();
        let headers = headers_from("5.6.7.8");
        let request = InboundRequest {
            method: &Method::GET,
            path: "/api/roles",
            query: None,
            headers: &headers,
        };

        assert!(matches!(gatekeeper.admit(request).await.decision, GateDecision::Proceed));
        assert!(matches!(gatekeeper.admit(request).await.decision, GateDecision::Proceed));

        let verdict = gatekeeper.admit(request).await;
        match verdict.decision {
            GateDecision::Reject(AppError::RateLimited { retry_after_secs }) => {
                assert_eq!(retry_after_secs, 60)
            }
            other => panic!("unexpected decision: {:?}", other),
        }
        assert_eq!(verdict.headers.get("x-ratelimit-remaining").unwrap(), "0");
        assert_eq!(verdict.headers.get("x-ratelimit-limit").unwrap(), "2");
        assert_eq!(verdict.headers.get("x-frame-options").unwrap(), "DENY");
    }

    #[tokio::test]
    async fn test_preflight_and_cors() {
        let (gatekeeper, _) = gatekeeper();
        let mut headers = headers_from("9.9.9.9");
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://app.example.com"));

        let verdict = gatekeeper
            .admit(InboundRequest {
                method: &Method::OPTIONS,
                path: "/api/auth/login",
                query: None,
                headers: &headers,
            })
            .await;
        assert!(matches!(verdict.decision, GateDecision::Preflight));
        assert_eq!(
            verdict.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn test_non_api_routes_get_no_cors() {
        let (gatekeeper, _) = gatekeeper();
        let mut headers = headers_from("9.9.9.9");
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://app.example.com"));

        let verdict = gatekeeper
            .admit(InboundRequest {
                method: &Method::GET,
                path: "/health/live",
                query: None,
                headers: &headers,
            })
            .await;
        assert!(matches!(verdict.decision, GateDecision::Proceed));
        assert!(verdict.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(verdict.headers.get("x-content-type-options").is_some());
    }

    #[tokio::test]
    async fn test_scanner_user_agent_is_not_blocked() {
        let (gatekeeper, _) = gatekeeper();
        let mut headers = headers_from("7.7.7.7");
        headers.insert(header::USER_AGENT, HeaderValue::from_static("sqlmap/1.7"));

        let verdict = gatekeeper
            .admit(InboundRequest {
                method: &Method::GET,
                path: "/api/roles",
                query: None,
                headers: &headers,
            })
            .await;
        assert!(matches!(verdict.decision, GateDecision::Proceed));
    }
}
