use crate::rate_limit::fixed_window::RateLimitDecision;
use axum::http::{header::HeaderName, HeaderMap, HeaderValue};

static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Add rate limit telemetry headers
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    // X-RateLimit-Limit: Maximum number of requests allowed in the window
    headers.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(decision.limit));

    // X-RateLimit-Remaining: Number of requests remaining
    headers.insert(
        X_RATELIMIT_REMAINING.clone(),
        HeaderValue::from(decision.remaining),
    );

    // X-RateLimit-Reset: Unix ms when the window resets
    headers.insert(
        X_RATELIMIT_RESET.clone(),
        HeaderValue::from(decision.reset_at_ms),
    );
}

/// Whether `name` is one of the telemetry headers above
pub fn is_rate_limit_header(name: &HeaderName) -> bool {
    name == X_RATELIMIT_LIMIT || name == X_RATELIMIT_REMAINING || name == X_RATELIMIT_RESET
}
