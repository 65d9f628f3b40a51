use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

// Metrics registry
static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "route_class", "status"]
    )
    .unwrap()
});

static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency in seconds",
        &["method", "route_class"],
        vec![0.001, 0.005, 0.010, 0.050, 0.100, 0.500, 1.0, 5.0]
    )
    .unwrap()
});

static GATEKEEPER_DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "gatekeeper_decisions_total",
        "Admission decisions taken by the request gatekeeper",
        &["outcome"]
    )
    .unwrap()
});

static RATE_LIMIT_EXCEEDED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rate_limit_exceeded_total",
        "Total number of rate limit violations",
        &["route_class"]
    )
    .unwrap()
});

static RATE_LIMIT_STORE_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "rate_limit_store_errors_total",
        "Rate limit checks that failed open because the store was unavailable"
    )
    .unwrap()
});

static LOGIN_ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "login_attempts_total",
        "Login attempts by result",
        &["result"]
    )
    .unwrap()
});

static ACCOUNT_LOCKOUTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "account_lockouts_total",
        "Identifiers locked out after repeated failures"
    )
    .unwrap()
});

static AUDIT_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "audit_events_total",
        "Audit entries recorded",
        &["status"]
    )
    .unwrap()
});

static AUDIT_EVENTS_DROPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "audit_events_dropped_total",
        "Audit entries dropped because the queue was full or the sink failed"
    )
    .unwrap()
});

static SUSPICIOUS_USER_AGENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "suspicious_user_agents_total",
        "Requests whose user agent matches a known scanning tool"
    )
    .unwrap()
});

pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn record_http_request(method: &str, route_class: &str, status: u16) {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&[method, route_class, &status.to_string()])
            .inc();
    }

    pub fn record_http_duration(method: &str, route_class: &str, duration: f64) {
        HTTP_REQUEST_DURATION
            .with_label_values(&[method, route_class])
            .observe(duration);
    }

    /// `outcome` is one of proceed, preflight, malformed, rate_limited
    pub fn record_gatekeeper_decision(outcome: &str) {
        GATEKEEPER_DECISIONS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn record_rate_limit_exceeded(route_class: &str) {
        RATE_LIMIT_EXCEEDED_TOTAL
            .with_label_values(&[route_class])
            .inc();
    }

    pub fn record_rate_limit_store_error() {
        RATE_LIMIT_STORE_ERRORS_TOTAL.inc();
    }

    pub fn record_login_attempt(result: &str) {
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn record_lockout() {
        ACCOUNT_LOCKOUTS_TOTAL.inc();
    }

    pub fn record_audit_event(status: &str) {
        AUDIT_EVENTS_TOTAL.with_label_values(&[status]).inc();
    }

    pub fn record_audit_dropped(count: u64) {
        AUDIT_EVENTS_DROPPED_TOTAL.inc_by(count);
    }

    pub fn record_suspicious_user_agent() {
        SUSPICIOUS_USER_AGENTS_TOTAL.inc();
    }

    /// Export all metrics in Prometheus format
    pub fn export() -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        encoder.encode_to_string(&metric_families)
    }
}
