// Hardening headers attached to every response

use crate::config::SecurityConfig;
use crate::errors::{AppError, Result};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

static PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Pre-rendered security header set
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: HeaderMap,
}

impl SecurityHeaders {
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
        headers.insert(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );
        headers.insert(
            PERMISSIONS_POLICY.clone(),
            HeaderValue::from_static("camera=(), microphone=(), geolocation=(), interest-cohort=()"),
        );
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            to_header_value(&content_security_policy(config))?,
        );
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            to_header_value(&format!(
                "max-age={}; includeSubDomains; preload",
                config.hsts_max_age_seconds
            ))?,
        );

        Ok(Self { headers })
    }

    /// Insert every header, replacing values set further down the stack
    pub fn apply(&self, target: &mut HeaderMap) {
        for (name, value) in self.headers.iter() {
            target.insert(name.clone(), value.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name)
    }
}

fn to_header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::Configuration(format!("Invalid security header value: {}", e)))
}

fn directive(name: &str, extra_sources: &[String]) -> String {
    let mut rendered = format!("{} 'self'", name);
    for source in extra_sources {
        rendered.push(' ');
        rendered.push_str(source);
    }
    rendered
}

/// Content-Security-Policy: `self` plus configured third parties per directive
pub fn content_security_policy(config: &SecurityConfig) -> String {
    let mut directives = vec![
        "default-src 'self'".to_string(),
        directive("script-src", &config.csp_script_sources),
        directive("style-src", &config.csp_style_sources),
        directive("font-src", &config.csp_font_sources),
        directive("img-src", &config.csp_img_sources),
        directive("connect-src", &config.csp_connect_sources),
        "frame-ancestors 'none'".to_string(),
        "base-uri 'self'".to_string(),
        "form-action 'self'".to_string(),
        "object-src 'none'".to_string(),
    ];
    if let Some(uri) = &config.csp_report_uri {
        directives.push(format!("report-uri {}", uri));
    }
    directives.join("; ")
}
