// CORS negotiation for API routes

use crate::config::SecurityConfig;
use crate::errors::{AppError, Result};
use axum::http::{header, HeaderMap, HeaderValue};

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: Vec<String>,
    allow_any_origin: bool,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    max_age: HeaderValue,
}

impl CorsPolicy {
    pub fn from_config(config: &SecurityConfig) -> Result<Self> {
        let to_value = |raw: String| {
            HeaderValue::from_str(&raw)
                .map_err(|e| AppError::Configuration(format!("Invalid CORS value: {}", e)))
        };

        Ok(Self {
            allow_any_origin: config.cors_allowed_origins.iter().any(|o| o == "*"),
            allowed_origins: config
                .cors_allowed_origins
                .iter()
                .filter(|o| o.as_str() != "*")
                .map(|o| o.trim_end_matches('/').to_string())
                .collect(),
            allow_methods: to_value(config.cors_allowed_methods.join(", "))?,
            allow_headers: to_value(config.cors_allowed_headers.join(", "))?,
            max_age: HeaderValue::from(config.cors_max_age_seconds),
        })
    }

    /// Only `/api/` routes take part in CORS
    pub fn applies_to(path: &str) -> bool {
        path.starts_with("/api/")
    }

    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allow_any_origin || self.allowed_origins.iter().any(|o| o == origin)
    }

    /// Write CORS headers for a request carrying `origin`
    ///
    /// A listed origin is echoed back; an unlisted one gets no allow-origin header.
    pub fn apply(&self, origin: Option<&HeaderValue>, target: &mut HeaderMap) {
        if self.allow_any_origin {
            target.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        } else if let Some(origin) = origin {
            if origin
                .to_str()
                .map(|o| self.is_origin_allowed(o))
                .unwrap_or(false)
            {
                target.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            }
            target.insert(header::VARY, HeaderValue::from_static("Origin"));
        }

        target.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            self.allow_methods.clone(),
        );
        target.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            self.allow_headers.clone(),
        );
        target.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
    }
}
