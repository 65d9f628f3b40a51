use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-wide error type
///
/// Every variant renders to a generic client message. Offending input, matched
/// patterns and internal causes stay in server-side logs.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Request admission
    #[error("Malformed request")]
    MalformedRequest,
    #[error("Rate limit exceeded (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    // Authentication
    #[error("Account temporarily locked ({remaining_ms}ms remaining)")]
    AccountLocked { remaining_ms: i64 },
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Account is disabled")]
    AccountDisabled,
    #[error("Account already exists")]
    AccountExists,
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),

    // Authorization
    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    // Validation errors
    #[error("Validation error: {0}")]
    ValidationError(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // Cryptographic errors
    #[error("Cryptographic error: {0}")]
    Cryptographic(String),

    // Shared store errors
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AppError::InvalidToken("expired".to_string()),
            ErrorKind::InvalidSignature => AppError::InvalidToken("bad signature".to_string()),
            ErrorKind::InvalidIssuer => AppError::InvalidToken("issuer mismatch".to_string()),
            ErrorKind::InvalidAudience => AppError::InvalidToken("audience mismatch".to_string()),
            _ => AppError::InvalidToken(err.to_string()),
        }
    }
}

impl AppError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MalformedRequest | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } | AppError::AccountLocked { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::InvalidCredentials | AppError::InvalidToken(_) | AppError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden | AppError::AccountDisabled => StatusCode::FORBIDDEN,
            AppError::AccountExists => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::TokenGeneration(_)
            | AppError::Configuration(_)
            | AppError::Cryptographic(_)
            | AppError::Redis(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Implement IntoResponse for Axum
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            AppError::MalformedRequest => "Bad Request",
            AppError::RateLimited { .. } => "Too Many Requests",
            AppError::AccountLocked { .. } => {
                "Account temporarily locked. Please try again later."
            }
            AppError::InvalidCredentials => "Invalid email or password",
            AppError::InvalidToken(reason) => {
                tracing::warn!(reason = %reason, "Session verification failed");
                "Invalid or expired session"
            }
            AppError::Unauthorized => "Authentication required",
            AppError::AccountDisabled => "Account is disabled. Contact administrator.",
            AppError::AccountExists => "An account with this email already exists",
            AppError::Forbidden => "Forbidden",
            AppError::NotFound => "Not Found",
            AppError::ValidationError(msg) => msg.as_str(),
            AppError::TokenGeneration(_)
            | AppError::Configuration(_)
            | AppError::Cryptographic(_)
            | AppError::Redis(_)
            | AppError::Internal(_) => {
                tracing::error!(error = %self, "Request failed with internal error");
                "An error occurred. Please try again."
            }
        };

        let mut body = json!({
            "success": false,
            "error": message,
        });
        if let AppError::AccountLocked { remaining_ms } = &self {
            body["lockoutRemaining"] = json!(ceil_secs(*remaining_ms));
        }

        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited { retry_after_secs } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Milliseconds rounded up to whole seconds, never negative
pub fn ceil_secs(ms: i64) -> u64 {
    if ms <= 0 {
        0
    } else {
        ((ms + 999) / 1000) as u64
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::MalformedRequest.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::RateLimited { retry_after_secs: 3 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::AccountExists.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = AppError::RateLimited { retry_after_secs: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let response = AppError::Internal("secret stack trace".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(0), 0);
        assert_eq!(ceil_secs(-5), 0);
        assert_eq!(ceil_secs(1), 1);
        assert_eq!(ceil_secs(1000), 1);
        assert_eq!(ceil_secs(1001), 2);
    }
}
