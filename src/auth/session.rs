// Session identifiers, cookies and the authenticated-request middleware

use crate::auth::jwt::SessionIssuer;
use crate::authz::permissions::Role;
use crate::errors::{AppError, Result};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use std::sync::Arc;

/// Cookie carrying the signed session token
pub const AUTH_COOKIE: &str = "auth_token";
/// Cookie carrying the bare session id
pub const SESSION_COOKIE: &str = "session_id";

/// Authenticated caller, inserted into request extensions by `require_session`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    #[serde(rename = "id")]
    pub user_id: String,
    pub session_id: String,
    pub role: Role,
    /// Token expiry (Unix seconds)
    #[serde(skip)]
    pub expires_at: i64,
}

/// New session id: base36 issue time in millis, a dash, 32 random alphanumerics
pub fn generate_session_id(now_ms: i64) -> String {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("{}-{}", to_base36(now_ms.max(0) as u64), random)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Read a cookie value from the request headers
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Session token from the bearer header, falling back to the auth cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| parse_cookie(headers, AUTH_COOKIE))
}

fn cookie(name: &str, value: &str, max_age: i64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly;{} SameSite=Strict; Path=/; Max-Age={}",
        name,
        value,
        if secure { " Secure;" } else { "" },
        max_age
    )
}

/// `Set-Cookie` values for a freshly issued session
pub fn session_cookies(
    token: &str,
    session_id: &str,
    max_age_secs: i64,
    secure: bool,
) -> Result<[HeaderValue; 2]> {
    let to_value = |raw: String| {
        HeaderValue::from_str(&raw)
            .map_err(|e| AppError::Internal(format!("Invalid cookie value: {}", e)))
    };
    Ok([
        to_value(cookie(AUTH_COOKIE, token, max_age_secs, secure))?,
        to_value(cookie(SESSION_COOKIE, session_id, max_age_secs, secure))?,
    ])
}

/// `Set-Cookie` values that expire both session cookies
pub fn clearing_cookies(secure: bool) -> [HeaderValue; 2] {
    if secure {
        [
            HeaderValue::from_static("auth_token=; HttpOnly; Secure; SameSite=Strict; Path=/; Max-Age=0"),
            HeaderValue::from_static("session_id=; HttpOnly; Secure; SameSite=Strict; Path=/; Max-Age=0"),
        ]
    } else {
        [
            HeaderValue::from_static("auth_token=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"),
            HeaderValue::from_static("session_id=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"),
        ]
    }
}

/// Reject requests without a valid session and expose the `Principal` to handlers
pub async fn require_session(
    State(issuer): State<Arc<SessionIssuer>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let token = extract_session_token(request.headers()).ok_or(AppError::Unauthorized)?;
    let principal = match issuer.authenticate(&token).await {
        Ok(principal) => principal,
        Err(err @ AppError::InvalidToken(_)) => {
            let mut response = err.into_response();
            for cookie in clearing_cookies(issuer.secure_cookies()) {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            return Ok(response);
        }
        Err(err) => return Err(err),
    };

    tracing::debug!(
        user_id = %principal.user_id,
        role = %principal.role,
        "Session authenticated"
    );

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
