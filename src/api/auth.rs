// Authentication endpoints

use crate::api::routes::AppState;
use crate::audit::{actions, AuditOptions};
use crate::auth::{
    password,
    session::{
        clearing_cookies, extract_session_token, generate_session_id, parse_cookie,
        session_cookies, SESSION_COOKIE,
    },
    validation::{
        mask_email, normalize_identifier, validate_display_name, validate_email,
        validate_password_policy, MAX_PASSWORD_LENGTH,
    },
    Principal,
};
use crate::authz::{PermissionModel, Role};
use crate::errors::{AppError, Result};
use crate::gatekeeper::ClientContext;
use crate::observability::MetricsRecorder;
use crate::rate_limit::{apply_rate_limit_headers, RouteClass};
use crate::users::User;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected unparseable request body");
        AppError::MalformedRequest
    })
}

fn audit(state: &AppState, client: &ClientContext, action: &str, options: AuditOptions) {
    let entry = state
        .audit
        .record(action, &client.ip, &client.user_agent, options);
    state.audit_logger.emit(entry);
}

fn with_cookies(mut response: Response, cookies: [HeaderValue; 2]) -> Response {
    for cookie in cookies {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/auth/login
///
/// Lockout is checked before the password, so a locked account is refused
/// even with correct credentials. Unknown accounts and wrong passwords share
/// one response and one throttle path.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let client = ClientContext::from_headers(&headers);
    let req: LoginRequest = parse_body(&body)?;

    if validate_email(&req.email).is_err()
        || req.password.is_empty()
        || req.password.chars().count() > MAX_PASSWORD_LENGTH
    {
        return Err(AppError::ValidationError(
            "Invalid email or password format".to_string(),
        ));
    }
    let email = normalize_identifier(&req.email);

    let lock = state.throttle.is_locked(&email).await?;
    if lock.locked {
        MetricsRecorder::record_login_attempt("locked");
        audit(
            &state,
            &client,
            actions::LOGIN_LOCKED,
            AuditOptions::failure()
                .with_detail("email", mask_email(&email))
                .with_detail("lockoutRemainingMs", lock.remaining_ms),
        );
        return Err(AppError::AccountLocked {
            remaining_ms: lock.remaining_ms,
        });
    }

    let user = state.users.find_by_email(&email).await?;
    let verified = match &user {
        Some(user) => password::verify_password(&req.password, &user.password_hash)?,
        None => password::verify_against_dummy(&req.password),
    };

    let user = match user {
        Some(user) if verified => user,
        _ => {
            let status = state.throttle.record_failure(&email).await?;
            MetricsRecorder::record_login_attempt("failure");
            tracing::warn!(
                ip = %client.ip,
                email = %mask_email(&email),
                locked = status.locked,
                "Failed login attempt"
            );
            audit(
                &state,
                &client,
                actions::LOGIN_FAILED,
                AuditOptions::failure().with_detail("email", mask_email(&email)),
            );
            return Err(AppError::InvalidCredentials);
        }
    };

    if !user.active {
        MetricsRecorder::record_login_attempt("disabled");
        audit(
            &state,
            &client,
            actions::LOGIN_FAILED,
            AuditOptions::failure()
                .with_user(user.id.clone())
                .with_detail("reason", "account_disabled"),
        );
        return Err(AppError::AccountDisabled);
    }

    state.throttle.record_success(&email).await?;

    let session_id = generate_session_id(state.clock.now_ms());
    let token = state.issuer.issue(&user.id, user.role, &session_id)?;
    let ttl = state.issuer.ttl_seconds();

    MetricsRecorder::record_login_attempt("success");
    tracing::info!(user_id = %user.id, ip = %client.ip, "Successful login");
    audit(
        &state,
        &client,
        actions::LOGIN,
        AuditOptions::success()
            .with_user(user.id.clone())
            .with_detail("sessionId", session_id.clone()),
    );

    let response = Json(json!({
        "success": true,
        "user": user.profile(),
        "expiresIn": ttl,
    }))
    .into_response();

    Ok(with_cookies(
        response,
        session_cookies(&token, &session_id, ttl, state.secure_cookies())?,
    ))
}

/// POST /api/auth/logout
///
/// Always succeeds. The session is revoked server-side only when a revocation
/// list is configured; otherwise the token stays valid until it expires.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let client = ClientContext::from_headers(&headers);
    let session_id =
        parse_cookie(&headers, SESSION_COOKIE).unwrap_or_else(|| "unknown".to_string());

    let principal = extract_session_token(&headers)
        .and_then(|token| state.issuer.validate(&token).ok());

    let mut options = AuditOptions::success().with_detail("sessionId", session_id);
    if let Some(principal) = &principal {
        if let Err(e) = state.issuer.revoke(principal).await {
            tracing::error!(error = %e, session_id = %principal.session_id, "Failed to revoke session");
        }
        options = options.with_user(principal.user_id.clone());
    }
    audit(&state, &client, actions::LOGOUT, options);

    let response = Json(json!({
        "success": true,
        "message": "Logged out successfully",
    }))
    .into_response();

    with_cookies(response, clearing_cookies(state.secure_cookies()))
}

/// POST /api/auth/register
///
/// Responses carry the registration budget's telemetry rather than the
/// gatekeeper's auth-class figures.
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let client = ClientContext::from_headers(&headers);

    // Separate, stricter budget on top of the gatekeeper's auth class
    let decision = match state
        .limiter
        .check_and_consume(&client.ip, RouteClass::Registration)
        .await
    {
        Ok(decision) => Some(decision),
        Err(e) => {
            MetricsRecorder::record_rate_limit_store_error();
            tracing::error!(error = %e, ip = %client.ip, "Registration rate limit unavailable");
            None
        }
    };

    let mut response = match decision {
        Some(decision) if !decision.allowed => {
            MetricsRecorder::record_rate_limit_exceeded(RouteClass::Registration.as_str());
            audit(
                &state,
                &client,
                actions::REGISTER_REJECTED,
                AuditOptions::failure().with_detail("reason", "rate_limited"),
            );
            AppError::RateLimited {
                retry_after_secs: decision.retry_after_secs(state.limiter.now_ms()),
            }
            .into_response()
        }
        _ => match create_account(&state, &client, &body).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        },
    };

    if let Some(decision) = decision {
        apply_rate_limit_headers(response.headers_mut(), &decision);
    }
    response
}

async fn create_account(state: &AppState, client: &ClientContext, body: &Bytes) -> Result<Response> {
    let req: RegisterRequest = parse_body(body)?;
    let email = normalize_identifier(&req.email);
    let masked_email = mask_email(&email);

    let name = match validate_email(&req.email)
        .and_then(|_| validate_password_policy(&req.password))
        .and_then(|_| validate_display_name(&req.name))
    {
        Ok(name) => name,
        Err(err) => {
            audit(
                state,
                client,
                actions::REGISTER_REJECTED,
                AuditOptions::failure()
                    .with_detail("email", masked_email)
                    .with_detail("reason", "validation"),
            );
            return Err(err);
        }
    };

    let user = User {
        id: Uuid::new_v4().to_string(),
        email,
        name,
        // Self-service accounts start at the lowest interactive tier
        role: Role::Viewer,
        password_hash: password::hash_password(&req.password)?,
        active: true,
        email_verified: false,
        created_at: DateTime::<Utc>::from_timestamp_millis(state.clock.now_ms())
            .unwrap_or_else(Utc::now),
    };

    let user = match state.users.insert(user).await {
        Ok(user) => user,
        Err(AppError::AccountExists) => {
            audit(
                state,
                client,
                actions::REGISTER_REJECTED,
                AuditOptions::failure()
                    .with_detail("email", masked_email)
                    .with_detail("reason", "duplicate"),
            );
            return Err(AppError::AccountExists);
        }
        Err(err) => {
            audit(
                state,
                client,
                actions::REGISTER_ERROR,
                AuditOptions::failure().with_detail("email", masked_email),
            );
            return Err(err);
        }
    };

    tracing::info!(user_id = %user.id, ip = %client.ip, "Account registered");
    audit(
        state,
        client,
        actions::REGISTER,
        AuditOptions::success()
            .with_user(user.id.clone())
            .with_detail("email", masked_email)
            .with_detail("role", user.role.as_str()),
    );

    Ok(Json(json!({
        "success": true,
        "message": "Registration successful. Please check your email to verify your account.",
        "user": {
            "id": user.id,
            "email": user.email,
            "name": user.name,
            "role": user.role,
        },
        "verificationRequired": true,
    }))
    .into_response())
}

/// GET /api/auth/verify
///
/// A failed check clears both session cookies.
pub async fn verify(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let result = match extract_session_token(&headers) {
        Some(token) => state.issuer.authenticate(&token).await,
        None => Err(AppError::InvalidToken("missing".to_string())),
    };

    match result {
        Ok(principal) => Json(json!({
            "authenticated": true,
            "user": principal,
        }))
        .into_response(),
        Err(AppError::InvalidToken(reason)) => {
            tracing::debug!(reason = %reason, "Session verification failed");
            let response = (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "authenticated": false,
                    "error": "Invalid or expired session",
                })),
            )
                .into_response();
            with_cookies(response, clearing_cookies(state.secure_cookies()))
        }
        Err(err) => err.into_response(),
    }
}

/// GET /api/auth/session
pub async fn session(
    State(permissions): State<Arc<PermissionModel>>,
    Extension(principal): Extension<Principal>,
) -> Json<serde_json::Value> {
    let granted: Vec<&'static str> = permissions
        .permissions_for(principal.role)
        .into_iter()
        .map(|p| p.as_str())
        .collect();

    Json(json!({
        "success": true,
        "user": principal,
        "permissions": granted,
        "expiresAt": principal.expires_at,
    }))
}
