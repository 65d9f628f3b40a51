use crate::{
    auth::session::Principal,
    authz::{model::PermissionModel, permissions::Permission},
    errors::{AppError, Result},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Extract principal from request extensions (set by `require_session`)
fn extract_principal(request: &Request) -> Result<&Principal> {
    request
        .extensions()
        .get::<Principal>()
        .ok_or(AppError::Unauthorized)
}

/// Permission check for a route
///
/// Runs after `require_session`. A request without a principal is 401; a
/// principal lacking any of `required` is 403.
pub async fn authorize(
    State(model): State<Arc<PermissionModel>>,
    required: &'static [Permission],
    request: Request,
    next: Next,
) -> Result<Response> {
    let principal = extract_principal(&request)?;

    if !model.can_access(principal.role, required) {
        tracing::warn!(
            user_id = %principal.user_id,
            role = %principal.role,
            required = ?required,
            path = %request.uri().path(),
            "Authorization denied"
        );
        return Err(AppError::Forbidden);
    }

    tracing::debug!(
        user_id = %principal.user_id,
        role = %principal.role,
        "Authorization granted"
    );

    Ok(next.run(request).await)
}

/// Route layer requiring every listed permission
#[macro_export]
macro_rules! require_permissions {
    ($model:expr, $required:expr) => {
        axum::middleware::from_fn_with_state(
            $model,
            |state: axum::extract::State<std::sync::Arc<$crate::authz::PermissionModel>>,
             request: axum::extract::Request,
             next: axum::middleware::Next| {
                $crate::authz::middleware::authorize(state, $required, request, next)
            },
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::permissions::Role;
    use axum::{body::Body, http::StatusCode, routing::get, Extension, Router};
    use tower::ServiceExt;

    const TEAM_VIEW: &[Permission] = &[Permission::TeamView];

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: "1".to_string(),
            session_id: "sid".to_string(),
            role,
            expires_at: 0,
        }
    }

    fn app(principal: Option<Principal>) -> Router {
        let model = Arc::new(PermissionModel::standard());
        let router = Router::new()
            .route("/team", get(|| async { "team" }))
            .route_layer(require_permissions!(model, TEAM_VIEW));
        match principal {
            Some(principal) => router.layer(Extension(principal)),
            None => router,
        }
    }

    async fn status_for(principal: Option<Principal>) -> StatusCode {
        app(principal)
            .oneshot(Request::builder().uri("/team").body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_missing_principal_is_unauthorized() {
        assert_eq!(status_for(None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_insufficient_role_is_forbidden() {
        assert_eq!(
            status_for(Some(principal(Role::Viewer))).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(Some(principal(Role::SecurityAnalyst))).await,
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_granted_roles_pass() {
        assert_eq!(status_for(Some(principal(Role::Admin))).await, StatusCode::OK);
        // admin:full grants everything
        assert_eq!(
            status_for(Some(principal(Role::SuperAdmin))).await,
            StatusCode::OK
        );
    }
}
