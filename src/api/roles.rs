use crate::authz::PermissionModel;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

/// GET /api/roles
///
/// The role table, most privileged first. Requires `team:view`.
pub async fn list_roles(State(permissions): State<Arc<PermissionModel>>) -> Json<Value> {
    Json(json!({
        "success": true,
        "roles": permissions.all_roles(),
    }))
}
