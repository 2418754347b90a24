//! Permission introspection handlers.

use axum::{
    extract::{Extension, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::permission::{AuthorizationContext, Permission};
use crate::models::role::Role;

/// Create permission routes
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/me", get(my_permissions))
        .route("/check", post(check_permission))
}

#[derive(Debug, Serialize)]
pub struct MyPermissionsResponse {
    pub user_id: String,
    pub role: Role,
    pub inherits: Option<Role>,
    pub permissions: Vec<Permission>,
}

/// Effective permissions of the caller's role.
pub async fn my_permissions(
    State(state): State<SharedState>,
    Extension(ctx): Extension<AuthorizationContext>,
) -> Json<MyPermissionsResponse> {
    Json(MyPermissionsResponse {
        user_id: ctx.user_id,
        role: ctx.role,
        inherits: state.hierarchy.parent(ctx.role),
        permissions: state.hierarchy.effective_permissions(ctx.role).to_vec(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CheckPermissionRequest {
    pub resource: String,
    pub action: String,
    /// Extra attributes layered over the session's own.
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct CheckPermissionResponse {
    pub permission: String,
    pub allowed: bool,
}

/// Ask whether the caller's role grants `resource:action`.
pub async fn check_permission(
    State(state): State<SharedState>,
    Extension(ctx): Extension<AuthorizationContext>,
    Json(payload): Json<CheckPermissionRequest>,
) -> Result<Json<CheckPermissionResponse>> {
    if payload.resource.trim().is_empty() || payload.action.trim().is_empty() {
        return Err(AppError::Validation(
            "resource and action are required".to_string(),
        ));
    }

    let mut attributes = ctx.attributes.clone();
    if let Some(extra) = payload.context {
        attributes.extend(extra);
    }

    let permission = Permission::new(payload.resource, payload.action);
    let allowed = state
        .hierarchy
        .has_permission(ctx.role, &permission, Some(&attributes));

    Ok(Json(CheckPermissionResponse {
        permission: permission.to_string(),
        allowed,
    }))
}
