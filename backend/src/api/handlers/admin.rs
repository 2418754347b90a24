//! Admin handlers (backups, audit log).
//!
//! Every route carries its own permission guard, so the router is built
//! from the state rather than wrapped by the caller.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::auth::with_api_auth;
use crate::api::{AppState, SharedState};
use crate::error::{AppError, Result};
use crate::models::audit_log::AuditLog;
use crate::models::backup::{BackupFileInfo, BackupOptions, BackupResult, RestoreResult};
use crate::models::permission::AuthorizationContext;

const DEFAULT_AUDIT_LIMIT: usize = 50;
const MAX_AUDIT_LIMIT: usize = 500;

/// Create admin routes
pub fn router(state: &AppState) -> Router<SharedState> {
    let guard = state.guard();
    Router::new()
        .merge(with_api_auth(
            Router::new().route("/backups", get(list_backups)),
            guard.clone().require("backups", "read"),
        ))
        .merge(with_api_auth(
            Router::new().route("/backups", post(create_backup)),
            guard.clone().require("backups", "create"),
        ))
        .merge(with_api_auth(
            Router::new().route("/backups/restore", post(restore_backup)),
            guard.clone().require("backups", "restore"),
        ))
        .merge(with_api_auth(
            Router::new().route("/backups/:file_name", delete(delete_backup)),
            guard.clone().require("backups", "delete"),
        ))
        .merge(with_api_auth(
            Router::new().route("/audit", get(list_audit)),
            guard.require("audit", "read"),
        ))
}

#[derive(Debug, Serialize)]
pub struct BackupListResponse {
    pub items: Vec<BackupFileInfo>,
    pub total: usize,
}

/// List backup files, newest first.
pub async fn list_backups(State(state): State<SharedState>) -> Result<Json<BackupListResponse>> {
    let items = state.backup_service.list_backups().await?;
    Ok(Json(BackupListResponse {
        total: items.len(),
        items,
    }))
}

/// Create a backup. An absent body selects every table group.
pub async fn create_backup(
    State(state): State<SharedState>,
    Extension(ctx): Extension<AuthorizationContext>,
    options: Option<Json<BackupOptions>>,
) -> Result<(StatusCode, Json<BackupResult>)> {
    let options = options.map(|Json(o)| o).unwrap_or_default();
    let result = state
        .backup_service
        .create_backup(options, Some(&ctx.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[derive(Debug, Deserialize)]
pub struct RestoreBackupRequest {
    pub file_name: String,
}

/// Restore a backup from the backup directory.
pub async fn restore_backup(
    State(state): State<SharedState>,
    Extension(ctx): Extension<AuthorizationContext>,
    Json(payload): Json<RestoreBackupRequest>,
) -> Result<Json<RestoreResult>> {
    let result = state
        .backup_service
        .restore_by_name(&payload.file_name, Some(&ctx.user_id))
        .await?;
    Ok(Json(result))
}

/// Delete a backup file.
pub async fn delete_backup(
    State(state): State<SharedState>,
    Extension(ctx): Extension<AuthorizationContext>,
    Path(file_name): Path<String>,
) -> Result<StatusCode> {
    if state
        .backup_service
        .delete_backup(&file_name, Some(&ctx.user_id))
        .await
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Backup {}", file_name)))
    }
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

/// Most recent audit entries.
pub async fn list_audit(
    State(state): State<SharedState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLog>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    Ok(Json(state.audit.recent(limit).await?))
}
