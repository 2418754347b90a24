//! Health check endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::api::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub store: CheckStatus,
    pub backup_dir: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckStatus {
    fn healthy(message: Option<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            message,
        }
    }

    fn unhealthy(message: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            message: Some(message),
        }
    }
}

/// Liveness plus store connectivity.
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let store_check = match &state.db {
        Some(db) => match sqlx::query("SELECT 1").fetch_one(db).await {
            Ok(_) => CheckStatus::healthy(None),
            Err(e) => CheckStatus::unhealthy(format!("Database connection failed: {}", e)),
        },
        None => CheckStatus::healthy(Some("in-memory store".to_string())),
    };

    // The directory is created on first backup, so absence is fine.
    let backup_dir = &state.config.backup_dir;
    let backup_check = match tokio::fs::metadata(backup_dir).await {
        Ok(meta) if !meta.is_dir() => {
            CheckStatus::unhealthy(format!("{} is not a directory", backup_dir.display()))
        }
        _ => CheckStatus::healthy(None),
    };

    let healthy = store_check.status == "healthy" && backup_check.status == "healthy";
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks: HealthChecks {
                store: store_check,
                backup_dir: backup_check,
            },
        }),
    )
}
