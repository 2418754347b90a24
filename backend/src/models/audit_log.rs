//! Audit log model.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Persisted audit log row
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLog {
    pub id: i64,
    pub user_id: Option<String>,
    pub action: String,
    pub resource: String,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
