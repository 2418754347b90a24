//! Audit logging.
//!
//! An append-only record of administrative actions. Each entry carries
//! `{action, resource, details, timestamp}` and optionally the acting user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::audit_log::AuditLog;

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    BackupCreated,
    BackupRestored,
    BackupDeleted,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::BackupCreated => "BACKUP_CREATED",
            AuditAction::BackupRestored => "BACKUP_RESTORED",
            AuditAction::BackupDeleted => "BACKUP_DELETED",
        }
    }
}

/// Resource types for audit logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Backup,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Backup => "backup",
        }
    }
}

/// Audit log entry builder
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub resource: ResourceType,
    pub user_id: Option<String>,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, resource: ResourceType) -> Self {
        Self {
            action,
            resource,
            user_id: None,
            details: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn user(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(str::to_string);
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Append-only audit destination.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<()>;

    /// Most recent entries, newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<AuditLog>>;
}

/// Audit sink writing to the `audit_log` table.
pub struct PgAuditSink {
    db: PgPool,
}

impl PgAuditSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (user_id, action, resource, details, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&entry.user_id)
        .bind(entry.action.as_str())
        .bind(entry.resource.as_str())
        .bind(&entry.details)
        .bind(entry.timestamp)
        .execute(&self.db)
        .await?;

        tracing::info!(
            action = entry.action.as_str(),
            resource = entry.resource.as_str(),
            user_id = ?entry.user_id,
            "Audit entry recorded"
        );
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, user_id, action, resource, details, created_at
            FROM audit_log
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

/// In-process audit sink for tests and database-less runs.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        tracing::info!(
            action = entry.action.as_str(),
            resource = entry.resource.as_str(),
            user_id = ?entry.user_id,
            "Audit entry recorded"
        );
        self.entries.lock().await.push(entry.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditLog>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .enumerate()
            .rev()
            .take(limit)
            .map(|(i, e)| AuditLog {
                id: i as i64 + 1,
                user_id: e.user_id.clone(),
                action: e.action.as_str().to_string(),
                resource: e.resource.as_str().to_string(),
                details: Some(e.details.clone()),
                created_at: e.timestamp,
            })
            .collect())
    }
}
