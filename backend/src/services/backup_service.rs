//! Backup and restore service.
//!
//! Backups are single JSON artifacts written to the backup directory.
//! Restores replay an artifact into the store inside one transaction.

use chrono::{DateTime, Utc};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::backup::{
    BackupArtifact, BackupData, BackupFileInfo, BackupManifest, BackupOptions, BackupResult,
    RestoreResult, Table, BACKUP_FORMAT_VERSION,
};
use crate::services::audit_service::{AuditAction, AuditEntry, AuditSink, ResourceType};
use crate::store::{GameStore, StoreTransaction};

/// Backup id used when a catalog entry's manifest cannot be read.
pub const UNKNOWN_BACKUP_ID: &str = "unknown";

/// First 16 hex chars of SHA-256 over the timestamp and a random nonce.
pub fn generate_backup_id(now: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(now.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
    hasher.update(rand::random::<u64>().to_be_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// `backup-<YYYYMMDD-HHMMSS>-<backup_id>.json`
pub fn backup_file_name(created_at: DateTime<Utc>, backup_id: &str) -> String {
    format!(
        "backup-{}-{}.json",
        created_at.format("%Y%m%d-%H%M%S"),
        backup_id
    )
}

/// A bare file name: non-empty, no separators, no parent references.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

/// Write `bytes` to `tmp_path`, then rename it to `path`. The temp file is
/// removed if either step fails.
async fn write_atomically(tmp_path: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let written = match tokio::fs::write(tmp_path, bytes).await {
        Ok(()) => tokio::fs::rename(tmp_path, path).await,
        Err(e) => Err(e),
    };
    if written.is_err() {
        if let Err(e) = tokio::fs::remove_file(tmp_path).await {
            tracing::debug!(file = %tmp_path.display(), error = %e, "No temp file to remove");
        }
    }
    written
}

/// Backup service
pub struct BackupService {
    store: Arc<dyn GameStore>,
    audit: Arc<dyn AuditSink>,
    backup_dir: PathBuf,
}

impl BackupService {
    pub fn new(
        store: Arc<dyn GameStore>,
        audit: Arc<dyn AuditSink>,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            audit,
            backup_dir: backup_dir.into(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Snapshot the selected table groups into a new artifact.
    pub async fn create_backup(
        &self,
        options: BackupOptions,
        actor: Option<&str>,
    ) -> Result<BackupResult> {
        let created_at = Utc::now();
        let backup_id = generate_backup_id(created_at);
        tracing::info!(%backup_id, ?options, "Starting backup");

        let result = self.do_backup(&backup_id, created_at, options).await;
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(%backup_id, error = %e, "Backup failed");
                return Err(match e {
                    failed @ AppError::BackupFailed(_) => failed,
                    other => AppError::BackupFailed(other.to_string()),
                });
            }
        };

        self.record(
            AuditEntry::new(AuditAction::BackupCreated, ResourceType::Backup)
                .user(actor)
                .details(json!({
                    "backup_id": result.backup_id,
                    "file_name": result.file_name,
                    "size_bytes": result.size_bytes,
                    "tables": result.tables,
                })),
        )
        .await;

        tracing::info!(
            backup_id = %result.backup_id,
            file = %result.file_path.display(),
            size_bytes = result.size_bytes,
            "Backup completed"
        );
        Ok(result)
    }

    async fn do_backup(
        &self,
        backup_id: &str,
        created_at: DateTime<Utc>,
        options: BackupOptions,
    ) -> Result<BackupResult> {
        let data = self.export(options).await?;
        let tables: Vec<String> = data.tables().iter().map(|t| t.to_string()).collect();

        let artifact = BackupArtifact {
            metadata: BackupManifest {
                backup_id: backup_id.to_string(),
                created_at,
                version: BACKUP_FORMAT_VERSION.to_string(),
                options,
                tables: tables.clone(),
            },
            data,
        };
        let bytes = serde_json::to_vec_pretty(&artifact)?;

        tokio::fs::create_dir_all(&self.backup_dir).await?;
        let file_name = backup_file_name(created_at, backup_id);
        let file_path = self.backup_dir.join(&file_name);
        let tmp_path = self.backup_dir.join(format!(".{}.tmp", file_name));

        write_atomically(&tmp_path, &file_path, &bytes).await?;

        Ok(BackupResult {
            backup_id: backup_id.to_string(),
            file_name,
            file_path,
            size_bytes: bytes.len() as u64,
            tables,
            created_at,
        })
    }

    /// Read enabled groups in dependency order.
    ///
    /// Each group is a separate read, so writes landing mid-export can
    /// produce an artifact whose groups disagree.
    async fn export(&self, options: BackupOptions) -> Result<BackupData> {
        let mut data = BackupData::default();
        for table in options.tables() {
            match table {
                Table::Users => data.users = Some(self.store.load_users().await?),
                Table::Games => {
                    data.games = Some(self.store.load_games(options.analytics).await?)
                }
                Table::Reviews => data.reviews = Some(self.store.load_reviews().await?),
                Table::Comments => data.comments = Some(self.store.load_comments().await?),
                Table::Communities => {
                    data.communities = Some(self.store.load_communities().await?)
                }
                Table::Achievements => {
                    data.achievements = Some(self.store.load_achievements().await?)
                }
            }
            tracing::debug!(%table, count = data.count(table).unwrap_or(0), "Exported table");
        }
        Ok(data)
    }

    /// Replace store contents with the artifact at `path`.
    pub async fn restore_backup(&self, path: &Path, actor: Option<&str>) -> Result<RestoreResult> {
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                AppError::NotFound(format!("Backup file {}", path.display()))
            }
            _ => AppError::RestoreFailed(format!("cannot read {}: {}", path.display(), e)),
        })?;
        let artifact = BackupArtifact::from_slice(&bytes)?;
        let backup_id = artifact.metadata.backup_id.clone();
        tracing::info!(%backup_id, file = %path.display(), "Starting restore");

        let mut tx = self
            .store
            .begin()
            .await
            .map_err(|e| AppError::RestoreFailed(e.to_string()))?;

        if let Err(e) = apply(tx.as_mut(), &artifact).await {
            tracing::error!(%backup_id, error = %e, "Restore failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            return Err(AppError::RestoreFailed(e.to_string()));
        }
        tx.commit()
            .await
            .map_err(|e| AppError::RestoreFailed(e.to_string()))?;

        let result = RestoreResult {
            backup_id,
            tables: artifact
                .data
                .tables()
                .iter()
                .map(|t| t.to_string())
                .collect(),
            records: artifact.data.record_counts(),
        };

        self.record(
            AuditEntry::new(AuditAction::BackupRestored, ResourceType::Backup)
                .user(actor)
                .details(json!({
                    "backup_id": result.backup_id,
                    "file": path.display().to_string(),
                    "tables": result.tables,
                    "records": result.records,
                })),
        )
        .await;

        tracing::info!(backup_id = %result.backup_id, "Restore completed");
        Ok(result)
    }

    /// Restore a file from the backup directory by bare name.
    pub async fn restore_by_name(
        &self,
        file_name: &str,
        actor: Option<&str>,
    ) -> Result<RestoreResult> {
        if !is_plain_file_name(file_name) {
            return Err(AppError::Validation(format!(
                "Invalid backup file name: {}",
                file_name
            )));
        }
        self.restore_backup(&self.backup_dir.join(file_name), actor)
            .await
    }

    /// Backup files in the backup directory, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupFileInfo>> {
        let mut entries = match tokio::fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut backups = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(dir = %self.backup_dir.display(), error = %e, "Stopped reading backup directory");
                    break;
                }
            };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Skipping unreadable backup entry");
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let manifest = match tokio::fs::read(&path).await {
                Ok(bytes) => BackupArtifact::manifest_from_slice(&bytes),
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Cannot read backup file");
                    None
                }
            };
            let modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            backups.push(BackupFileInfo {
                file_name: entry.file_name().to_string_lossy().into_owned(),
                file_path: path,
                size_bytes: metadata.len(),
                created_at: manifest.as_ref().map(|m| m.created_at).unwrap_or(modified),
                backup_id: manifest
                    .map(|m| m.backup_id)
                    .unwrap_or_else(|| UNKNOWN_BACKUP_ID.to_string()),
            });
        }

        backups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });
        Ok(backups)
    }

    /// Delete a backup file by bare name. Returns `false` on rejection or
    /// any filesystem error.
    pub async fn delete_backup(&self, file_name: &str, actor: Option<&str>) -> bool {
        if !is_plain_file_name(file_name) {
            tracing::warn!(%file_name, "Rejected backup delete with unsafe file name");
            return false;
        }

        let path = self.backup_dir.join(file_name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(file = %path.display(), error = %e, "Failed to delete backup");
            return false;
        }

        self.record(
            AuditEntry::new(AuditAction::BackupDeleted, ResourceType::Backup)
                .user(actor)
                .details(json!({ "file_name": file_name })),
        )
        .await;

        tracing::info!(%file_name, "Backup deleted");
        true
    }

    /// Append to the audit log. The audited operation has already happened,
    /// so a sink failure is logged and not propagated.
    async fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.append(&entry).await {
            tracing::error!(action = entry.action.as_str(), error = %e, "Failed to write audit entry");
        }
    }
}

/// Make every table present in the artifact match it.
///
/// Rows the artifact lacks are removed (children first) and the rest are
/// upserted in dependency order, so rows of absent tables survive unless
/// their parent is gone. Communities and achievements are only merged.
async fn apply(tx: &mut dyn StoreTransaction, artifact: &BackupArtifact) -> Result<()> {
    let data = &artifact.data;

    for table in Table::REPLACE_ORDER {
        if let Some(ids) = data.ids(table) {
            tx.retain(table, &ids).await?;
        }
    }

    if let Some(users) = &data.users {
        tx.upsert_users(users).await?;
    }
    if let Some(games) = &data.games {
        tx.upsert_games(games, artifact.metadata.options.analytics)
            .await?;
    }
    if let Some(reviews) = &data.reviews {
        tx.upsert_reviews(reviews).await?;
    }
    if let Some(comments) = &data.comments {
        tx.upsert_comments(comments).await?;
    }
    if let Some(communities) = &data.communities {
        tx.merge_communities(communities).await?;
    }
    if let Some(achievements) = &data.achievements {
        tx.merge_achievements(achievements).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::records::{GameRecord, UserRecord};
    use crate::models::role::Role;
    use crate::services::audit_service::MemoryAuditSink;
    use crate::store::memory::{MemoryState, MemoryStore};
    use tempfile::TempDir;

    fn user(id: &str) -> UserRecord {
        UserRecord {
            id: id.into(),
            email: format!("{}@example.com", id),
            name: Some(id.to_uppercase()),
            role: Role::Developer,
            created_at: Utc::now(),
            accounts: vec![],
            sessions: vec![],
            wallet: None,
            subscriptions: vec![],
        }
    }

    fn game(id: &str, developer: &str) -> GameRecord {
        GameRecord {
            id: id.into(),
            developer_id: developer.into(),
            title: "Orbit".into(),
            description: None,
            price_cents: 999,
            published: true,
            created_at: Utc::now(),
            monetization: None,
            analytics: vec![],
        }
    }

    fn service(store: MemoryStore, dir: &TempDir) -> (BackupService, Arc<MemoryAuditSink>) {
        let audit = Arc::new(MemoryAuditSink::new());
        let service = BackupService::new(Arc::new(store), audit.clone(), dir.path());
        (service, audit)
    }

    #[test]
    fn test_backup_id_shape() {
        let id = generate_backup_id(Utc::now());
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, generate_backup_id(Utc::now()));
    }

    #[test]
    fn test_backup_file_name_format() {
        let at = DateTime::parse_from_rfc3339("2026-03-05T07:08:09Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            backup_file_name(at, "0123456789abcdef"),
            "backup-20260305-070809-0123456789abcdef.json"
        );
    }

    #[test]
    fn test_plain_file_name() {
        assert!(is_plain_file_name("backup-1.json"));
        assert!(!is_plain_file_name(""));
        assert!(!is_plain_file_name("../etc/passwd"));
        assert!(!is_plain_file_name("nested/backup.json"));
        assert!(!is_plain_file_name("nested\\backup.json"));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        // Renaming a file onto a non-empty directory fails.
        let target = dir.path().join("backup-taken.json");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();
        let tmp = dir.path().join(".backup-taken.json.tmp");

        assert!(write_atomically(&tmp, &target, b"{}").await.is_err());
        assert!(!tmp.exists());
        assert!(target.join("keep").exists());

        let ok = dir.path().join("backup-ok.json");
        write_atomically(&tmp, &ok, b"{}").await.unwrap();
        assert!(!tmp.exists());
        assert_eq!(std::fs::read(&ok).unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_create_backup_writes_artifact() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::with_state(MemoryState {
            users: vec![user("u1")],
            games: vec![game("g1", "u1")],
            ..Default::default()
        });
        let (service, audit) = service(store, &dir);

        let result = service
            .create_backup(BackupOptions::default(), Some("admin"))
            .await
            .unwrap();

        assert!(result.file_path.exists());
        assert!(result.file_name.starts_with("backup-"));
        assert!(result.file_name.ends_with(&format!("-{}.json", result.backup_id)));
        assert_eq!(
            result.size_bytes,
            std::fs::metadata(&result.file_path).unwrap().len()
        );

        let artifact =
            BackupArtifact::from_slice(&std::fs::read(&result.file_path).unwrap()).unwrap();
        assert_eq!(artifact.metadata.version, BACKUP_FORMAT_VERSION);
        assert_eq!(artifact.data.count(Table::Users), Some(1));
        assert_eq!(artifact.data.count(Table::Games), Some(1));

        let entries = audit.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::BackupCreated);
        assert_eq!(entries[0].user_id.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_create_backup_respects_options() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(MemoryStore::new(), &dir);
        let options = BackupOptions {
            users: false,
            games: true,
            reviews: false,
            analytics: false,
        };

        let result = service.create_backup(options, None).await.unwrap();
        assert_eq!(result.tables, vec!["games", "communities", "achievements"]);
    }

    #[tokio::test]
    async fn test_create_backup_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let audit = Arc::new(MemoryAuditSink::new());
        let nested = dir.path().join("nested").join("backups");
        let service = BackupService::new(Arc::new(MemoryStore::new()), audit, &nested);

        let result = service
            .create_backup(BackupOptions::default(), None)
            .await
            .unwrap();
        assert!(result.file_path.starts_with(&nested));
    }

    #[tokio::test]
    async fn test_restore_rejects_missing_metadata_without_touching_store() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::with_state(MemoryState {
            users: vec![user("u1")],
            ..Default::default()
        });
        let before = store.snapshot().await;
        let (service, audit) = service(store.clone(), &dir);

        let path = dir.path().join("broken.json");
        std::fs::write(&path, br#"{"data": {"users": []}}"#).unwrap();

        let err = service.restore_backup(&path, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidFormat(_)));
        assert_eq!(store.snapshot().await, before);
        assert!(audit.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_rolls_back() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::with_state(MemoryState {
            users: vec![user("u1")],
            games: vec![game("g1", "u1")],
            ..Default::default()
        });
        let before = store.snapshot().await;
        let (service, _) = service(store.clone(), &dir);

        // Game references a developer the artifact does not contain.
        let artifact = json!({
            "metadata": {
                "backup_id": "deadbeefdeadbeef",
                "created_at": "2026-01-01T00:00:00Z",
                "version": "1.0",
                "options": {},
                "tables": ["users", "games"]
            },
            "data": {
                "users": [user("u2")],
                "games": [game("g2", "ghost")]
            }
        });
        let path = dir.path().join("dangling.json");
        std::fs::write(&path, serde_json::to_vec(&artifact).unwrap()).unwrap();

        let err = service.restore_backup(&path, None).await.unwrap_err();
        assert!(matches!(err, AppError::RestoreFailed(_)));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_restore_by_name_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(MemoryStore::new(), &dir);
        let err = service
            .restore_by_name("../outside.json", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_restore_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(MemoryStore::new(), &dir);
        let err = service
            .restore_by_name("backup-missing.json", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_backups_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let audit = Arc::new(MemoryAuditSink::new());
        let service = BackupService::new(
            Arc::new(MemoryStore::new()),
            audit,
            dir.path().join("absent"),
        );
        assert!(service.list_backups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_backups_newest_first_and_unknown_ids() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(MemoryStore::new(), &dir);

        let first = service
            .create_backup(BackupOptions::default(), None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = service
            .create_backup(BackupOptions::default(), None)
            .await
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        std::fs::write(dir.path().join("corrupt.json"), b"{oops").unwrap();

        let listed = service.list_backups().await.unwrap();
        assert_eq!(listed.len(), 3);

        let ours: Vec<&str> = listed
            .iter()
            .filter(|b| b.backup_id != UNKNOWN_BACKUP_ID)
            .map(|b| b.backup_id.as_str())
            .collect();
        assert_eq!(ours, vec![second.backup_id.as_str(), first.backup_id.as_str()]);

        let corrupt = listed
            .iter()
            .find(|b| b.file_name == "corrupt.json")
            .unwrap();
        assert_eq!(corrupt.backup_id, UNKNOWN_BACKUP_ID);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_backups_skips_broken_entries() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(MemoryStore::new(), &dir);
        let created = service
            .create_backup(BackupOptions::default(), None)
            .await
            .unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("gone.json"),
            dir.path().join("dangling.json"),
        )
        .unwrap();

        let listed = service.list_backups().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_name, created.file_name);
    }

    #[tokio::test]
    async fn test_delete_backup() {
        let dir = TempDir::new().unwrap();
        let (service, audit) = service(MemoryStore::new(), &dir);
        let created = service
            .create_backup(BackupOptions::default(), None)
            .await
            .unwrap();

        assert!(service.delete_backup(&created.file_name, Some("admin")).await);
        assert!(!created.file_path.exists());
        assert!(!service.delete_backup(&created.file_name, None).await);
        assert!(!service.delete_backup("../secrets.json", None).await);

        let deleted: Vec<_> = audit
            .entries()
            .await
            .into_iter()
            .filter(|e| e.action == AuditAction::BackupDeleted)
            .collect();
        assert_eq!(deleted.len(), 1);
    }
}
