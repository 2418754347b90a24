//! Backup artifact model.
//!
//! A backup is one JSON document: `{"metadata": BackupManifest, "data": {...}}`
//! where `data` maps table names to record lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use super::records::{
    AchievementRecord, CommentRecord, CommunityRecord, GameRecord, ReviewRecord, UserRecord,
};
use crate::error::{AppError, Result};

/// Current artifact schema version.
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// Table groups a backup can contain, in restore (dependency) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Users,
    Games,
    Reviews,
    Comments,
    Communities,
    Achievements,
}

impl Table {
    pub const RESTORE_ORDER: [Table; 6] = [
        Table::Users,
        Table::Games,
        Table::Reviews,
        Table::Comments,
        Table::Communities,
        Table::Achievements,
    ];

    /// Tables a restore replaces, children first. Communities and
    /// achievements are merged instead.
    pub const REPLACE_ORDER: [Table; 4] =
        [Table::Comments, Table::Reviews, Table::Games, Table::Users];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Games => "games",
            Table::Reviews => "reviews",
            Table::Comments => "comments",
            Table::Communities => "communities",
            Table::Achievements => "achievements",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which optional table groups to include. Communities and achievements are
/// always included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupOptions {
    pub users: bool,
    pub games: bool,
    /// Reviews together with their comments.
    pub reviews: bool,
    /// Embed per-game analytics in game records. No effect without `games`.
    pub analytics: bool,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            users: true,
            games: true,
            reviews: true,
            analytics: true,
        }
    }
}

impl BackupOptions {
    /// Tables this selection produces, in restore order.
    pub fn tables(&self) -> Vec<Table> {
        Table::RESTORE_ORDER
            .into_iter()
            .filter(|t| match t {
                Table::Users => self.users,
                Table::Games => self.games,
                Table::Reviews | Table::Comments => self.reviews,
                Table::Communities | Table::Achievements => true,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub backup_id: String,
    pub created_at: DateTime<Utc>,
    pub version: String,
    pub options: BackupOptions,
    pub tables: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games: Option<Vec<GameRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<Vec<ReviewRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<CommentRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communities: Option<Vec<CommunityRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<Vec<AchievementRecord>>,
}

impl BackupData {
    /// Tables present in this data set, in restore order.
    pub fn tables(&self) -> Vec<Table> {
        Table::RESTORE_ORDER
            .into_iter()
            .filter(|t| self.count(*t).is_some())
            .collect()
    }

    /// Top-level record count for `table`, or `None` when it is absent.
    pub fn count(&self, table: Table) -> Option<usize> {
        match table {
            Table::Users => self.users.as_ref().map(Vec::len),
            Table::Games => self.games.as_ref().map(Vec::len),
            Table::Reviews => self.reviews.as_ref().map(Vec::len),
            Table::Comments => self.comments.as_ref().map(Vec::len),
            Table::Communities => self.communities.as_ref().map(Vec::len),
            Table::Achievements => self.achievements.as_ref().map(Vec::len),
        }
    }

    /// Top-level ids for `table`, or `None` when it is absent.
    pub fn ids(&self, table: Table) -> Option<Vec<String>> {
        fn collect<T>(rows: &Option<Vec<T>>, id: impl Fn(&T) -> &str) -> Option<Vec<String>> {
            rows.as_ref()
                .map(|rows| rows.iter().map(|r| id(r).to_string()).collect())
        }
        match table {
            Table::Users => collect(&self.users, |r| r.id.as_str()),
            Table::Games => collect(&self.games, |r| r.id.as_str()),
            Table::Reviews => collect(&self.reviews, |r| r.id.as_str()),
            Table::Comments => collect(&self.comments, |r| r.id.as_str()),
            Table::Communities => collect(&self.communities, |r| r.id.as_str()),
            Table::Achievements => collect(&self.achievements, |r| r.id.as_str()),
        }
    }

    pub fn record_counts(&self) -> BTreeMap<String, usize> {
        self.tables()
            .into_iter()
            .filter_map(|t| self.count(t).map(|n| (t.as_str().to_string(), n)))
            .collect()
    }
}

/// The full on-disk document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupArtifact {
    pub metadata: BackupManifest,
    pub data: BackupData,
}

impl BackupArtifact {
    /// Parse an artifact, rejecting anything without the expected
    /// `metadata`/`data` shape as [`AppError::InvalidFormat`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| AppError::InvalidFormat(format!("not a JSON document: {}", e)))?;

        let obj = value
            .as_object()
            .ok_or_else(|| AppError::InvalidFormat("top level is not an object".into()))?;
        for key in ["metadata", "data"] {
            if !obj.get(key).is_some_and(|v| v.is_object()) {
                return Err(AppError::InvalidFormat(format!("missing `{}` object", key)));
            }
        }

        serde_json::from_value(value).map_err(|e| AppError::InvalidFormat(e.to_string()))
    }

    /// Read only the manifest. Cheaper than a full parse and tolerant of
    /// data sections this build does not understand.
    pub fn manifest_from_slice(bytes: &[u8]) -> Option<BackupManifest> {
        #[derive(Deserialize)]
        struct Head {
            metadata: BackupManifest,
        }
        serde_json::from_slice::<Head>(bytes).ok().map(|h| h.metadata)
    }
}

/// Outcome of a successful backup.
#[derive(Debug, Clone, Serialize)]
pub struct BackupResult {
    pub backup_id: String,
    pub file_name: String,
    pub file_path: PathBuf,
    pub size_bytes: u64,
    pub tables: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a successful restore.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreResult {
    pub backup_id: String,
    pub tables: Vec<String>,
    pub records: BTreeMap<String, usize>,
}

/// One entry of the backup catalog.
#[derive(Debug, Clone, Serialize)]
pub struct BackupFileInfo {
    pub file_name: String,
    pub file_path: PathBuf,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// `"unknown"` when the manifest could not be read.
    pub backup_id: String,
}
