//! Persistent store for marketplace records.
//!
//! Backups read table groups through [`GameStore`]; restores write through a
//! [`StoreTransaction`] that either commits every change or none.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::backup::Table;
use crate::models::records::{
    AchievementRecord, CommentRecord, CommunityRecord, GameRecord, ReviewRecord, UserRecord,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Read side of the store plus the transaction entry point.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Users with accounts, sessions, wallet and subscriptions.
    async fn load_users(&self) -> Result<Vec<UserRecord>>;

    /// Games with monetization, and analytics when `include_analytics`.
    async fn load_games(&self, include_analytics: bool) -> Result<Vec<GameRecord>>;

    async fn load_reviews(&self) -> Result<Vec<ReviewRecord>>;

    async fn load_comments(&self) -> Result<Vec<CommentRecord>>;

    /// Communities with memberships.
    async fn load_communities(&self) -> Result<Vec<CommunityRecord>>;

    /// Achievements with per-user unlocks.
    async fn load_achievements(&self) -> Result<Vec<AchievementRecord>>;

    /// Start an all-or-nothing write transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// Write side used by restores.
///
/// A restore makes each table present in a backup match it: rows the backup
/// lacks are removed with [`retain`](StoreTransaction::retain), the rest are
/// upserted together with their nested rows. Communities and achievements
/// are merged instead. Dropping a transaction without calling
/// [`commit`](StoreTransaction::commit) discards it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Delete rows of `table` whose id is not in `keep`, cascading to rows
    /// that depend on them.
    async fn retain(&mut self, table: Table, keep: &[String]) -> Result<()>;

    /// Insert or overwrite users, replacing their accounts, sessions, wallet
    /// and subscriptions.
    async fn upsert_users(&mut self, users: &[UserRecord]) -> Result<()>;

    /// Insert or overwrite games and their monetization. Existing analytics
    /// are replaced only when `with_analytics`.
    async fn upsert_games(&mut self, games: &[GameRecord], with_analytics: bool) -> Result<()>;

    async fn upsert_reviews(&mut self, reviews: &[ReviewRecord]) -> Result<()>;

    async fn upsert_comments(&mut self, comments: &[CommentRecord]) -> Result<()>;

    /// Add missing communities and missing memberships. Existing rows are
    /// left as they are.
    async fn merge_communities(&mut self, communities: &[CommunityRecord]) -> Result<()>;

    /// Add missing achievements and missing unlocks.
    async fn merge_achievements(&mut self, achievements: &[AchievementRecord]) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
