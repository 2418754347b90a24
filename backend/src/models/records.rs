//! Marketplace records captured by backups.
//!
//! Top-level records embed the child rows needed to restore them, so a
//! user carries its accounts, sessions, wallet and subscriptions, and a game
//! carries its monetization settings and analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::role::Role;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub accounts: Vec<AccountRecord>,
    #[sqlx(skip)]
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[sqlx(skip)]
    #[serde(default)]
    pub wallet: Option<WalletRecord>,
    #[sqlx(skip)]
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionRecord>,
}

/// Linked identity-provider account.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_account_id: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub session_token: String,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct WalletRecord {
    pub id: String,
    pub user_id: String,
    pub balance_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub id: String,
    pub user_id: String,
    pub plan: String,
    pub status: String,
    pub billing_customer_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: String,
    pub developer_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub monetization: Option<MonetizationRecord>,
    #[sqlx(skip)]
    #[serde(default)]
    pub analytics: Vec<GameAnalyticsRecord>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MonetizationRecord {
    pub id: String,
    pub game_id: String,
    /// `free`, `paid`, `freemium` or `ad_supported`
    pub model: String,
    pub ads_enabled: bool,
    pub revenue_share_pct: i32,
}

/// Daily play statistics for one game.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct GameAnalyticsRecord {
    pub id: String,
    pub game_id: String,
    pub day: DateTime<Utc>,
    pub plays: i64,
    pub unique_players: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: String,
    pub game_id: String,
    pub user_id: String,
    pub rating: i32,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: String,
    pub review_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CommunityRecord {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    pub memberships: Vec<MembershipRecord>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub id: String,
    pub community_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AchievementRecord {
    pub id: String,
    pub game_id: String,
    pub name: String,
    pub description: Option<String>,
    pub points: i32,
    #[sqlx(skip)]
    #[serde(default)]
    pub unlocks: Vec<AchievementUnlockRecord>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AchievementUnlockRecord {
    pub id: String,
    pub achievement_id: String,
    pub user_id: String,
    pub unlocked_at: DateTime<Utc>,
}
