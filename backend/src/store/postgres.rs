//! PostgreSQL store.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;

use super::{GameStore, StoreTransaction};
use crate::error::Result;
use crate::models::backup::Table;
use crate::models::records::{
    AccountRecord, AchievementRecord, AchievementUnlockRecord, CommentRecord, CommunityRecord,
    GameAnalyticsRecord, GameRecord, MembershipRecord, MonetizationRecord, ReviewRecord,
    SessionRecord, SubscriptionRecord, UserRecord, WalletRecord,
};

/// Group child rows by their parent id.
fn group_by<T>(rows: Vec<T>, parent: impl Fn(&T) -> &str) -> HashMap<String, Vec<T>> {
    let mut grouped: HashMap<String, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(parent(&row).to_string()).or_default().push(row);
    }
    grouped
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GameStore for PgStore {
    async fn load_users(&self) -> Result<Vec<UserRecord>> {
        let mut users = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, name, role, created_at FROM users ORDER BY created_at, id",
        )
        .fetch_all(&self.db)
        .await?;

        let accounts = sqlx::query_as::<_, AccountRecord>(
            "SELECT id, user_id, provider, provider_account_id FROM accounts ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;
        let sessions = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, user_id, session_token, expires FROM sessions ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;
        let wallets = sqlx::query_as::<_, WalletRecord>(
            "SELECT id, user_id, balance_cents, currency FROM wallets",
        )
        .fetch_all(&self.db)
        .await?;
        let subscriptions = sqlx::query_as::<_, SubscriptionRecord>(
            r#"
            SELECT id, user_id, plan, status, billing_customer_id, current_period_end
            FROM subscriptions
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut accounts = group_by(accounts, |a| &a.user_id);
        let mut sessions = group_by(sessions, |s| &s.user_id);
        let mut subscriptions = group_by(subscriptions, |s| &s.user_id);
        let mut wallets: HashMap<String, WalletRecord> = wallets
            .into_iter()
            .map(|w| (w.user_id.clone(), w))
            .collect();

        for user in &mut users {
            user.accounts = accounts.remove(&user.id).unwrap_or_default();
            user.sessions = sessions.remove(&user.id).unwrap_or_default();
            user.subscriptions = subscriptions.remove(&user.id).unwrap_or_default();
            user.wallet = wallets.remove(&user.id);
        }
        Ok(users)
    }

    async fn load_games(&self, include_analytics: bool) -> Result<Vec<GameRecord>> {
        let mut games = sqlx::query_as::<_, GameRecord>(
            r#"
            SELECT id, developer_id, title, description, price_cents, published, created_at
            FROM games
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let monetization = sqlx::query_as::<_, MonetizationRecord>(
            "SELECT id, game_id, model, ads_enabled, revenue_share_pct FROM game_monetization",
        )
        .fetch_all(&self.db)
        .await?;
        let mut monetization: HashMap<String, MonetizationRecord> = monetization
            .into_iter()
            .map(|m| (m.game_id.clone(), m))
            .collect();

        let mut analytics = if include_analytics {
            let rows = sqlx::query_as::<_, GameAnalyticsRecord>(
                r#"
                SELECT id, game_id, day, plays, unique_players, revenue_cents
                FROM game_analytics
                ORDER BY day, id
                "#,
            )
            .fetch_all(&self.db)
            .await?;
            group_by(rows, |a| &a.game_id)
        } else {
            HashMap::new()
        };

        for game in &mut games {
            game.monetization = monetization.remove(&game.id);
            game.analytics = analytics.remove(&game.id).unwrap_or_default();
        }
        Ok(games)
    }

    async fn load_reviews(&self) -> Result<Vec<ReviewRecord>> {
        let reviews = sqlx::query_as::<_, ReviewRecord>(
            r#"
            SELECT id, game_id, user_id, rating, content, created_at
            FROM reviews
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(reviews)
    }

    async fn load_comments(&self) -> Result<Vec<CommentRecord>> {
        let comments = sqlx::query_as::<_, CommentRecord>(
            r#"
            SELECT id, review_id, user_id, content, created_at
            FROM comments
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(comments)
    }

    async fn load_communities(&self) -> Result<Vec<CommunityRecord>> {
        let mut communities = sqlx::query_as::<_, CommunityRecord>(
            "SELECT id, name, description, created_at FROM communities ORDER BY created_at, id",
        )
        .fetch_all(&self.db)
        .await?;
        let members = sqlx::query_as::<_, MembershipRecord>(
            r#"
            SELECT id, community_id, user_id, role, joined_at
            FROM community_members
            ORDER BY joined_at, id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut members = group_by(members, |m| &m.community_id);
        for community in &mut communities {
            community.memberships = members.remove(&community.id).unwrap_or_default();
        }
        Ok(communities)
    }

    async fn load_achievements(&self) -> Result<Vec<AchievementRecord>> {
        let mut achievements = sqlx::query_as::<_, AchievementRecord>(
            "SELECT id, game_id, name, description, points FROM achievements ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;
        let unlocks = sqlx::query_as::<_, AchievementUnlockRecord>(
            r#"
            SELECT id, achievement_id, user_id, unlocked_at
            FROM user_achievements
            ORDER BY unlocked_at, id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let mut unlocks = group_by(unlocks, |u| &u.achievement_id);
        for achievement in &mut achievements {
            achievement.unlocks = unlocks.remove(&achievement.id).unwrap_or_default();
        }
        Ok(achievements)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }
}

/// Restore transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgStoreTransaction {
    /// Delete the rows of `table` owned by `parent_id` through `column`.
    async fn delete_children(&mut self, table: &str, column: &str, parent_id: &str) -> Result<()> {
        let statement = format!("DELETE FROM {} WHERE {} = $1", table, column);
        sqlx::query(&statement)
            .bind(parent_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn retain(&mut self, table: Table, keep: &[String]) -> Result<()> {
        let statement = format!("DELETE FROM {} WHERE id <> ALL($1)", table.as_str());
        let result = sqlx::query(&statement)
            .bind(keep)
            .execute(&mut *self.tx)
            .await?;
        tracing::debug!(%table, rows = result.rows_affected(), "Removed rows missing from backup");
        Ok(())
    }

    async fn upsert_users(&mut self, users: &[UserRecord]) -> Result<()> {
        for user in users {
            sqlx::query(
                r#"
                INSERT INTO users (id, email, name, role, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE SET
                    email = EXCLUDED.email,
                    name = EXCLUDED.name,
                    role = EXCLUDED.role,
                    created_at = EXCLUDED.created_at
                "#,
            )
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(user.role.as_str())
            .bind(user.created_at)
            .execute(&mut *self.tx)
            .await?;

            for table in ["accounts", "sessions", "wallets", "subscriptions"] {
                self.delete_children(table, "user_id", &user.id).await?;
            }

            for account in &user.accounts {
                sqlx::query(
                    r#"
                    INSERT INTO accounts (id, user_id, provider, provider_account_id)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(&account.id)
                .bind(&account.user_id)
                .bind(&account.provider)
                .bind(&account.provider_account_id)
                .execute(&mut *self.tx)
                .await?;
            }

            for session in &user.sessions {
                sqlx::query(
                    r#"
                    INSERT INTO sessions (id, user_id, session_token, expires)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(&session.id)
                .bind(&session.user_id)
                .bind(&session.session_token)
                .bind(session.expires)
                .execute(&mut *self.tx)
                .await?;
            }

            if let Some(wallet) = &user.wallet {
                sqlx::query(
                    r#"
                    INSERT INTO wallets (id, user_id, balance_cents, currency)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(&wallet.id)
                .bind(&wallet.user_id)
                .bind(wallet.balance_cents)
                .bind(&wallet.currency)
                .execute(&mut *self.tx)
                .await?;
            }

            for sub in &user.subscriptions {
                sqlx::query(
                    r#"
                    INSERT INTO subscriptions
                        (id, user_id, plan, status, billing_customer_id, current_period_end)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(&sub.id)
                .bind(&sub.user_id)
                .bind(&sub.plan)
                .bind(&sub.status)
                .bind(&sub.billing_customer_id)
                .bind(sub.current_period_end)
                .execute(&mut *self.tx)
                .await?;
            }
        }
        Ok(())
    }

    async fn upsert_games(&mut self, games: &[GameRecord], with_analytics: bool) -> Result<()> {
        for game in games {
            sqlx::query(
                r#"
                INSERT INTO games
                    (id, developer_id, title, description, price_cents, published, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE SET
                    developer_id = EXCLUDED.developer_id,
                    title = EXCLUDED.title,
                    description = EXCLUDED.description,
                    price_cents = EXCLUDED.price_cents,
                    published = EXCLUDED.published,
                    created_at = EXCLUDED.created_at
                "#,
            )
            .bind(&game.id)
            .bind(&game.developer_id)
            .bind(&game.title)
            .bind(&game.description)
            .bind(game.price_cents)
            .bind(game.published)
            .bind(game.created_at)
            .execute(&mut *self.tx)
            .await?;

            self.delete_children("game_monetization", "game_id", &game.id)
                .await?;
            if with_analytics {
                self.delete_children("game_analytics", "game_id", &game.id)
                    .await?;
            }

            if let Some(m) = &game.monetization {
                sqlx::query(
                    r#"
                    INSERT INTO game_monetization
                        (id, game_id, model, ads_enabled, revenue_share_pct)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(&m.id)
                .bind(&m.game_id)
                .bind(&m.model)
                .bind(m.ads_enabled)
                .bind(m.revenue_share_pct)
                .execute(&mut *self.tx)
                .await?;
            }

            for a in &game.analytics {
                sqlx::query(
                    r#"
                    INSERT INTO game_analytics
                        (id, game_id, day, plays, unique_players, revenue_cents)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(&a.id)
                .bind(&a.game_id)
                .bind(a.day)
                .bind(a.plays)
                .bind(a.unique_players)
                .bind(a.revenue_cents)
                .execute(&mut *self.tx)
                .await?;
            }
        }
        Ok(())
    }

    async fn upsert_reviews(&mut self, reviews: &[ReviewRecord]) -> Result<()> {
        for review in reviews {
            sqlx::query(
                r#"
                INSERT INTO reviews (id, game_id, user_id, rating, content, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET
                    game_id = EXCLUDED.game_id,
                    user_id = EXCLUDED.user_id,
                    rating = EXCLUDED.rating,
                    content = EXCLUDED.content,
                    created_at = EXCLUDED.created_at
                "#,
            )
            .bind(&review.id)
            .bind(&review.game_id)
            .bind(&review.user_id)
            .bind(review.rating)
            .bind(&review.content)
            .bind(review.created_at)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn upsert_comments(&mut self, comments: &[CommentRecord]) -> Result<()> {
        for comment in comments {
            sqlx::query(
                r#"
                INSERT INTO comments (id, review_id, user_id, content, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE SET
                    review_id = EXCLUDED.review_id,
                    user_id = EXCLUDED.user_id,
                    content = EXCLUDED.content,
                    created_at = EXCLUDED.created_at
                "#,
            )
            .bind(&comment.id)
            .bind(&comment.review_id)
            .bind(&comment.user_id)
            .bind(&comment.content)
            .bind(comment.created_at)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn merge_communities(&mut self, communities: &[CommunityRecord]) -> Result<()> {
        for community in communities {
            sqlx::query(
                r#"
                INSERT INTO communities (id, name, description, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&community.id)
            .bind(&community.name)
            .bind(&community.description)
            .bind(community.created_at)
            .execute(&mut *self.tx)
            .await?;

            for member in &community.memberships {
                sqlx::query(
                    r#"
                    INSERT INTO community_members (id, community_id, user_id, role, joined_at)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(&member.id)
                .bind(&member.community_id)
                .bind(&member.user_id)
                .bind(&member.role)
                .bind(member.joined_at)
                .execute(&mut *self.tx)
                .await?;
            }
        }
        Ok(())
    }

    async fn merge_achievements(&mut self, achievements: &[AchievementRecord]) -> Result<()> {
        for achievement in achievements {
            sqlx::query(
                r#"
                INSERT INTO achievements (id, game_id, name, description, points)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(&achievement.id)
            .bind(&achievement.game_id)
            .bind(&achievement.name)
            .bind(&achievement.description)
            .bind(achievement.points)
            .execute(&mut *self.tx)
            .await?;

            for unlock in &achievement.unlocks {
                sqlx::query(
                    r#"
                    INSERT INTO user_achievements (id, achievement_id, user_id, unlocked_at)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(&unlock.id)
                .bind(&unlock.achievement_id)
                .bind(&unlock.user_id)
                .bind(unlock.unlocked_at)
                .execute(&mut *self.tx)
                .await?;
            }
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
