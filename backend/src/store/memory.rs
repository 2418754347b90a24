//! In-memory store.
//!
//! Mirrors the relational schema closely enough for backups to behave the
//! same way: writes check that referenced parents exist, deletes cascade to
//! dependent rows, and transactions work on a private copy that replaces
//! the shared state on commit.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{GameStore, StoreTransaction};
use crate::error::{AppError, Result};
use crate::models::backup::Table;
use crate::models::records::{
    AchievementRecord, CommentRecord, CommunityRecord, GameRecord, ReviewRecord, UserRecord,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    pub users: Vec<UserRecord>,
    pub games: Vec<GameRecord>,
    pub reviews: Vec<ReviewRecord>,
    pub comments: Vec<CommentRecord>,
    pub communities: Vec<CommunityRecord>,
    pub achievements: Vec<AchievementRecord>,
}

impl MemoryState {
    fn user_ids(&self) -> HashSet<String> {
        self.users.iter().map(|u| u.id.clone()).collect()
    }

    fn game_ids(&self) -> HashSet<String> {
        self.games.iter().map(|g| g.id.clone()).collect()
    }

    fn review_ids(&self) -> HashSet<String> {
        self.reviews.iter().map(|r| r.id.clone()).collect()
    }

    /// Remove rows whose parents are gone, like `ON DELETE CASCADE`.
    fn prune_orphans(&mut self) {
        let users = self.user_ids();
        self.games.retain(|g| users.contains(&g.developer_id));

        let games = self.game_ids();
        self.reviews
            .retain(|r| games.contains(&r.game_id) && users.contains(&r.user_id));

        let reviews = self.review_ids();
        self.comments
            .retain(|c| reviews.contains(&c.review_id) && users.contains(&c.user_id));

        for community in &mut self.communities {
            community.memberships.retain(|m| users.contains(&m.user_id));
        }

        self.achievements.retain(|a| games.contains(&a.game_id));
        for achievement in &mut self.achievements {
            achievement.unlocks.retain(|u| users.contains(&u.user_id));
        }
    }
}

fn missing_parent(table: &str, column: &str, value: &str) -> AppError {
    AppError::Database(format!(
        "insert into \"{}\" violates foreign key: {} {} does not exist",
        table, column, value
    ))
}

/// Shared in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: MemoryState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn load_users(&self) -> Result<Vec<UserRecord>> {
        Ok(self.state.read().await.users.clone())
    }

    async fn load_games(&self, include_analytics: bool) -> Result<Vec<GameRecord>> {
        let mut games = self.state.read().await.games.clone();
        if !include_analytics {
            for game in &mut games {
                game.analytics.clear();
            }
        }
        Ok(games)
    }

    async fn load_reviews(&self) -> Result<Vec<ReviewRecord>> {
        Ok(self.state.read().await.reviews.clone())
    }

    async fn load_comments(&self) -> Result<Vec<CommentRecord>> {
        Ok(self.state.read().await.comments.clone())
    }

    async fn load_communities(&self) -> Result<Vec<CommunityRecord>> {
        Ok(self.state.read().await.communities.clone())
    }

    async fn load_achievements(&self) -> Result<Vec<AchievementRecord>> {
        Ok(self.state.read().await.achievements.clone())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let working = self.state.read().await.clone();
        Ok(Box::new(MemoryTransaction {
            working,
            target: self.state.clone(),
        }))
    }
}

/// Transaction over a private copy of the state.
///
/// Commit replaces the shared state wholesale; concurrent transactions are
/// last-writer-wins.
pub struct MemoryTransaction {
    working: MemoryState,
    target: Arc<RwLock<MemoryState>>,
}

/// Overwrite the row with the same id, or append.
fn upsert_by_id<T: Clone>(rows: &mut Vec<T>, row: &T, id: impl Fn(&T) -> &str) {
    match rows.iter_mut().find(|r| id(&**r) == id(row)) {
        Some(existing) => *existing = row.clone(),
        None => rows.push(row.clone()),
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn retain(&mut self, table: Table, keep: &[String]) -> Result<()> {
        let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
        let state = &mut self.working;
        match table {
            Table::Users => state.users.retain(|r| keep.contains(r.id.as_str())),
            Table::Games => state.games.retain(|r| keep.contains(r.id.as_str())),
            Table::Reviews => state.reviews.retain(|r| keep.contains(r.id.as_str())),
            Table::Comments => state.comments.retain(|r| keep.contains(r.id.as_str())),
            Table::Communities => state.communities.retain(|r| keep.contains(r.id.as_str())),
            Table::Achievements => state.achievements.retain(|r| keep.contains(r.id.as_str())),
        }
        state.prune_orphans();
        Ok(())
    }

    async fn upsert_users(&mut self, users: &[UserRecord]) -> Result<()> {
        for user in users {
            upsert_by_id(&mut self.working.users, user, |u| u.id.as_str());
        }
        Ok(())
    }

    async fn upsert_games(&mut self, games: &[GameRecord], with_analytics: bool) -> Result<()> {
        let users = self.working.user_ids();
        for game in games {
            if !users.contains(&game.developer_id) {
                return Err(missing_parent("games", "developer_id", &game.developer_id));
            }
            let mut game = game.clone();
            if !with_analytics {
                if let Some(existing) = self.working.games.iter().find(|g| g.id == game.id) {
                    game.analytics = existing.analytics.clone();
                }
            }
            upsert_by_id(&mut self.working.games, &game, |g| g.id.as_str());
        }
        Ok(())
    }

    async fn upsert_reviews(&mut self, reviews: &[ReviewRecord]) -> Result<()> {
        let users = self.working.user_ids();
        let games = self.working.game_ids();
        for review in reviews {
            if !games.contains(&review.game_id) {
                return Err(missing_parent("reviews", "game_id", &review.game_id));
            }
            if !users.contains(&review.user_id) {
                return Err(missing_parent("reviews", "user_id", &review.user_id));
            }
            upsert_by_id(&mut self.working.reviews, review, |r| r.id.as_str());
        }
        Ok(())
    }

    async fn upsert_comments(&mut self, comments: &[CommentRecord]) -> Result<()> {
        let users = self.working.user_ids();
        let reviews = self.working.review_ids();
        for comment in comments {
            if !reviews.contains(&comment.review_id) {
                return Err(missing_parent("comments", "review_id", &comment.review_id));
            }
            if !users.contains(&comment.user_id) {
                return Err(missing_parent("comments", "user_id", &comment.user_id));
            }
            upsert_by_id(&mut self.working.comments, comment, |c| c.id.as_str());
        }
        Ok(())
    }

    async fn merge_communities(&mut self, communities: &[CommunityRecord]) -> Result<()> {
        let users = self.working.user_ids();
        let mut member_ids: HashSet<String> = self
            .working
            .communities
            .iter()
            .flat_map(|c| c.memberships.iter().map(|m| m.id.clone()))
            .collect();

        for community in communities {
            if let Some(m) = community
                .memberships
                .iter()
                .find(|m| !users.contains(&m.user_id))
            {
                return Err(missing_parent("community_members", "user_id", &m.user_id));
            }

            let existing = self.working.communities.iter().position(|c| c.id == community.id);
            let target = match existing {
                Some(i) => &mut self.working.communities[i],
                None => {
                    let mut fresh = community.clone();
                    fresh.memberships.clear();
                    self.working.communities.push(fresh);
                    let last = self.working.communities.len() - 1;
                    &mut self.working.communities[last]
                }
            };

            for member in &community.memberships {
                let duplicate = target.memberships.iter().any(|m| m.user_id == member.user_id);
                if !duplicate && member_ids.insert(member.id.clone()) {
                    target.memberships.push(member.clone());
                }
            }
        }
        Ok(())
    }

    async fn merge_achievements(&mut self, achievements: &[AchievementRecord]) -> Result<()> {
        let users = self.working.user_ids();
        let games = self.working.game_ids();
        let mut unlock_ids: HashSet<String> = self
            .working
            .achievements
            .iter()
            .flat_map(|a| a.unlocks.iter().map(|u| u.id.clone()))
            .collect();

        for achievement in achievements {
            if !games.contains(&achievement.game_id) {
                return Err(missing_parent("achievements", "game_id", &achievement.game_id));
            }
            if let Some(u) = achievement
                .unlocks
                .iter()
                .find(|u| !users.contains(&u.user_id))
            {
                return Err(missing_parent("user_achievements", "user_id", &u.user_id));
            }

            let existing = self.working.achievements.iter().position(|a| a.id == achievement.id);
            let target = match existing {
                Some(i) => &mut self.working.achievements[i],
                None => {
                    let mut fresh = achievement.clone();
                    fresh.unlocks.clear();
                    self.working.achievements.push(fresh);
                    let last = self.working.achievements.len() - 1;
                    &mut self.working.achievements[last]
                }
            };

            for unlock in &achievement.unlocks {
                let duplicate = target.unlocks.iter().any(|u| u.user_id == unlock.user_id);
                if !duplicate && unlock_ids.insert(unlock.id.clone()) {
                    target.unlocks.push(unlock.clone());
                }
            }
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        *self.target.write().await = self.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
