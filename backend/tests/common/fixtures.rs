//! Marketplace fixtures for backup and API tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};

use gamesphere_backend::models::records::{
    AccountRecord, AchievementRecord, AchievementUnlockRecord, CommentRecord, CommunityRecord,
    GameAnalyticsRecord, GameRecord, MembershipRecord, MonetizationRecord, ReviewRecord,
    SessionRecord, SubscriptionRecord, UserRecord, WalletRecord,
};
use gamesphere_backend::models::role::Role;
use gamesphere_backend::store::memory::MemoryState;

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, day, 12, 0, 0).unwrap()
}

pub fn user(id: &str, role: Role) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        email: format!("{}@gamesphere.test", id),
        name: Some(id.to_uppercase()),
        role,
        created_at: at(1),
        accounts: vec![AccountRecord {
            id: format!("acct-{}", id),
            user_id: id.to_string(),
            provider: "github".to_string(),
            provider_account_id: format!("gh-{}", id),
        }],
        sessions: vec![SessionRecord {
            id: format!("sess-{}", id),
            user_id: id.to_string(),
            session_token: format!("token-{}", id),
            expires: at(28),
        }],
        wallet: Some(WalletRecord {
            id: format!("wallet-{}", id),
            user_id: id.to_string(),
            balance_cents: 2_500,
            currency: "USD".to_string(),
        }),
        subscriptions: vec![SubscriptionRecord {
            id: format!("sub-{}", id),
            user_id: id.to_string(),
            plan: "pro".to_string(),
            status: "active".to_string(),
            billing_customer_id: Some(format!("cus_{}", id)),
            current_period_end: Some(at(31)),
        }],
    }
}

pub fn game(id: &str, developer: &str) -> GameRecord {
    GameRecord {
        id: id.to_string(),
        developer_id: developer.to_string(),
        title: format!("Game {}", id),
        description: Some("A space roguelike".to_string()),
        price_cents: 1_499,
        published: true,
        created_at: at(2),
        monetization: Some(MonetizationRecord {
            id: format!("mon-{}", id),
            game_id: id.to_string(),
            model: "paid".to_string(),
            ads_enabled: false,
            revenue_share_pct: 70,
        }),
        analytics: vec![GameAnalyticsRecord {
            id: format!("stats-{}", id),
            game_id: id.to_string(),
            day: at(3),
            plays: 120,
            unique_players: 40,
            revenue_cents: 5_996,
        }],
    }
}

/// Two players, a developer with two games, reviews, comments, a community
/// and an unlocked achievement.
pub fn marketplace() -> MemoryState {
    MemoryState {
        users: vec![
            user("dev-1", Role::Developer),
            user("player-1", Role::Player),
            user("player-2", Role::Player),
        ],
        games: vec![game("game-1", "dev-1"), game("game-2", "dev-1")],
        reviews: vec![
            ReviewRecord {
                id: "review-1".to_string(),
                game_id: "game-1".to_string(),
                user_id: "player-1".to_string(),
                rating: 5,
                content: Some("Great".to_string()),
                created_at: at(4),
            },
            ReviewRecord {
                id: "review-2".to_string(),
                game_id: "game-2".to_string(),
                user_id: "player-2".to_string(),
                rating: 3,
                content: None,
                created_at: at(5),
            },
        ],
        comments: vec![CommentRecord {
            id: "comment-1".to_string(),
            review_id: "review-1".to_string(),
            user_id: "player-2".to_string(),
            content: "Agreed".to_string(),
            created_at: at(6),
        }],
        communities: vec![CommunityRecord {
            id: "community-1".to_string(),
            name: "Roguelike Fans".to_string(),
            description: None,
            created_at: at(7),
            memberships: vec![MembershipRecord {
                id: "member-1".to_string(),
                community_id: "community-1".to_string(),
                user_id: "player-1".to_string(),
                role: "member".to_string(),
                joined_at: at(8),
            }],
        }],
        achievements: vec![AchievementRecord {
            id: "ach-1".to_string(),
            game_id: "game-1".to_string(),
            name: "First Blood".to_string(),
            description: None,
            points: 10,
            unlocks: vec![AchievementUnlockRecord {
                id: "unlock-1".to_string(),
                achievement_id: "ach-1".to_string(),
                user_id: "player-1".to_string(),
                unlocked_at: at(9),
            }],
        }],
    }
}
