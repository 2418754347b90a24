//! HTTP API tests driven through the full router.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use gamesphere_backend::services::audit_service::AuditAction;
use gamesphere_backend::store::memory::MemoryState;

use common::{fixtures, TestContext};

#[tokio::test]
async fn test_health_is_public() {
    let ctx = TestContext::new(MemoryState::default());
    let (status, body) = ctx.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_admin_routes_require_session() {
    let ctx = TestContext::new(MemoryState::default());
    let (status, body) = ctx
        .send(Method::GET, "/api/v1/admin/backups", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_non_admin_roles_cannot_touch_backups() {
    let ctx = TestContext::new(MemoryState::default());
    for role in ["PLAYER", "DEVELOPER", "MODERATOR"] {
        let token = ctx.token("someone", role);
        let (status, body) = ctx
            .send(Method::GET, "/api/v1/admin/backups", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "role {}", role);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, _) = ctx
            .send(Method::POST, "/api/v1/admin/backups", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "role {}", role);
    }
    assert!(ctx.audit.entries().await.is_empty());
}

#[tokio::test]
async fn test_admin_backup_lifecycle() {
    let ctx = TestContext::new(fixtures::marketplace());
    let admin = ctx.token("admin-1", "ADMIN");

    let (status, body) = ctx
        .send(Method::GET, "/api/v1/admin/backups", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, created) = ctx
        .send(
            Method::POST,
            "/api/v1/admin/backups",
            Some(&admin),
            Some(json!({ "reviews": false })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let file_name = created["file_name"].as_str().unwrap().to_string();
    assert_eq!(
        created["tables"],
        json!(["users", "games", "communities", "achievements"])
    );

    let (_, listed) = ctx
        .send(Method::GET, "/api/v1/admin/backups", Some(&admin), None)
        .await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["file_name"], file_name.as_str());

    let (status, restored) = ctx
        .send(
            Method::POST,
            "/api/v1/admin/backups/restore",
            Some(&admin),
            Some(json!({ "file_name": file_name })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(restored["backup_id"], created["backup_id"]);
    assert_eq!(restored["records"]["users"], 3);
    // Reviews were not in the backup and survive the restore.
    assert_eq!(ctx.store.snapshot().await.reviews.len(), 2);

    let (status, _) = ctx
        .send(
            Method::DELETE,
            &format!("/api/v1/admin/backups/{}", file_name),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!ctx.backup_path().join(&file_name).exists());

    let (status, _) = ctx
        .send(
            Method::DELETE,
            &format!("/api/v1/admin/backups/{}", file_name),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let actions: Vec<AuditAction> = ctx
        .audit
        .entries()
        .await
        .iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::BackupCreated,
            AuditAction::BackupRestored,
            AuditAction::BackupDeleted
        ]
    );
    assert!(ctx
        .audit
        .entries()
        .await
        .iter()
        .all(|e| e.user_id.as_deref() == Some("admin-1")));

    let (status, audit) = ctx
        .send(Method::GET, "/api/v1/admin/audit?limit=2", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit.as_array().unwrap().len(), 2);
    assert_eq!(audit[0]["action"], "BACKUP_DELETED");
}

#[tokio::test]
async fn test_restore_rejects_paths_outside_backup_dir() {
    let ctx = TestContext::new(fixtures::marketplace());
    let before = ctx.store.snapshot().await;
    let admin = ctx.token("admin-1", "ADMIN");

    let (status, body) = ctx
        .send(
            Method::POST,
            "/api/v1/admin/backups/restore",
            Some(&admin),
            Some(json!({ "file_name": "../../etc/passwd" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(ctx.store.snapshot().await, before);
}

#[tokio::test]
async fn test_restore_malformed_file_is_bad_request() {
    let ctx = TestContext::new(fixtures::marketplace());
    let before = ctx.store.snapshot().await;
    let admin = ctx.token("admin-1", "ADMIN");
    std::fs::write(ctx.backup_path().join("broken.json"), b"{\"data\": {}}").unwrap();

    let (status, body) = ctx
        .send(
            Method::POST,
            "/api/v1/admin/backups/restore",
            Some(&admin),
            Some(json!({ "file_name": "broken.json" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FORMAT");
    assert_eq!(ctx.store.snapshot().await, before);
}

#[tokio::test]
async fn test_my_permissions_reflect_hierarchy() {
    let ctx = TestContext::new(MemoryState::default());
    let token = ctx.token("mod-1", "MODERATOR");

    let (status, body) = ctx
        .send(Method::GET, "/api/v1/permissions/me", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "MODERATOR");
    assert_eq!(body["inherits"], "PLAYER");

    let perms = body["permissions"].as_array().unwrap();
    let has = |res: &str, act: &str| {
        perms
            .iter()
            .any(|p| p["resource"] == res && p["action"] == act)
    };
    assert!(has("reviews", "moderate"));
    assert!(has("games", "play"));
    assert!(!has("backups", "read"));
}

#[tokio::test]
async fn test_permission_check_uses_context() {
    let ctx = TestContext::new(MemoryState::default());
    let player = ctx.token("p-1", "PLAYER");
    let developer = ctx.token("d-1", "DEVELOPER");

    let (status, body) = ctx
        .send(
            Method::POST,
            "/api/v1/permissions/check",
            Some(&player),
            Some(json!({ "resource": "games", "action": "create" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], false);

    let (_, body) = ctx
        .send(
            Method::POST,
            "/api/v1/permissions/check",
            Some(&developer),
            Some(json!({ "resource": "games", "action": "update", "context": { "owner": false } })),
        )
        .await;
    assert_eq!(body["allowed"], false);

    let (_, body) = ctx
        .send(
            Method::POST,
            "/api/v1/permissions/check",
            Some(&developer),
            Some(json!({ "resource": "games", "action": "update", "context": { "owner": true } })),
        )
        .await;
    assert_eq!(body["allowed"], true);
    assert_eq!(body["permission"], "games:update");
}

#[tokio::test]
async fn test_api_is_rate_limited_per_user() {
    let ctx = TestContext::with_rate_limit(MemoryState::default(), 3);
    let alice = ctx.token("alice", "PLAYER");
    let bob = ctx.token("bob", "PLAYER");

    for _ in 0..3 {
        let (status, _) = ctx
            .send(Method::GET, "/api/v1/permissions/me", Some(&alice), None)
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = ctx
        .send(Method::GET, "/api/v1/permissions/me", Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMIT_EXCEEDED");

    let (status, _) = ctx
        .send(Method::GET, "/api/v1/permissions/me", Some(&bob), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}
