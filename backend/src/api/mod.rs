//! API module - HTTP handlers and middleware.

pub mod handlers;
pub mod middleware;
pub mod routes;

use crate::api::middleware::auth::ApiGuard;
use crate::api::middleware::rate_limit::RateLimiter;
use crate::config::Config;
use crate::services::audit_service::AuditSink;
use crate::services::backup_service::BackupService;
use crate::services::permission_service::RoleHierarchy;
use crate::services::session_service::SessionProvider;
use crate::store::GameStore;
use sqlx::PgPool;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Present when running against PostgreSQL.
    pub db: Option<PgPool>,
    pub store: Arc<dyn GameStore>,
    pub audit: Arc<dyn AuditSink>,
    pub sessions: Arc<dyn SessionProvider>,
    pub hierarchy: Arc<RoleHierarchy>,
    pub rate_limiter: Arc<RateLimiter>,
    pub backup_service: Arc<BackupService>,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Option<PgPool>,
        store: Arc<dyn GameStore>,
        audit: Arc<dyn AuditSink>,
        sessions: Arc<dyn SessionProvider>,
        hierarchy: Arc<RoleHierarchy>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max_requests,
            config.rate_limit_window_secs,
        ));
        let backup_service = Arc::new(BackupService::new(
            store.clone(),
            audit.clone(),
            config.backup_dir.clone(),
        ));
        Self {
            config,
            db,
            store,
            audit,
            sessions,
            hierarchy,
            rate_limiter,
            backup_service,
        }
    }

    /// Authenticated, rate limited guard with no route permission.
    pub fn guard(&self) -> ApiGuard {
        ApiGuard::new(self.sessions.clone(), self.hierarchy.clone())
            .rate_limited(self.rate_limiter.clone())
    }
}

pub type SharedState = Arc<AppState>;
