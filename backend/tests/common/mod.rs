//! Shared setup for backend integration tests.
//!
//! Builds the full router over an in-memory store, an in-memory audit sink
//! and a temporary backup directory.

#![allow(dead_code)]

pub mod fixtures;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{Map, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use gamesphere_backend::api::{routes::create_router, AppState};
use gamesphere_backend::config::Config;
use gamesphere_backend::services::audit_service::MemoryAuditSink;
use gamesphere_backend::services::permission_service::default_hierarchy;
use gamesphere_backend::services::session_service::JwtSessionProvider;
use gamesphere_backend::store::memory::{MemoryState, MemoryStore};

pub const JWT_SECRET: &str = "integration-test-secret";

pub struct TestContext {
    pub router: Router,
    pub store: MemoryStore,
    pub audit: Arc<MemoryAuditSink>,
    pub state: Arc<AppState>,
    /// Held so the directory outlives the test.
    pub backup_dir: TempDir,
}

impl TestContext {
    pub fn new(seed: MemoryState) -> Self {
        Self::with_rate_limit(seed, 100)
    }

    pub fn with_rate_limit(seed: MemoryState, max_requests: u32) -> Self {
        let backup_dir = TempDir::new().expect("temp dir");
        let config = Config {
            database_url: None,
            bind_address: "127.0.0.1:0".to_string(),
            log_level: "debug".to_string(),
            backup_dir: backup_dir.path().to_path_buf(),
            jwt_secret: Some(JWT_SECRET.to_string()),
            rate_limit_max_requests: max_requests,
            rate_limit_window_secs: 60,
        };

        let store = MemoryStore::with_state(seed);
        let audit = Arc::new(MemoryAuditSink::new());
        let state = Arc::new(AppState::new(
            config,
            None,
            Arc::new(store.clone()),
            audit.clone(),
            Arc::new(JwtSessionProvider::new(JWT_SECRET)),
            Arc::new(default_hierarchy()),
        ));

        Self {
            router: create_router(state.clone()),
            store,
            audit,
            state,
            backup_dir,
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        self.backup_dir.path().to_path_buf()
    }

    pub fn token(&self, user_id: &str, role: &str) -> String {
        JwtSessionProvider::new(JWT_SECRET)
            .issue(user_id, role, Map::new(), 300)
            .expect("issue token")
    }

    /// Send a request; returns status and the JSON body (`Null` when empty).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
