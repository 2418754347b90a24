//! Fixed-window rate limiting.
//!
//! Window state lives behind [`RateLimitStore`] so deployments with several
//! replicas can share counters. [`MemoryRateLimitStore`] is the
//! single-process implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Request;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// Counter state for one key after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

/// Shared storage for rate limit windows.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record one request for `key` at `now`.
    ///
    /// Starts a fresh window of length `window` (count 1) when the key has no
    /// window or its window has ended; otherwise increments the count. The
    /// read-modify-write must be atomic per key.
    async fn hit(&self, key: &str, window: Duration, now: DateTime<Utc>) -> WindowState;

    /// Drop windows that ended before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>);
}

/// In-process window store. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    windows: Mutex<HashMap<String, WindowState>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.windows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.windows.lock().await.is_empty()
    }
}

fn window_delta(window: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(i64::try_from(window.as_millis()).unwrap_or(i64::MAX / 2))
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, key: &str, window: Duration, now: DateTime<Utc>) -> WindowState {
        let mut windows = self.windows.lock().await;
        let state = windows.entry(key.to_string()).or_insert(WindowState {
            count: 0,
            reset_at: now,
        });

        if now >= state.reset_at {
            *state = WindowState {
                count: 1,
                reset_at: now + window_delta(window),
            };
        } else {
            state.count = state.count.saturating_add(1);
        }
        *state
    }

    async fn purge_expired(&self, now: DateTime<Utc>) {
        let mut windows = self.windows.lock().await;
        windows.retain(|_, state| state.reset_at > now);
    }
}

/// Rate limiter that tracks requests per key (user or IP).
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: u32,
    window: Duration,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Limiter backed by a fresh in-memory store.
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self::with_store(
            Arc::new(MemoryRateLimitStore::new()),
            max_requests,
            Duration::from_secs(window_secs),
        )
    }

    pub fn with_store(store: Arc<dyn RateLimitStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window,
        }
    }

    /// Check if a request should be allowed.
    ///
    /// Returns `Ok(remaining)` when allowed, or `Err(retry_after_secs)` once
    /// the count for the current window exceeds the limit.
    pub async fn check_rate_limit(&self, key: &str) -> Result<u32, u64> {
        self.check_rate_limit_at(key, Utc::now()).await
    }

    /// [`check_rate_limit`](Self::check_rate_limit) with an explicit clock.
    pub async fn check_rate_limit_at(&self, key: &str, now: DateTime<Utc>) -> Result<u32, u64> {
        let state = self.store.hit(key, self.window, now).await;

        if state.count > self.max_requests {
            let retry_after = (state.reset_at - now).num_seconds().max(1) as u64;
            tracing::debug!(key, count = state.count, retry_after, "Rate limit exceeded");
            return Err(retry_after);
        }

        Ok(self.max_requests - state.count)
    }

    /// Drop expired windows. Call periodically to bound memory.
    pub async fn cleanup_expired(&self) {
        self.store.purge_expired(Utc::now()).await;
    }
}

/// Key for anonymous callers.
///
/// Uses the TCP peer address from `ConnectInfo`; proxy headers are client
/// controlled and ignored.
pub fn extract_client_ip(request: &Request) -> String {
    if let Some(connect_info) = request
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
    {
        return format!("ip:{}", connect_info.0.ip());
    }

    // All unidentified callers share one bucket.
    "ip:unknown".to_string()
}
