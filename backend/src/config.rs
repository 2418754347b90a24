//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use std::env;
use std::path::PathBuf;

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Database connection URL. When unset the server runs on an in-memory store.
    pub database_url: Option<String>,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Log level
    pub log_level: String,

    /// Directory holding backup artifacts
    pub backup_dir: PathBuf,

    /// JWT secret key used to validate session tokens. Only `serve` needs it.
    pub jwt_secret: Option<String>,

    /// Maximum requests per identity per window
    pub rate_limit_max_requests: u32,

    /// Rate limit window length in seconds
    pub rate_limit_window_secs: u64,
}

redacted_debug!(Config {
    redact_option database_url,
    show bind_address,
    show log_level,
    show backup_dir,
    redact_option jwt_secret,
    show rate_limit_max_requests,
    show rate_limit_window_secs,
});

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            backup_dir: env::var("BACKUP_DIR")
                .unwrap_or_else(|_| "./backups".into())
                .into(),
            jwt_secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            rate_limit_max_requests: env::var("RATE_LIMIT_MAX_REQUESTS")
                .unwrap_or_else(|_| "100".into())
                .parse()
                .unwrap_or(100),
            rate_limit_window_secs: env::var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),
        })
    }

    /// The session signing secret, required to serve the API.
    pub fn require_jwt_secret(&self) -> Result<&str> {
        self.jwt_secret
            .as_deref()
            .ok_or_else(|| AppError::Config("JWT_SECRET not set".into()))
    }
}
