//! Application error types and result alias.

use axum::{
    http::{header::HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// No valid session
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Session valid but permission denied
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Too many requests for one identity within the window
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },

    /// Malformed backup artifact
    #[error("Invalid backup format: {0}")]
    InvalidFormat(String),

    /// Backup creation failed
    #[error("Backup failed: {0}")]
    BackupFailed(String),

    /// Restore failed and was rolled back
    #[error("Restore failed: {0}")]
    RestoreFailed(String),

    /// Not found error
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Address parse error
    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JWT error
    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl AppError {
    /// Machine-readable code carried in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Migration(_) => "MIGRATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::InvalidFormat(_) => "INVALID_FORMAT",
            AppError::BackupFailed(_) => "BACKUP_FAILED",
            AppError::RestoreFailed(_) => "RESTORE_FAILED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::AddrParse(_) => "ADDR_PARSE_ERROR",
            AppError::Json(_) => "JSON_ERROR",
            AppError::Jwt(_) => "UNAUTHORIZED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidFormat(_) | AppError::Validation(_) | AppError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable message. Plumbing failures never echo their cause.
    fn public_message(&self) -> String {
        match self {
            AppError::Config(_) => "Server misconfigured".to_string(),
            AppError::Database(_) => "Database operation failed".to_string(),
            AppError::Migration(_) => "Database migration failed".to_string(),
            AppError::Io(_) => "IO operation failed".to_string(),
            AppError::AddrParse(_) => "Invalid address".to_string(),
            AppError::Json(_) => "Invalid JSON".to_string(),
            AppError::Jwt(_) => "Invalid token".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::BackupFailed(_) => "Backup failed".to_string(),
            AppError::RestoreFailed(_) => "Restore failed".to_string(),
            AppError::RateLimitExceeded { .. } => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::InvalidFormat(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        if status.is_server_error() {
            tracing::error!(error = %self, code = code, "Request error");
        } else {
            tracing::debug!(error = %self, code = code, "Request rejected");
        }

        let body = Json(json!({
            "code": code,
            "message": self.public_message(),
        }));

        let mut response = (status, body).into_response();
        if let AppError::RateLimitExceeded { retry_after } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}
