//! GameSphere Backend - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use clap::Parser;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use gamesphere_backend::{
    api,
    cli::{self, Cli, Command},
    config::Config,
    db,
    error::Result,
    services::{
        audit_service::{AuditSink, MemoryAuditSink, PgAuditSink},
        backup_service::BackupService,
        permission_service::default_hierarchy,
        session_service::JwtSessionProvider,
    },
    store::{GameStore, MemoryStore, PgStore},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    telemetry::init_tracing(&config.log_level);

    let (db_pool, store, audit) = connect(&config).await?;

    match cli.command {
        Some(Command::Backup(backup_cli)) => {
            let service = BackupService::new(store, audit, config.backup_dir.clone());
            cli::run_backup(backup_cli, &service).await
        }
        Some(Command::Serve) | None => serve(config, db_pool, store, audit).await,
    }
}

/// Open the configured store. Without `DATABASE_URL` everything lives in
/// memory and is lost on exit.
async fn connect(
    config: &Config,
) -> Result<(Option<PgPool>, Arc<dyn GameStore>, Arc<dyn AuditSink>)> {
    match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            tracing::info!("Connected to database");

            db::migrate(&pool).await?;
            tracing::info!("Database migrations complete");

            Ok((
                Some(pool.clone()),
                Arc::new(PgStore::new(pool.clone())),
                Arc::new(PgAuditSink::new(pool)),
            ))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Ok((
                None,
                Arc::new(MemoryStore::new()),
                Arc::new(MemoryAuditSink::new()),
            ))
        }
    }
}

async fn serve(
    config: Config,
    db_pool: Option<PgPool>,
    store: Arc<dyn GameStore>,
    audit: Arc<dyn AuditSink>,
) -> Result<()> {
    tracing::info!("Starting GameSphere backend");

    let sessions = Arc::new(JwtSessionProvider::new(config.require_jwt_secret()?));
    let state = Arc::new(api::AppState::new(
        config.clone(),
        db_pool,
        store,
        audit,
        sessions,
        Arc::new(default_hierarchy()),
    ));

    // Periodically drop expired rate limit windows
    let limiter = state.rate_limiter.clone();
    let sweep_every = Duration::from_secs(config.rate_limit_window_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            limiter.cleanup_expired().await;
        }
    });

    // Build router
    let app = Router::new()
        .merge(api::routes::create_router(state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
