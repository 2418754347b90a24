//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "gamesphere_backend=debug,tower_http=debug,sqlx::query=info";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `log_level` applies to this crate and
/// the defaults cover the HTTP and database layers.
pub fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if log_level.is_empty() {
            DEFAULT_FILTER.into()
        } else {
            format!("gamesphere_backend={log_level},tower_http=debug,sqlx::query=info").into()
        }
    });

    // A second init (tests, CLI re-entry) is harmless.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
