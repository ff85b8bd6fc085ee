//! # Planboard API Server
//!
//! REST and WebSocket backend for project planning: users, projects, tasks,
//! subtasks, calendar events, teams, notifications and an activity log.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/planboard \
//! JWT_SECRET=$(openssl rand -hex 32) \
//! cargo run -p planboard-api
//! ```
//!
//! Set `LOG_FORMAT=json` for JSON log lines and `RUST_LOG` to override the
//! default filter.

use planboard_api::{
    app::{build_router, AppState},
    config::Config,
};
use planboard_shared::db::{
    migrations::{ensure_database_exists, migration_status, run_migrations},
    pool::{close_pool, create_pool, DatabaseConfig as PoolConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "planboard_api=debug,planboard_shared=info,tower_http=debug";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    wait_for_signal(tokio::signal::ctrl_c()).await;
}

/// Resolves when `signal` fires; never resolves if listening failed
async fn wait_for_signal<F>(signal: F)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        // Without a handler the server runs until killed
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Planboard API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    ensure_database_exists(&config.database.url).await?;

    let pool = create_pool(&PoolConfig {
        max_connections: config.database.max_connections,
        ..PoolConfig::from_url(config.database.url.clone())
    })
    .await?;
    run_migrations(&pool).await?;

    let status = migration_status(&pool).await?;
    tracing::info!(
        applied = status.applied_migrations,
        version = ?status.latest_version,
        "Database schema ready"
    );

    let bind_address = config.bind_address();
    if config.storage.is_none() {
        tracing::warn!("Object storage not configured; avatar uploads are disabled");
    }

    let state = AppState::new(pool.clone(), config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
