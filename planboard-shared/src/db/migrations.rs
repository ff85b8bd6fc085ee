/// Schema migrations
///
/// The SQL files under `planboard-shared/migrations/` are compiled into the
/// binary by `sqlx::migrate!`, so a deployed server always carries the
/// schema it expects. The API applies them on startup.
///
/// ```no_run
/// use planboard_shared::db::pool::{create_pool, DatabaseConfig};
/// use planboard_shared::db::migrations::{migration_status, run_migrations};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(&DatabaseConfig::from_url(std::env::var("DATABASE_URL")?)).await?;
/// run_migrations(&pool).await?;
/// assert!(migration_status(&pool).await?.is_up_to_date);
/// # Ok(())
/// # }
/// ```

use sqlx::{
    migrate::{MigrateDatabase, MigrateError, Migrator},
    PgPool, Postgres,
};

static EMBEDDED: Migrator = sqlx::migrate!("./migrations");

/// Applied migrations compared with the ones embedded in this build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied_migrations: usize,
    pub latest_version: Option<i64>,
    pub expected_version: Option<i64>,
    pub is_up_to_date: bool,
}

impl MigrationStatus {
    fn new(applied_migrations: usize, latest_version: Option<i64>) -> Self {
        let expected_version = embedded_latest_version();
        Self {
            applied_migrations,
            latest_version,
            expected_version,
            is_up_to_date: latest_version >= expected_version,
        }
    }
}

pub fn embedded_latest_version() -> Option<i64> {
    EMBEDDED.iter().map(|m| m.version).max()
}

/// Applies every embedded migration the database has not seen yet
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    let embedded = EMBEDDED.iter().count();
    tracing::info!(embedded, "Applying database migrations");

    if let Err(e) = EMBEDDED.run(pool).await {
        tracing::error!(error = %e, "Database migration failed");
        return Err(e);
    }

    tracing::info!(version = ?embedded_latest_version(), "Database schema is current");
    Ok(())
}

pub async fn migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    // to_regclass yields NULL until sqlx has created its bookkeeping table
    let tracked: bool = sqlx::query_scalar("SELECT to_regclass('public._sqlx_migrations') IS NOT NULL")
        .fetch_one(pool)
        .await?;

    if !tracked {
        tracing::debug!("No migrations have been applied yet");
        return Ok(MigrationStatus::new(0, None));
    }

    let (applied, latest): (i64, Option<i64>) =
        sqlx::query_as("SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success")
            .fetch_one(pool)
            .await?;

    Ok(MigrationStatus::new(applied as usize, latest))
}

/// Creates the target database when the server points at a fresh instance
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        return Ok(());
    }

    tracing::info!("Creating missing database");
    Postgres::create_database(database_url).await
}
