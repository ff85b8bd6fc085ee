/// PostgreSQL pooling
///
/// The API builds one pool at startup with [`create_pool`], which refuses
/// to return until the database answers. Tests that never reach the
/// database use [`create_lazy_pool`] instead.
///
/// ```no_run
/// use planboard_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(&DatabaseConfig::from_url(std::env::var("DATABASE_URL")?)).await?;
/// let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&pool).await?;
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// Connections kept open while idle
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    /// `None` keeps idle connections forever
    pub idle_timeout_seconds: Option<u64>,
    /// `None` never recycles a connection
    pub max_lifetime_seconds: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
        }
    }
}

impl DatabaseConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_seconds))
            .idle_timeout(self.idle_timeout_seconds.map(Duration::from_secs))
            .max_lifetime(self.max_lifetime_seconds.map(Duration::from_secs))
    }
}

/// Connects and checks the database before handing the pool out
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!(
        max = config.max_connections,
        min = config.min_connections,
        "Connecting to PostgreSQL"
    );

    let pool = config.options().connect(&config.url).await?;
    health_check(&pool).await?;

    tracing::info!("PostgreSQL pool ready");
    Ok(pool)
}

/// Parses the URL but opens no connection until the first query
pub fn create_lazy_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    config.options().connect_lazy(&config.url)
}

pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    let answer: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
    if answer != 1 {
        return Err(sqlx::Error::Protocol(format!("SELECT 1 returned {}", answer)));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub active_connections: u32,
    pub idle_connections: u32,
    pub total_connections: u32,
}

pub fn pool_stats(pool: &PgPool) -> PoolStats {
    let total = pool.size();
    let idle = u32::try_from(pool.num_idle()).unwrap_or(total);

    PoolStats {
        active_connections: total.saturating_sub(idle),
        idle_connections: idle,
        total_connections: total,
    }
}

/// Waits for checked-out connections to come back, then closes them all
pub async fn close_pool(pool: PgPool) {
    tracing::info!("Closing PostgreSQL pool");
    pool.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_from_url() {
        let config = DatabaseConfig::from_url("postgresql://localhost/planboard");

        assert_eq!(config.url, "postgresql://localhost/planboard");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout_seconds, 30);
        assert_eq!(config.idle_timeout_seconds, Some(600));
    }

    #[tokio::test]
    async fn test_lazy_pool_needs_no_database() {
        let config = DatabaseConfig {
            min_connections: 0,
            ..DatabaseConfig::from_url("postgresql://nobody@127.0.0.1:1/none")
        };
        let pool = create_lazy_pool(&config).expect("URL should parse");

        assert_eq!(
            pool_stats(&pool),
            PoolStats {
                active_connections: 0,
                idle_connections: 0,
                total_connections: 0,
            }
        );
    }

    #[test]
    fn test_lazy_pool_rejects_bad_url() {
        let config = DatabaseConfig::from_url("not a url");
        assert!(create_lazy_pool(&config).is_err());
    }
}
