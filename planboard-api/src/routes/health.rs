/// `GET /health`
///
/// Liveness plus a database round trip. The endpoint answers 200 even when the
/// database is down so load balancers can tell "process up" from "process
/// gone"; the body says which dependency is failing.
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "pool": { "active_connections": 1, "idle_connections": 4, "total_connections": 5 }
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use planboard_shared::db::pool::{self, PoolStats};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub pool: PoolStats,
}

impl HealthResponse {
    fn new(database_up: bool, pool: PoolStats) -> Self {
        let (status, database) = if database_up {
            ("healthy", "connected")
        } else {
            ("degraded", "disconnected")
        };

        Self {
            status,
            version: env!("CARGO_PKG_VERSION"),
            database,
            pool,
        }
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_up = pool::health_check(&state.db)
        .await
        .map_err(|e| tracing::warn!(error = %e, "Database check failed"))
        .is_ok();

    Json(HealthResponse::new(database_up, pool::pool_stats(&state.db)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_body() {
        let body = serde_json::to_value(HealthResponse::new(
            false,
            PoolStats {
                active_connections: 0,
                idle_connections: 0,
                total_connections: 0,
            },
        ))
        .unwrap();

        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], "disconnected");
        assert_eq!(body["pool"]["total_connections"], 0);
    }
}
