/// Health check endpoint
///
/// ```text
/// GET /health
/// ```
///
/// Always answers 200 while the process is up; the body reports whether the
/// database answered:
///
/// ```json
/// {
///   "status": "ok",
///   "version": "0.1.0",
///   "database": "connected",
///   "pool": { "activeConnections": 1, "idleConnections": 4, "totalConnections": 5 }
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use dailytask_shared::db::pool::{get_pool_stats, health_check as database_health, PoolStats};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` when the database answered, `degraded` otherwise
    pub status: &'static str,

    pub version: &'static str,

    pub database: &'static str,

    pub pool: PoolStats,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, database) = match database_health(&state.db).await {
        Ok(()) => ("ok", "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            ("degraded", "disconnected")
        }
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        database,
        pool: get_pool_stats(&state.db),
    })
}
