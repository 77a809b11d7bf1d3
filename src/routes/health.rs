use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::time::Duration;

use crate::state::AppState;

const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    // No pool configured: nothing to check.
    let db_ok = match &state.db_pool {
        Some(pool) => ping_database(pool).await,
        None => true,
    };

    let status = if db_ok { "ok" } else { "degraded" };
    Json(json!({
        "status": status,
        "service": state.config.app_name,
        "environment": state.config.environment,
        "now": Utc::now().to_rfc3339(),
        "db": db_ok
    }))
}

async fn ping_database(pool: &PgPool) -> bool {
    match tokio::time::timeout(DB_PROBE_TIMEOUT, sqlx::query("SELECT 1").fetch_one(pool)).await {
        Ok(Ok(_)) => true,
        Ok(Err(error)) => {
            tracing::error!(error = %error, "Health check DB query failed");
            false
        }
        Err(_) => {
            tracing::error!("Health check DB query timed out (3s)");
            false
        }
    }
}
