use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::{
    access::{db_pool, require_admin},
    error::AppResult,
    repository::report_store::PgReportStore,
    state::AppState,
};

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/admin/stats", axum::routing::get(dashboard_stats))
}

async fn dashboard_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let identity = require_admin(&state, &headers).await?;
    let store = PgReportStore::new(db_pool(&state)?.clone());
    let stats = store.dashboard_stats().await?;
    tracing::debug!(user_id = %identity.user_id, "Served admin dashboard stats");

    Ok(Json(json!({ "success": true, "data": stats })))
}
