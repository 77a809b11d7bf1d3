use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::{
    access::{db_pool, require_admin},
    error::{AppError, AppResult},
    repository::report_store::PgReportStore,
    schemas::AdminReportQuery,
    services::reports::{
        period::resolve_range, ReportAggregator, ReportData, ReportFilters, ReportType,
    },
    state::AppState,
};

const REPORT_FAILURE: &str = "Failed to generate report.";

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/admin/reports", axum::routing::get(admin_report))
}

async fn admin_report(
    State(state): State<AppState>,
    Query(query): Query<AdminReportQuery>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let identity = require_admin(&state, &headers)
        .await
        .map_err(|error| match error {
            AppError::Unauthorized(_) | AppError::Forbidden(_) => error,
            other => {
                tracing::error!(error = %other, "Admin check failed before the report");
                AppError::Internal(REPORT_FAILURE.to_string())
            }
        })?;

    let data = generate_report(&state, &query).await.map_err(|error| {
        tracing::error!(
            user_id = %identity.user_id,
            report_type = query.report_type.as_deref().unwrap_or("overview"),
            error = %error,
            "Report generation failed"
        );
        AppError::Internal(REPORT_FAILURE.to_string())
    })?;

    Ok(Json(json!({ "success": true, "data": data })))
}

async fn generate_report(state: &AppState, query: &AdminReportQuery) -> AppResult<ReportData> {
    let now = Utc::now();
    let range = resolve_range(
        query.period.as_deref(),
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        now,
    )?;
    let report_type = ReportType::parse(query.report_type.as_deref());
    let filters = ReportFilters::new(query.region.as_deref(), query.service.as_deref());
    let store = PgReportStore::new(db_pool(state)?.clone());

    ReportAggregator::at(&store, now)
        .build(report_type, range, &filters)
        .await
}
