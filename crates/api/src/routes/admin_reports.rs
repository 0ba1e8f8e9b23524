use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use db::models::ReportStats;
use db::ReportRepository;
use serde::Deserialize;
use shared::types::ReportId;
use shared::DomainError;

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::parse_id;
use crate::routes::reports::ReportResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    #[serde(default)]
    pub include_archived: bool,
}

pub async fn list_reports(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ReportListQuery>,
) -> ApiResult<Json<Vec<ReportResponse>>> {
    let reports = ReportRepository::list(&state.pool, query.include_archived).await?;
    Ok(Json(reports.iter().map(ReportResponse::from).collect()))
}

pub async fn archive_report(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let report_id: ReportId = parse_id("report ID", &id)?;
    if !ReportRepository::set_archived(&state.pool, report_id, Some(Utc::now())).await? {
        return Err(ApiError::from(DomainError::ReportNotFound(id)));
    }
    Ok(Json(serde_json::json!({ "archived": true })))
}

pub async fn unarchive_report(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let report_id: ReportId = parse_id("report ID", &id)?;
    if !ReportRepository::set_archived(&state.pool, report_id, None).await? {
        return Err(ApiError::from(DomainError::ReportNotFound(id)));
    }
    Ok(Json(serde_json::json!({ "archived": false })))
}

pub async fn report_stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Json<ReportStats>> {
    let stats = ReportRepository::stats(&state.pool).await?;
    Ok(Json(stats))
}
