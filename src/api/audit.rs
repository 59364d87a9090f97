use axum::{Json, extract::Query, extract::State};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::validate_limit;
use super::{ApiError, ApiResponse, AppState, AuditLogDto};

const DEFAULT_LIMIT: u64 = 100;

#[derive(Deserialize)]
pub struct AuditLogQuery {
    pub limit: Option<u64>,
}

/// GET /audit-logs?limit=
/// Most recent entries, newest first. Read-only.
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<ApiResponse<Vec<AuditLogDto>>>, ApiError> {
    let limit = validate_limit(query.limit.unwrap_or(DEFAULT_LIMIT))?;

    let logs = state
        .store()
        .recent_audit(limit)
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiResponse::success(
        logs.into_iter().map(AuditLogDto::from).collect(),
    )))
}
