use axum::{Json, extract::Path, extract::State, http::HeaderMap};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::{client_ip, current_user};
use super::{ApiError, ApiResponse, AppState, UserDto};
use crate::db::AuditAction;

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    let users = state.store().list_users().await.map_err(ApiError::db)?;

    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserDto::from).collect(),
    )))
}

/// POST /users/{id}/toggle
/// Flips the active flag. Admins cannot deactivate their own account.
pub async fn toggle_user_active(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let admin = current_user(&session).await?;

    let user = state
        .store()
        .get_user(id)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    if user.id == admin.user_id {
        return Err(ApiError::validation("Cannot deactivate your own account"));
    }

    let updated = state
        .store()
        .set_user_active(id, !user.active)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("User", id))?;

    let action = if updated.active {
        AuditAction::UserActivated
    } else {
        AuditAction::UserDeactivated
    };

    state
        .store()
        .append_audit(admin.user_id, &admin.username, action, &client_ip(&headers))
        .await
        .map_err(ApiError::db)?;

    tracing::info!(
        "User {} {} by {}",
        updated.username,
        if updated.active { "activated" } else { "deactivated" },
        admin.username
    );

    Ok(Json(ApiResponse::success(UserDto::from(updated))))
}
