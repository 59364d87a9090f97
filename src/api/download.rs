use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tower_http::services::ServeFile;
use tower_sessions::Session;

use super::auth::{client_ip, current_user};
use super::{ApiError, AppState};
use crate::db::AuditAction;

/// GET /download/akcent-loader
/// Streams the distributable artifact. The existence check and the audit
/// write both happen before any bytes are sent.
pub async fn download_artifact(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = current_user(&session).await?;

    let path = std::path::PathBuf::from(&state.config.download.artifact_path);
    if !path.is_file() {
        return Err(ApiError::NotFound("File not found".to_string()));
    }

    state
        .store()
        .append_audit(
            user.user_id,
            &user.username,
            AuditAction::FileDownloaded,
            &client_ip(&headers),
        )
        .await
        .map_err(ApiError::db)?;

    let mut builder = axum::http::Request::builder();
    if let Some(range) = headers.get("range") {
        builder = builder.header("range", range);
    }
    let req = builder
        .body(axum::body::Body::empty())
        .map_err(|e| ApiError::internal(format!("Failed to build request: {e}")))?;

    let mut response = match ServeFile::new(path).try_call(req).await {
        Ok(res) => res.into_response(),
        Err(e) => return Err(ApiError::internal(format!("Streaming error: {e}"))),
    };

    let disposition = format!("attachment; filename=\"{}\"", state.config.download.file_name);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}
