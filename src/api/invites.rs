use axum::{Json, extract::Path, extract::State, http::HeaderMap};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::{client_ip, current_user};
use super::validation::{validate_invite_code, validate_uses};
use super::{ApiError, ApiResponse, AppState, InviteCodeDto, JsonBody};
use crate::db::AuditAction;

const GENERATED_CODE_LEN: usize = 12;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInviteRequest {
    pub code: Option<String>,
    pub uses: Option<i32>,
    pub expires_at: Option<String>,
}

/// GET /invite-codes
pub async fn list_invite_codes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<InviteCodeDto>>>, ApiError> {
    let invites = state.store().list_invites().await.map_err(ApiError::db)?;

    Ok(Json(ApiResponse::success(
        invites.into_iter().map(InviteCodeDto::from).collect(),
    )))
}

/// POST /invite-codes
/// Accepts an explicit code string or generates a random one.
pub async fn create_invite_code(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<CreateInviteRequest>,
) -> Result<Json<ApiResponse<InviteCodeDto>>, ApiError> {
    let admin = current_user(&session).await?;

    let code = match payload.code {
        Some(code) => validate_invite_code(&code)?.to_string(),
        None => generate_invite_code(),
    };

    let uses = validate_uses(payload.uses.unwrap_or(1))?;

    let expires_at = match payload.expires_at {
        Some(raw) => {
            let parsed = chrono::DateTime::parse_from_rfc3339(&raw)
                .map_err(|_| ApiError::validation("expiresAt must be an RFC 3339 timestamp"))?;
            Some(parsed.to_rfc3339())
        }
        None => None,
    };

    if state
        .store()
        .get_invite_by_code(&code)
        .await
        .map_err(ApiError::db)?
        .is_some()
    {
        return Err(ApiError::conflict("Invite code already exists"));
    }

    let invite = state
        .store()
        .create_invite(&code, uses, expires_at, admin.user_id)
        .await
        .map_err(ApiError::db)?;

    state
        .store()
        .append_audit(
            admin.user_id,
            &admin.username,
            AuditAction::InviteCodeCreated,
            &client_ip(&headers),
        )
        .await
        .map_err(ApiError::db)?;

    tracing::info!("Invite code created by {}", admin.username);

    Ok(Json(ApiResponse::success(InviteCodeDto::from(invite))))
}

/// POST /invite-codes/{id}/revoke
/// Revoking is one-way and idempotent; only the lookup can fail.
pub async fn revoke_invite_code(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<InviteCodeDto>>, ApiError> {
    let admin = current_user(&session).await?;

    let invite = state
        .store()
        .revoke_invite(id)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::not_found("Invite code", id))?;

    state
        .store()
        .append_audit(
            admin.user_id,
            &admin.username,
            AuditAction::InviteCodeRevoked,
            &client_ip(&headers),
        )
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiResponse::success(InviteCodeDto::from(invite))))
}

/// Random uppercase alphanumeric token.
fn generate_invite_code() -> String {
    use rand::Rng;

    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    let mut rng = rand::rng();
    (0..GENERATED_CODE_LEN)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_shape() {
        let code = generate_invite_code();
        assert_eq!(code.len(), GENERATED_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_generated_codes_differ() {
        assert_ne!(generate_invite_code(), generate_invite_code());
    }
}
