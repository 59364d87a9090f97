use axum::{
    Json,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task;
use tower_sessions::Session;

use super::validation::{validate_invite_code, validate_password, validate_username};
use super::{ApiError, ApiResponse, AppState, JsonBody, MessageResponse, UserDto};
use crate::db::AuditAction;
use crate::db::repositories::user::{hash_password, verify_password};
use crate::entities::invite_codes::InviteRejection;
use crate::entities::users::Role;

/// Session key holding the resolved identity.
pub const SESSION_USER_KEY: &str = "user";

/// Identity resolved from the session cookie, carried per-request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub invite_code: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

// ============================================================================
// Guards
// ============================================================================

/// Rejects with 401 when the request carries no valid session identity.
pub async fn require_auth(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = current_user(&session).await?;
    tracing::Span::current().record("user_id", user.user_id);
    Ok(next.run(request).await)
}

/// Rejects with 401 when unauthenticated, 403 when the session role is not
/// admin. Subsumes `require_auth`.
pub async fn require_admin(
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = current_user(&session).await?;
    if !user.role.is_admin() {
        return Err(ApiError::forbidden("Forbidden"));
    }
    tracing::Span::current().record("user_id", user.user_id);
    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/register
/// Register a new account gated by an invite code, then establish a session.
pub async fn register(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    validate_username(&payload.username)?;
    validate_password(&payload.password)?;
    validate_invite_code(&payload.invite_code)?;

    if state
        .store()
        .get_user_by_username(&payload.username)
        .await
        .map_err(ApiError::db)?
        .is_some()
    {
        return Err(ApiError::conflict("Username already taken"));
    }

    let invite = state
        .store()
        .get_invite_by_code(&payload.invite_code)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::validation("Invalid invite code"))?;

    if let Err(rejection) = invite.check_consumable(&chrono::Utc::now()) {
        return Err(ApiError::validation(match rejection {
            InviteRejection::Revoked => "Invite code has been revoked",
            InviteRejection::Expired => "Invite code has expired",
            InviteRejection::Exhausted => "Invite code has no uses remaining",
        }));
    }

    // Single conditional decrement; losing a concurrent race against the
    // last remaining use surfaces the same way as plain exhaustion.
    let consumed = state
        .store()
        .consume_invite(invite.id)
        .await
        .map_err(ApiError::db)?;
    if !consumed {
        return Err(ApiError::validation("Invite code has no uses remaining"));
    }

    let security = state.config.security.clone();
    let password = payload.password.clone();
    let password_hash = task::spawn_blocking(move || hash_password(&password, Some(&security)))
        .await
        .map_err(|e| ApiError::internal(format!("Password hashing task panicked: {e}")))?
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;

    let user = state
        .store()
        .create_user(&payload.username, &password_hash, Role::User)
        .await
        .map_err(ApiError::db)?;

    state
        .store()
        .append_audit(
            user.id,
            &user.username,
            AuditAction::UserRegistered,
            &client_ip(&headers),
        )
        .await
        .map_err(ApiError::db)?;

    establish_session(&session, &user).await?;

    tracing::info!("New user registered: {}", user.username);

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// POST /auth/login
/// Unknown usernames and wrong passwords return an identical response so the
/// endpoint cannot be used to enumerate accounts.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let Some(user) = state
        .store()
        .get_user_by_username(&payload.username)
        .await
        .map_err(ApiError::db)?
    else {
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    if !user.active {
        return Err(ApiError::forbidden("Account has been deactivated"));
    }

    let is_valid = verify_password(&user.password_hash, &payload.password)
        .await
        .map_err(|e| ApiError::internal(format!("Password verification error: {e}")))?;

    if !is_valid {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    establish_session(&session, &user).await?;

    state
        .store()
        .append_audit(
            user.id,
            &user.username,
            AuditAction::UserLogin,
            &client_ip(&headers),
        )
        .await
        .map_err(ApiError::db)?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// POST /auth/logout
/// Destroys the session record. The audit write is best-effort: a failure
/// there must not block session teardown.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user = current_user(&session).await?;

    session
        .flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to destroy session: {e}")))?;

    if let Err(e) = state
        .store()
        .append_audit(
            user.user_id,
            &user.username,
            AuditAction::UserLogout,
            &client_ip(&headers),
        )
        .await
    {
        tracing::warn!("Failed to write logout audit entry: {e}");
    }

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Logged out successfully".to_string(),
    })))
}

/// GET /auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let identity = current_user(&session).await?;

    let user = state
        .store()
        .get_user(identity.user_id)
        .await
        .map_err(ApiError::db)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

// ============================================================================
// Helpers
// ============================================================================

/// Get the resolved identity from the session, 401 if not authenticated.
pub async fn current_user(session: &Session) -> Result<SessionUser, ApiError> {
    session
        .get::<SessionUser>(SESSION_USER_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
        .ok_or_else(|| ApiError::unauthorized("Unauthorized"))
}

async fn establish_session(
    session: &Session,
    user: &crate::entities::users::Model,
) -> Result<(), ApiError> {
    let record = SessionUser {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role,
    };
    session
        .insert(SESSION_USER_KEY, &record)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))
}

/// Client IP for audit entries: first hop of X-Forwarded-For when present.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back_to_unknown() {
        assert_eq!(client_ip(&HeaderMap::new()), "unknown");
    }
}
