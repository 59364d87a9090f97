use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::ApiError;
use crate::entities::users::Role;
use crate::entities::{audit_logs, invite_codes, users};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// User record with the password hash stripped.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub role: Role,
    pub active: bool,
    pub created_at: String,
}

impl From<users::Model> for UserDto {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            role: model.role,
            active: model.active,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteCodeDto {
    pub id: i32,
    pub code: String,
    pub uses: i32,
    pub uses_remaining: i32,
    pub expires_at: Option<String>,
    pub revoked: bool,
    pub created_by: i32,
    pub created_at: String,
}

impl From<invite_codes::Model> for InviteCodeDto {
    fn from(model: invite_codes::Model) -> Self {
        Self {
            id: model.id,
            code: model.code,
            uses: model.uses,
            uses_remaining: model.uses_remaining,
            expires_at: model.expires_at,
            revoked: model.revoked,
            created_by: model.created_by,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogDto {
    pub id: i32,
    pub user_id: i32,
    pub username: String,
    pub action: String,
    pub ip: String,
    pub timestamp: String,
}

impl From<audit_logs::Model> for AuditLogDto {
    fn from(model: audit_logs::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            username: model.username,
            action: model.action,
            ip: model.ip,
            timestamp: model.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// JSON body extractor that converts deserialization failures (missing
/// fields, wrong types, malformed JSON) into the standard 400 envelope
/// instead of axum's bare 422 rejection.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(_) => Err(ApiError::validation("Invalid input data")),
        }
    }
}
