use anyhow::{Context, Result};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, QuerySelect, Set};

use crate::entities::audit_logs;

/// Fixed vocabulary of auditable actions.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AuditAction {
    UserRegistered,
    UserLogin,
    UserLogout,
    InviteCodeCreated,
    InviteCodeRevoked,
    UserActivated,
    UserDeactivated,
    FileDownloaded,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UserRegistered => "USER_REGISTERED",
            Self::UserLogin => "USER_LOGIN",
            Self::UserLogout => "USER_LOGOUT",
            Self::InviteCodeCreated => "INVITE_CODE_CREATED",
            Self::InviteCodeRevoked => "INVITE_CODE_REVOKED",
            Self::UserActivated => "USER_ACTIVATED",
            Self::UserDeactivated => "USER_DEACTIVATED",
            Self::FileDownloaded => "FILE_DOWNLOADED",
        }
    }
}

pub struct AuditRepository {
    conn: DatabaseConnection,
}

impl AuditRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Append one record. Audit entries are never updated or deleted.
    pub async fn append(
        &self,
        user_id: i32,
        username: &str,
        action: AuditAction,
        ip: &str,
    ) -> Result<()> {
        let active = audit_logs::ActiveModel {
            user_id: Set(user_id),
            username: Set(username.to_string()),
            action: Set(action.as_str().to_string()),
            ip: Set(ip.to_string()),
            timestamp: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        audit_logs::Entity::insert(active)
            .exec(&self.conn)
            .await
            .context("Failed to append audit log")?;

        Ok(())
    }

    /// Most recent records, newest first.
    pub async fn recent(&self, limit: u64) -> Result<Vec<audit_logs::Model>> {
        audit_logs::Entity::find()
            .order_by_desc(audit_logs::Column::Timestamp)
            .order_by_desc(audit_logs::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to query audit logs")
    }
}
