use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::users::Role;
use crate::entities::{audit_logs, invite_codes, users};

pub mod migrator;
pub mod repositories;

pub use repositories::audit::AuditAction;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        // Every pooled connection to an in-memory SQLite database sees its
        // own empty database, so clamp the pool to a single connection.
        let (max_connections, min_connections) = if db_url.contains(":memory:") {
            (1, 1)
        } else {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn invite_repo(&self) -> repositories::invite::InviteRepository {
        repositories::invite::InviteRepository::new(self.conn.clone())
    }

    fn audit_repo(&self) -> repositories::audit::AuditRepository {
        repositories::audit::AuditRepository::new(self.conn.clone())
    }

    // Users

    pub async fn get_user(&self, id: i32) -> Result<Option<users::Model>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<users::Model> {
        self.user_repo().create(username, password_hash, role).await
    }

    pub async fn set_user_active(&self, id: i32, active: bool) -> Result<Option<users::Model>> {
        self.user_repo().set_active(id, active).await
    }

    pub async fn list_users(&self) -> Result<Vec<users::Model>> {
        self.user_repo().list_all().await
    }

    // Invite codes

    pub async fn get_invite(&self, id: i32) -> Result<Option<invite_codes::Model>> {
        self.invite_repo().get_by_id(id).await
    }

    pub async fn get_invite_by_code(&self, code: &str) -> Result<Option<invite_codes::Model>> {
        self.invite_repo().get_by_code(code).await
    }

    pub async fn create_invite(
        &self,
        code: &str,
        uses: i32,
        expires_at: Option<String>,
        created_by: i32,
    ) -> Result<invite_codes::Model> {
        self.invite_repo()
            .create(code, uses, expires_at, created_by)
            .await
    }

    pub async fn consume_invite(&self, id: i32) -> Result<bool> {
        self.invite_repo().consume(id).await
    }

    pub async fn revoke_invite(&self, id: i32) -> Result<Option<invite_codes::Model>> {
        self.invite_repo().revoke(id).await
    }

    pub async fn list_invites(&self) -> Result<Vec<invite_codes::Model>> {
        self.invite_repo().list_all().await
    }

    // Audit log

    pub async fn append_audit(
        &self,
        user_id: i32,
        username: &str,
        action: AuditAction,
        ip: &str,
    ) -> Result<()> {
        self.audit_repo().append(user_id, username, action, ip).await
    }

    pub async fn recent_audit(&self, limit: u64) -> Result<Vec<audit_logs::Model>> {
        self.audit_repo().recent(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> Store {
        Store::new("sqlite::memory:").await.expect("store")
    }

    #[tokio::test]
    async fn test_migration_seeds_admin() {
        let store = memory_store().await;
        let admin = store
            .get_user_by_username("admin")
            .await
            .unwrap()
            .expect("seeded admin");
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.active);
    }

    #[tokio::test]
    async fn test_invite_consume_decrements_once() {
        let store = memory_store().await;
        let invite = store.create_invite("WELCOME1", 2, None, 1).await.unwrap();

        assert!(store.consume_invite(invite.id).await.unwrap());
        let after = store.get_invite(invite.id).await.unwrap().unwrap();
        assert_eq!(after.uses_remaining, 1);
        assert_eq!(after.uses, 2);
    }

    #[tokio::test]
    async fn test_invite_consume_stops_at_zero() {
        let store = memory_store().await;
        let invite = store.create_invite("ONESHOT", 1, None, 1).await.unwrap();

        assert!(store.consume_invite(invite.id).await.unwrap());
        assert!(!store.consume_invite(invite.id).await.unwrap());

        let after = store.get_invite(invite.id).await.unwrap().unwrap();
        assert_eq!(after.uses_remaining, 0);
    }

    #[tokio::test]
    async fn test_revoked_invite_cannot_be_consumed() {
        let store = memory_store().await;
        let invite = store.create_invite("REVOKEME", 5, None, 1).await.unwrap();

        let revoked = store.revoke_invite(invite.id).await.unwrap().unwrap();
        assert!(revoked.revoked);
        assert_eq!(revoked.uses_remaining, 5);

        assert!(!store.consume_invite(invite.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = memory_store().await;
        let invite = store.create_invite("TWICE", 1, None, 1).await.unwrap();

        store.revoke_invite(invite.id).await.unwrap().unwrap();
        let again = store.revoke_invite(invite.id).await.unwrap().unwrap();
        assert!(again.revoked);

        assert!(store.revoke_invite(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_audit_recent_is_newest_first_and_limited() {
        let store = memory_store().await;
        store
            .append_audit(1, "admin", AuditAction::UserLogin, "127.0.0.1")
            .await
            .unwrap();
        store
            .append_audit(1, "admin", AuditAction::InviteCodeCreated, "127.0.0.1")
            .await
            .unwrap();

        let logs = store.recent_audit(1).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "INVITE_CODE_CREATED");

        let all = store.recent_audit(100).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
