use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::invite_codes;

pub struct InviteRepository {
    conn: DatabaseConnection,
}

impl InviteRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<invite_codes::Model>> {
        invite_codes::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query invite code by ID")
    }

    pub async fn get_by_code(&self, code: &str) -> Result<Option<invite_codes::Model>> {
        invite_codes::Entity::find()
            .filter(invite_codes::Column::Code.eq(code))
            .one(&self.conn)
            .await
            .context("Failed to query invite code")
    }

    pub async fn create(
        &self,
        code: &str,
        uses: i32,
        expires_at: Option<String>,
        created_by: i32,
    ) -> Result<invite_codes::Model> {
        let active = invite_codes::ActiveModel {
            code: Set(code.to_string()),
            uses: Set(uses),
            uses_remaining: Set(uses),
            expires_at: Set(expires_at),
            revoked: Set(false),
            created_by: Set(created_by),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to create invite code")
    }

    /// Consume one use with a single conditional UPDATE. Returns false when
    /// the code is exhausted or revoked, so two concurrent registrations
    /// against a code with one use left cannot both succeed.
    pub async fn consume(&self, id: i32) -> Result<bool> {
        let result = invite_codes::Entity::update_many()
            .col_expr(
                invite_codes::Column::UsesRemaining,
                Expr::col(invite_codes::Column::UsesRemaining).sub(1),
            )
            .filter(invite_codes::Column::Id.eq(id))
            .filter(invite_codes::Column::UsesRemaining.gt(0))
            .filter(invite_codes::Column::Revoked.eq(false))
            .exec(&self.conn)
            .await
            .context("Failed to consume invite code")?;

        Ok(result.rows_affected > 0)
    }

    /// Set the revoked flag unconditionally and return the updated record.
    /// Revoking an already-revoked code is a no-op.
    pub async fn revoke(&self, id: i32) -> Result<Option<invite_codes::Model>> {
        let Some(invite) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let mut model: invite_codes::ActiveModel = invite.into();
        model.revoked = Set(true);
        let updated = model
            .update(&self.conn)
            .await
            .context("Failed to revoke invite code")?;

        Ok(Some(updated))
    }

    pub async fn list_all(&self) -> Result<Vec<invite_codes::Model>> {
        invite_codes::Entity::find()
            .order_by_desc(invite_codes::Column::CreatedAt)
            .order_by_desc(invite_codes::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list invite codes")
    }
}
