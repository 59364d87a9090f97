use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "invite_codes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub code: String,

    /// Total grant at creation time.
    pub uses: i32,

    /// Monotonically non-increasing, never negative.
    pub uses_remaining: i32,

    /// Optional RFC 3339 deadline.
    pub expires_at: Option<String>,

    /// One-way flag; revoking is irreversible.
    pub revoked: bool,

    pub created_by: i32,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::CreatedBy",
        to = "super::users::Column::Id"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Why a code cannot gate a registration. Checks are ordered: a revoked code
/// reports `Revoked` even if it is also expired or exhausted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InviteRejection {
    Revoked,
    Expired,
    Exhausted,
}

impl Model {
    /// A code can gate a registration iff it is not revoked, has not passed
    /// its optional deadline, and has uses left. An unparseable deadline
    /// counts as expired.
    pub fn check_consumable(&self, now: &chrono::DateTime<chrono::Utc>) -> Result<(), InviteRejection> {
        if self.revoked {
            return Err(InviteRejection::Revoked);
        }
        if let Some(deadline) = self.expires_at.as_deref() {
            let still_valid = chrono::DateTime::parse_from_rfc3339(deadline)
                .map(|d| d > *now)
                .unwrap_or(false);
            if !still_valid {
                return Err(InviteRejection::Expired);
            }
        }
        if self.uses_remaining <= 0 {
            return Err(InviteRejection::Exhausted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(uses_remaining: i32, revoked: bool, expires_at: Option<&str>) -> Model {
        Model {
            id: 1,
            code: "TESTCODE".to_string(),
            uses: 5,
            uses_remaining,
            expires_at: expires_at.map(String::from),
            revoked,
            created_by: 1,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_consumable_fresh_code() {
        let now = chrono::Utc::now();
        assert_eq!(code(5, false, None).check_consumable(&now), Ok(()));
    }

    #[test]
    fn test_revoked_never_consumable() {
        let now = chrono::Utc::now();
        assert_eq!(
            code(5, true, None).check_consumable(&now),
            Err(InviteRejection::Revoked)
        );
        assert_eq!(
            code(5, true, Some("2999-01-01T00:00:00Z")).check_consumable(&now),
            Err(InviteRejection::Revoked)
        );
    }

    #[test]
    fn test_exhausted_not_consumable() {
        let now = chrono::Utc::now();
        assert_eq!(
            code(0, false, None).check_consumable(&now),
            Err(InviteRejection::Exhausted)
        );
    }

    #[test]
    fn test_expiry_deadline() {
        let now = chrono::Utc::now();
        assert_eq!(
            code(5, false, Some("2000-01-01T00:00:00Z")).check_consumable(&now),
            Err(InviteRejection::Expired)
        );
        assert_eq!(
            code(5, false, Some("2999-01-01T00:00:00Z")).check_consumable(&now),
            Ok(())
        );
    }

    #[test]
    fn test_unparseable_deadline_not_consumable() {
        let now = chrono::Utc::now();
        assert_eq!(
            code(5, false, Some("not-a-date")).check_consumable(&now),
            Err(InviteRejection::Expired)
        );
    }

    #[test]
    fn test_revoked_reported_before_expiry_or_exhaustion() {
        let now = chrono::Utc::now();
        assert_eq!(
            code(0, true, Some("2000-01-01T00:00:00Z")).check_consumable(&now),
            Err(InviteRejection::Revoked)
        );
        assert_eq!(
            code(0, false, Some("2000-01-01T00:00:00Z")).check_consumable(&now),
            Err(InviteRejection::Expired)
        );
    }
}
