pub use super::audit_logs::Entity as AuditLogs;
pub use super::invite_codes::Entity as InviteCodes;
pub use super::users::Entity as Users;
