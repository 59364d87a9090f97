pub mod prelude;

pub mod audit_logs;
pub mod invite_codes;
pub mod users;
