pub mod audit;
pub mod invite;
pub mod user;
