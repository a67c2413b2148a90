//! SeaORM entities for the identity store.
//!
//! Each module maps one table created by the `migration` crate.

pub mod collection;
pub mod failed_login_attempt;
pub mod oauth2_client;
pub mod oauth2_grant;
pub mod oauth2_token;
pub mod password_reset;
pub mod permission;
pub mod user;
