//! Repositories: one per entity, each owning its queries.
//!
//! Repositories do storage only. Authorization and field validation live in
//! [`crate::directory`]; repositories translate unique-constraint violations
//! into [`AuthError::Conflict`](crate::error::AuthError::Conflict).

pub mod clients;
pub mod collections;
pub mod permissions;
pub mod users;

pub use clients::{ClientChanges, ClientRepository, NewClient};
pub use collections::{CollectionChanges, CollectionRepository, NewCollection};
pub use permissions::{NewPermission, PermissionEntry, PermissionRepository};
pub use users::{NewUser, UserChanges, UserRepository};

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
