//! User entity - accounts that log in and hold collection permissions.

use sea_orm::entity::prelude::*;
use std::fmt;
use time::OffsetDateTime;

#[derive(Clone, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Stored lower-cased; unique.
    #[sea_orm(unique)]
    pub email: String,
    pub full_name: String,
    /// Argon2id PHC string. `None` for anonymised accounts.
    pub password_hash: Option<String>,
    pub is_active: bool,
    /// Superuser flag.
    pub is_admin: bool,
    pub last_login_at: Option<OffsetDateTime>,
    pub tos_approved_at: Option<OffsetDateTime>,
    pub created_by: Option<String>,
    pub created_at: OffsetDateTime,
    pub modified_by: Option<String>,
    pub modified_at: OffsetDateTime,
}

// Hand-written so the password hash never ends up in logs.
impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "<redacted>"))
            .field("is_active", &self.is_active)
            .field("is_admin", &self.is_admin)
            .field("last_login_at", &self.last_login_at)
            .field("tos_approved_at", &self.tos_approved_at)
            .finish_non_exhaustive()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::permission::Entity")]
    Permissions,
}

impl Related<super::permission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Permissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Normalise an email address for storage and lookup.
///
/// Uniqueness is enforced on the normalised form, which makes it case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
