//! Collection entity - a library sigel.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Kind of collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[sea_orm(string_value = "bibliography")]
    Bibliography,
    #[sea_orm(string_value = "library")]
    Library,
    #[sea_orm(string_value = "uncategorized")]
    Uncategorized,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Sigel; immutable once created.
    #[sea_orm(unique)]
    pub code: String,
    pub friendly_name: String,
    pub category: Category,
    pub is_active: bool,
    /// Grants global-collection semantics.
    pub is_super: bool,
    /// Code of the collection this one succeeds. Informational only.
    pub replaces: Option<String>,
    /// Code of the collection that succeeded this one. Informational only.
    pub replaced_by: Option<String>,
    pub created_by: Option<String>,
    pub created_at: OffsetDateTime,
    pub modified_by: Option<String>,
    pub modified_at: OffsetDateTime,
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
