use super::new_id;
use crate::entity::collection::{self, Category};
use crate::error::{AuthError, conflict_on_unique};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
pub struct NewCollection {
    pub code: String,
    pub friendly_name: String,
    pub category: Category,
    pub is_active: bool,
    pub is_super: bool,
    pub replaces: Option<String>,
    pub replaced_by: Option<String>,
}

/// Partial update. `code` is carried only so callers can reject attempts to change it.
#[derive(Clone, Debug, Default)]
pub struct CollectionChanges {
    pub code: Option<String>,
    pub friendly_name: Option<String>,
    pub category: Option<Category>,
    pub is_active: Option<bool>,
    pub is_super: Option<bool>,
    pub replaces: Option<Option<String>>,
    pub replaced_by: Option<Option<String>>,
}

#[derive(Clone)]
pub struct CollectionRepository {
    db: Arc<DatabaseConnection>,
}

impl CollectionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find(&self, id: &str) -> Result<Option<collection::Model>, AuthError> {
        Ok(collection::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn get(&self, id: &str) -> Result<collection::Model, AuthError> {
        self.find(id)
            .await?
            .ok_or_else(|| AuthError::not_found("collection", id))
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<collection::Model>, AuthError> {
        Ok(collection::Entity::find()
            .filter(collection::Column::Code.eq(code))
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn list(&self) -> Result<Vec<collection::Model>, AuthError> {
        Ok(collection::Entity::find()
            .order_by_asc(collection::Column::Code)
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn insert(
        &self,
        new: NewCollection,
        actor_id: &str,
    ) -> Result<collection::Model, AuthError> {
        let now = OffsetDateTime::now_utc();
        let code = new.code.clone();
        let model = collection::ActiveModel {
            id: Set(new_id()),
            code: Set(new.code),
            friendly_name: Set(new.friendly_name),
            category: Set(new.category),
            is_active: Set(new.is_active),
            is_super: Set(new.is_super),
            replaces: Set(new.replaces),
            replaced_by: Set(new.replaced_by),
            created_by: Set(Some(actor_id.to_string())),
            created_at: Set(now),
            modified_by: Set(Some(actor_id.to_string())),
            modified_at: Set(now),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| conflict_on_unique(e, "collection", &code))
    }

    /// Apply changes. The code column is never written.
    pub async fn update(
        &self,
        existing: collection::Model,
        changes: CollectionChanges,
        actor_id: &str,
    ) -> Result<collection::Model, AuthError> {
        let mut active: collection::ActiveModel = existing.into();

        if let Some(friendly_name) = changes.friendly_name {
            active.friendly_name = Set(friendly_name);
        }
        if let Some(category) = changes.category {
            active.category = Set(category);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(is_super) = changes.is_super {
            active.is_super = Set(is_super);
        }
        if let Some(replaces) = changes.replaces {
            active.replaces = Set(replaces);
        }
        if let Some(replaced_by) = changes.replaced_by {
            active.replaced_by = Set(replaced_by);
        }
        active.modified_by = Set(Some(actor_id.to_string()));
        active.modified_at = Set(OffsetDateTime::now_utc());

        Ok(active.update(self.db.as_ref()).await?)
    }
}
