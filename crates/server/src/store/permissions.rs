use super::new_id;
use crate::auth::Capabilities;
use crate::entity::{collection, permission};
use crate::error::{AuthError, conflict_on_unique};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
pub struct NewPermission {
    pub user_id: String,
    pub collection_id: String,
    pub capabilities: Capabilities,
}

/// A permission row joined with its collection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PermissionEntry {
    pub permission: permission::Model,
    pub collection: collection::Model,
}

impl PermissionEntry {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::from(&self.permission)
    }
}

#[derive(Clone)]
pub struct PermissionRepository {
    db: Arc<DatabaseConnection>,
}

impl PermissionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find(&self, id: &str) -> Result<Option<permission::Model>, AuthError> {
        Ok(permission::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn get(&self, id: &str) -> Result<permission::Model, AuthError> {
        self.find(id)
            .await?
            .ok_or_else(|| AuthError::not_found("permission", id))
    }

    pub async fn find_for_pair(
        &self,
        user_id: &str,
        collection_id: &str,
    ) -> Result<Option<permission::Model>, AuthError> {
        Ok(permission::Entity::find()
            .filter(permission::Column::UserId.eq(user_id))
            .filter(permission::Column::CollectionId.eq(collection_id))
            .one(self.db.as_ref())
            .await?)
    }

    /// All of a user's permissions with their collections, ordered by collection code.
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<PermissionEntry>, AuthError> {
        let rows = permission::Entity::find()
            .filter(permission::Column::UserId.eq(user_id))
            .find_also_related(collection::Entity)
            .all(self.db.as_ref())
            .await?;

        let mut entries: Vec<PermissionEntry> = rows
            .into_iter()
            .filter_map(|(permission, collection)| {
                collection.map(|collection| PermissionEntry {
                    permission,
                    collection,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.collection.code.cmp(&b.collection.code));
        Ok(entries)
    }

    pub async fn list_for_collection(
        &self,
        collection_id: &str,
    ) -> Result<Vec<permission::Model>, AuthError> {
        Ok(permission::Entity::find()
            .filter(permission::Column::CollectionId.eq(collection_id))
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn insert(
        &self,
        new: NewPermission,
        actor_id: &str,
    ) -> Result<permission::Model, AuthError> {
        let now = OffsetDateTime::now_utc();
        let key = format!("{}/{}", new.user_id, new.collection_id);
        let model = permission::ActiveModel {
            id: Set(new_id()),
            user_id: Set(new.user_id),
            collection_id: Set(new.collection_id),
            registrant: Set(new.capabilities.registrant),
            cataloger: Set(new.capabilities.cataloger),
            cataloging_admin: Set(new.capabilities.cataloging_admin),
            created_by: Set(Some(actor_id.to_string())),
            created_at: Set(now),
            modified_by: Set(Some(actor_id.to_string())),
            modified_at: Set(now),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| conflict_on_unique(e, "permission", &key))
    }

    pub async fn update(
        &self,
        existing: permission::Model,
        capabilities: Capabilities,
        actor_id: &str,
    ) -> Result<permission::Model, AuthError> {
        let mut active: permission::ActiveModel = existing.into();
        active.registrant = Set(capabilities.registrant);
        active.cataloger = Set(capabilities.cataloger);
        active.cataloging_admin = Set(capabilities.cataloging_admin);
        active.modified_by = Set(Some(actor_id.to_string()));
        active.modified_at = Set(OffsetDateTime::now_utc());
        Ok(active.update(self.db.as_ref()).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AuthError> {
        let result = permission::Entity::delete_by_id(id)
            .exec(self.db.as_ref())
            .await?;
        if result.rows_affected == 0 {
            return Err(AuthError::not_found("permission", id));
        }
        Ok(())
    }
}
