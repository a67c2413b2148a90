use super::new_id;
use crate::auth::password::generate_token;
use crate::entity::{oauth2_client, oauth2_grant, oauth2_token};
use crate::error::AuthError;
use crate::oauth2::SpaceList;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
pub struct NewClient {
    pub name: String,
    pub description: Option<String>,
    pub is_confidential: bool,
    pub redirect_uris: SpaceList,
    pub default_scopes: SpaceList,
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ClientChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub is_confidential: Option<bool>,
    pub redirect_uris: Option<SpaceList>,
    pub default_scopes: Option<SpaceList>,
    /// Generate a fresh secret
    pub rotate_secret: bool,
}

#[derive(Clone)]
pub struct ClientRepository {
    db: Arc<DatabaseConnection>,
}

impl ClientRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find(&self, id: &str) -> Result<Option<oauth2_client::Model>, AuthError> {
        Ok(oauth2_client::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn get(&self, id: &str) -> Result<oauth2_client::Model, AuthError> {
        self.find(id)
            .await?
            .ok_or_else(|| AuthError::not_found("client", id))
    }

    pub async fn list(&self) -> Result<Vec<oauth2_client::Model>, AuthError> {
        Ok(oauth2_client::Entity::find()
            .order_by_asc(oauth2_client::Column::Name)
            .all(self.db.as_ref())
            .await?)
    }

    /// Insert a client with a random identifier and secret.
    pub async fn insert(
        &self,
        new: NewClient,
        actor_id: &str,
    ) -> Result<oauth2_client::Model, AuthError> {
        let now = OffsetDateTime::now_utc();
        let model = oauth2_client::ActiveModel {
            id: Set(new_id()),
            secret: Set(generate_token()),
            is_confidential: Set(new.is_confidential),
            name: Set(new.name),
            description: Set(new.description),
            redirect_uris: Set(new.redirect_uris.encode()),
            default_scopes: Set(new.default_scopes.encode()),
            user_id: Set(new.user_id),
            created_by: Set(Some(actor_id.to_string())),
            created_at: Set(now),
            modified_by: Set(Some(actor_id.to_string())),
            modified_at: Set(now),
        };
        Ok(model.insert(self.db.as_ref()).await?)
    }

    pub async fn update(
        &self,
        existing: oauth2_client::Model,
        changes: ClientChanges,
        actor_id: &str,
    ) -> Result<oauth2_client::Model, AuthError> {
        let mut active: oauth2_client::ActiveModel = existing.into();

        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(is_confidential) = changes.is_confidential {
            active.is_confidential = Set(is_confidential);
        }
        if let Some(redirect_uris) = changes.redirect_uris {
            active.redirect_uris = Set(redirect_uris.encode());
        }
        if let Some(default_scopes) = changes.default_scopes {
            active.default_scopes = Set(default_scopes.encode());
        }
        if changes.rotate_secret {
            active.secret = Set(generate_token());
        }
        active.modified_by = Set(Some(actor_id.to_string()));
        active.modified_at = Set(OffsetDateTime::now_utc());

        Ok(active.update(self.db.as_ref()).await?)
    }

    /// Remove a client together with its grants and tokens.
    pub async fn delete(&self, id: &str) -> Result<(), AuthError> {
        let txn = self.db.begin().await?;

        oauth2_token::Entity::delete_many()
            .filter(oauth2_token::Column::ClientId.eq(id))
            .exec(&txn)
            .await?;
        oauth2_grant::Entity::delete_many()
            .filter(oauth2_grant::Column::ClientId.eq(id))
            .exec(&txn)
            .await?;
        let result = oauth2_client::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(AuthError::not_found("client", id));
        }

        txn.commit().await?;
        Ok(())
    }
}
