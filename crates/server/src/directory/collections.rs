use super::{Directory, require_text, validate_collection_code};
use crate::auth::policy::{Operation, Resource, check_collection_immutable};
use crate::entity::{collection, user};
use crate::error::AuthError;
use crate::store::{CollectionChanges, NewCollection};

impl Directory {
    pub async fn list_collections(
        &self,
        actor: &user::Model,
    ) -> Result<Vec<collection::Model>, AuthError> {
        self.policy
            .ensure(actor, Operation::View, Resource::Collection)
            .await?;
        self.collections.list().await
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.id, code = %new.code))]
    pub async fn register_collection(
        &self,
        actor: &user::Model,
        new: NewCollection,
    ) -> Result<collection::Model, AuthError> {
        self.policy
            .ensure(actor, Operation::Register, Resource::Collection)
            .await?;
        validate_collection_code(&new.code)?;
        require_text("friendly_name", &new.friendly_name)?;

        let created = self.collections.insert(new, &actor.id).await?;
        tracing::info!(collection_id = %created.id, "Collection registered");
        Ok(created)
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.id, collection_id = %collection_id))]
    pub async fn update_collection(
        &self,
        actor: &user::Model,
        collection_id: &str,
        changes: CollectionChanges,
    ) -> Result<collection::Model, AuthError> {
        self.policy
            .ensure(actor, Operation::Edit, Resource::Collection)
            .await?;
        let existing = self.collections.get(collection_id).await?;
        check_collection_immutable(&existing, changes.code.as_deref())?;
        if let Some(name) = &changes.friendly_name {
            require_text("friendly_name", name)?;
        }

        let updated = self
            .collections
            .update(existing, changes, &actor.id)
            .await?;
        tracing::info!("Collection updated");
        Ok(updated)
    }

    /// Collections are never removed; this only clears `is_active`.
    pub async fn deactivate_collection(
        &self,
        actor: &user::Model,
        collection_id: &str,
    ) -> Result<collection::Model, AuthError> {
        self.update_collection(
            actor,
            collection_id,
            CollectionChanges {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
    }
}
