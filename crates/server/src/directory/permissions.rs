use super::Directory;
use crate::auth::Capabilities;
use crate::auth::policy::{Operation, Resource};
use crate::entity::{permission, user};
use crate::error::AuthError;
use crate::store::{NewPermission, PermissionEntry};

fn require_capability(capabilities: Capabilities) -> Result<(), AuthError> {
    if !capabilities.any() {
        return Err(AuthError::validation(
            "permission",
            "at least one capability must be granted",
        ));
    }
    Ok(())
}

impl Directory {
    /// Grant a user capabilities on a collection.
    ///
    /// Allowed for superusers and for cataloging admins of that collection.
    #[tracing::instrument(skip_all, fields(actor = %actor.id, user_id = %new.user_id, collection_id = %new.collection_id))]
    pub async fn register_permission(
        &self,
        actor: &user::Model,
        new: NewPermission,
    ) -> Result<permission::Model, AuthError> {
        self.policy
            .ensure(
                actor,
                Operation::Register,
                Resource::Permission {
                    collection_id: &new.collection_id,
                },
            )
            .await?;
        require_capability(new.capabilities)?;
        self.users.get(&new.user_id).await?;
        self.collections.get(&new.collection_id).await?;

        let created = self.permissions.insert(new, &actor.id).await?;
        tracing::info!(permission_id = %created.id, "Permission registered");
        Ok(created)
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.id, permission_id = %permission_id))]
    pub async fn update_permission(
        &self,
        actor: &user::Model,
        permission_id: &str,
        capabilities: Capabilities,
    ) -> Result<permission::Model, AuthError> {
        let existing = self.permissions.get(permission_id).await?;
        self.policy
            .ensure(
                actor,
                Operation::Edit,
                Resource::Permission {
                    collection_id: &existing.collection_id,
                },
            )
            .await?;
        require_capability(capabilities)?;

        let updated = self
            .permissions
            .update(existing, capabilities, &actor.id)
            .await?;
        tracing::info!(?capabilities, "Permission updated");
        Ok(updated)
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.id, permission_id = %permission_id))]
    pub async fn delete_permission(
        &self,
        actor: &user::Model,
        permission_id: &str,
    ) -> Result<(), AuthError> {
        let existing = self.permissions.get(permission_id).await?;
        self.policy
            .ensure(
                actor,
                Operation::Delete,
                Resource::Permission {
                    collection_id: &existing.collection_id,
                },
            )
            .await?;

        self.permissions.delete(&existing.id).await?;
        tracing::info!("Permission deleted");
        Ok(())
    }

    /// Permission rows of one collection, for its cataloging admins.
    pub async fn collection_permissions(
        &self,
        actor: &user::Model,
        collection_id: &str,
    ) -> Result<Vec<permission::Model>, AuthError> {
        self.policy
            .ensure(actor, Operation::View, Resource::Permission { collection_id })
            .await?;
        self.permissions.list_for_collection(collection_id).await
    }

    /// The target's permissions as `viewer` may see them.
    ///
    /// A viewer who administers none of the target's collections gets an empty
    /// list rather than an error. Inactive viewers are refused.
    pub async fn visible_permissions(
        &self,
        viewer: &user::Model,
        target_id: &str,
    ) -> Result<Vec<PermissionEntry>, AuthError> {
        if !viewer.is_active {
            return Err(AuthError::InsufficientPrivileges);
        }
        self.resolver
            .visible_permissions_for_viewer(viewer, target_id)
            .await
    }
}
