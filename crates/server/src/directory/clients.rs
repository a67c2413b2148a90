use super::{Directory, require_text, validate_redirect_uris, validate_scopes};
use crate::auth::policy::{Operation, Resource};
use crate::entity::{oauth2_client, user};
use crate::error::AuthError;
use crate::store::{ClientChanges, NewClient};

impl Directory {
    pub async fn list_clients(
        &self,
        actor: &user::Model,
    ) -> Result<Vec<oauth2_client::Model>, AuthError> {
        self.policy
            .ensure(actor, Operation::View, Resource::Client)
            .await?;
        self.clients.list().await
    }

    /// Register a client; its id and secret are generated.
    #[tracing::instrument(skip_all, fields(actor = %actor.id, name = %new.name))]
    pub async fn register_client(
        &self,
        actor: &user::Model,
        new: NewClient,
    ) -> Result<oauth2_client::Model, AuthError> {
        self.policy
            .ensure(actor, Operation::Register, Resource::Client)
            .await?;
        require_text("name", &new.name)?;
        validate_redirect_uris(&new.redirect_uris)?;
        validate_scopes(&new.default_scopes)?;
        if let Some(owner) = &new.user_id {
            self.users.get(owner).await?;
        }

        let created = self.clients.insert(new, &actor.id).await?;
        tracing::info!(client_id = %created.id, "OAuth2 client registered");
        Ok(created)
    }

    #[tracing::instrument(skip_all, fields(actor = %actor.id, client_id = %client_id))]
    pub async fn update_client(
        &self,
        actor: &user::Model,
        client_id: &str,
        changes: ClientChanges,
    ) -> Result<oauth2_client::Model, AuthError> {
        self.policy
            .ensure(actor, Operation::Edit, Resource::Client)
            .await?;
        let existing = self.clients.get(client_id).await?;
        if let Some(name) = &changes.name {
            require_text("name", name)?;
        }
        if let Some(uris) = &changes.redirect_uris {
            validate_redirect_uris(uris)?;
        }
        if let Some(scopes) = &changes.default_scopes {
            validate_scopes(scopes)?;
        }

        let updated = self.clients.update(existing, changes, &actor.id).await?;
        tracing::info!("OAuth2 client updated");
        Ok(updated)
    }

    /// Delete a client with all of its grants and tokens.
    #[tracing::instrument(skip_all, fields(actor = %actor.id, client_id = %client_id))]
    pub async fn delete_client(&self, actor: &user::Model, client_id: &str) -> Result<(), AuthError> {
        self.policy
            .ensure(actor, Operation::Delete, Resource::Client)
            .await?;
        self.clients.delete(client_id).await?;
        tracing::info!("OAuth2 client deleted");
        Ok(())
    }
}
