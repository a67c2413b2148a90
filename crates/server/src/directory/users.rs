use super::{Directory, require_text, validate_email};
use crate::auth::password::validate_password;
use crate::auth::policy::{Operation, Resource, check_user_immutable};
use crate::entity::user;
use crate::error::AuthError;
use crate::store::{NewUser, UserChanges};
use time::OffsetDateTime;

/// An account created by a superuser.
pub struct UserRegistration {
    pub email: String,
    pub full_name: String,
    /// Without a password the user can only get in through a reset code.
    pub password: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
}

/// An account created by its own owner.
pub struct SelfRegistration {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub tos_approved: bool,
}

impl Directory {
    #[tracing::instrument(skip_all, fields(actor = %actor.id))]
    pub async fn register_user(
        &self,
        actor: &user::Model,
        registration: UserRegistration,
    ) -> Result<user::Model, AuthError> {
        self.policy
            .ensure(actor, Operation::Register, Resource::User { target_id: None })
            .await?;
        validate_email(&registration.email)?;
        require_text("full_name", &registration.full_name)?;
        let password_hash = match registration.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(self.hasher.hash_password(password)?)
            }
            None => None,
        };

        let created = self
            .users
            .insert(
                NewUser {
                    email: registration.email,
                    full_name: registration.full_name,
                    password_hash,
                    is_active: registration.is_active,
                    is_admin: registration.is_admin,
                    tos_approved_at: None,
                },
                Some(&actor.id),
            )
            .await?;
        tracing::info!(user_id = %created.id, is_admin = created.is_admin, "User registered");
        Ok(created)
    }

    /// Public sign-up. The new account is its own creator.
    #[tracing::instrument(skip_all)]
    pub async fn self_register(
        &self,
        registration: SelfRegistration,
    ) -> Result<user::Model, AuthError> {
        if !registration.tos_approved {
            return Err(AuthError::validation(
                "tos_approved",
                "terms of service must be accepted",
            ));
        }
        validate_email(&registration.email)?;
        require_text("full_name", &registration.full_name)?;
        validate_password(&registration.password)?;
        let password_hash = self.hasher.hash_password(&registration.password)?;

        let created = self
            .users
            .insert(
                NewUser {
                    email: registration.email,
                    full_name: registration.full_name,
                    password_hash: Some(password_hash),
                    is_active: true,
                    is_admin: false,
                    tos_approved_at: Some(OffsetDateTime::now_utc()),
                },
                None,
            )
            .await?;
        tracing::info!(user_id = %created.id, "User self-registered");
        Ok(created)
    }

    /// Create the first superuser. Does nothing once any superuser exists.
    #[tracing::instrument(skip(self, password))]
    pub async fn bootstrap_superuser(
        &self,
        email: &str,
        full_name: &str,
        password: &str,
    ) -> Result<Option<user::Model>, AuthError> {
        if self.users.any_superuser().await? {
            return Ok(None);
        }
        validate_email(email)?;
        require_text("full_name", full_name)?;
        validate_password(password)?;
        let password_hash = self.hasher.hash_password(password)?;

        let created = self
            .users
            .insert(
                NewUser {
                    email: email.to_string(),
                    full_name: full_name.to_string(),
                    password_hash: Some(password_hash),
                    is_active: true,
                    is_admin: true,
                    tos_approved_at: None,
                },
                None,
            )
            .await?;
        tracing::warn!(user_id = %created.id, "Bootstrap superuser created");
        Ok(Some(created))
    }

    pub async fn view_user(
        &self,
        actor: &user::Model,
        user_id: &str,
    ) -> Result<user::Model, AuthError> {
        self.policy
            .ensure(
                actor,
                Operation::View,
                Resource::User {
                    target_id: Some(user_id),
                },
            )
            .await?;
        self.users.get(user_id).await
    }

    pub async fn list_users(&self, actor: &user::Model) -> Result<Vec<user::Model>, AuthError> {
        self.policy
            .ensure(actor, Operation::View, Resource::User { target_id: None })
            .await?;
        self.users.list().await
    }

    /// Edit a user. The email can never change, not even by a superuser.
    #[tracing::instrument(skip_all, fields(actor = %actor.id, user_id = %user_id))]
    pub async fn update_user(
        &self,
        actor: &user::Model,
        user_id: &str,
        mut changes: UserChanges,
    ) -> Result<user::Model, AuthError> {
        let target = Resource::User {
            target_id: Some(user_id),
        };
        self.policy.ensure(actor, Operation::Edit, target).await?;
        if changes.touches_privileges() {
            self.policy
                .ensure(actor, Operation::Administer, target)
                .await?;
        }

        let existing = self.users.get(user_id).await?;
        check_user_immutable(&existing, changes.email.as_deref())?;
        changes.email = None;
        if let Some(name) = &changes.full_name {
            require_text("full_name", name)?;
        }

        let updated = self.users.update(existing, changes, &actor.id).await?;
        tracing::info!("User updated");
        Ok(updated)
    }

    /// Change a password.
    ///
    /// Changing one's own password requires the current one; superusers may
    /// set anyone else's without it.
    #[tracing::instrument(skip_all, fields(actor = %actor.id, user_id = %user_id))]
    pub async fn change_password(
        &self,
        actor: &user::Model,
        user_id: &str,
        current_password: Option<&str>,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.policy
            .ensure(
                actor,
                Operation::ChangePassword,
                Resource::User {
                    target_id: Some(user_id),
                },
            )
            .await?;
        let target = self.users.get(user_id).await?;

        if target.id == actor.id {
            let current = current_password.unwrap_or_default();
            if !self.hasher.check_password(&target, current) {
                return Err(AuthError::validation(
                    "current_password",
                    "does not match",
                ));
            }
        }
        validate_password(new_password)?;

        let hash = self.hasher.hash_password(new_password)?;
        self.users
            .set_password_hash(&target.id, hash, &actor.id)
            .await?;
        tracing::info!("Password changed");
        Ok(())
    }

    /// Soft-delete a user by anonymising the account.
    #[tracing::instrument(skip_all, fields(actor = %actor.id, user_id = %user_id))]
    pub async fn delete_user(
        &self,
        actor: &user::Model,
        user_id: &str,
    ) -> Result<user::Model, AuthError> {
        self.policy
            .ensure(
                actor,
                Operation::Delete,
                Resource::User {
                    target_id: Some(user_id),
                },
            )
            .await?;
        if actor.id == user_id {
            return Err(AuthError::validation("user", "cannot delete yourself"));
        }

        let anonymized = self.users.anonymize(user_id, &actor.id).await?;
        tracing::info!("User anonymised");
        Ok(anonymized)
    }
}
