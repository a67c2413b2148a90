use super::new_id;
use crate::entity::{oauth2_grant, oauth2_token, password_reset, permission, user};
use crate::error::{AuthError, conflict_on_unique};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use time::OffsetDateTime;

/// Fields for a new account. The password arrives already hashed.
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub tos_approved_at: Option<OffsetDateTime>,
}

/// Partial update; `None` leaves a field untouched.
#[derive(Clone, Debug, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
}

impl UserChanges {
    pub fn touches_privileges(&self) -> bool {
        self.is_active.is_some() || self.is_admin.is_some()
    }
}

#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find(&self, id: &str) -> Result<Option<user::Model>, AuthError> {
        Ok(user::Entity::find_by_id(id).one(self.db.as_ref()).await?)
    }

    pub async fn get(&self, id: &str) -> Result<user::Model, AuthError> {
        self.find(id)
            .await?
            .ok_or_else(|| AuthError::not_found("user", id))
    }

    /// Case-insensitive lookup.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, AuthError> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(user::normalize_email(email)))
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn any_superuser(&self) -> Result<bool, AuthError> {
        Ok(user::Entity::find()
            .filter(user::Column::IsAdmin.eq(true))
            .one(self.db.as_ref())
            .await?
            .is_some())
    }

    pub async fn list(&self) -> Result<Vec<user::Model>, AuthError> {
        Ok(user::Entity::find()
            .order_by_asc(user::Column::Email)
            .all(self.db.as_ref())
            .await?)
    }

    /// Insert a user. Without an actor the account is recorded as created by itself.
    pub async fn insert(
        &self,
        new: NewUser,
        actor_id: Option<&str>,
    ) -> Result<user::Model, AuthError> {
        let id = new_id();
        let now = OffsetDateTime::now_utc();
        let email = user::normalize_email(&new.email);
        let author = actor_id.map_or_else(|| id.clone(), str::to_string);

        let model = user::ActiveModel {
            id: Set(id),
            email: Set(email.clone()),
            full_name: Set(new.full_name),
            password_hash: Set(new.password_hash),
            is_active: Set(new.is_active),
            is_admin: Set(new.is_admin),
            last_login_at: Set(None),
            tos_approved_at: Set(new.tos_approved_at),
            created_by: Set(Some(author.clone())),
            created_at: Set(now),
            modified_by: Set(Some(author)),
            modified_at: Set(now),
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| conflict_on_unique(e, "user", &email))
    }

    pub async fn update(
        &self,
        user: user::Model,
        changes: UserChanges,
        actor_id: &str,
    ) -> Result<user::Model, AuthError> {
        let key = changes
            .email
            .as_deref()
            .map(user::normalize_email)
            .unwrap_or_else(|| user.email.clone());
        let mut active: user::ActiveModel = user.into();

        if let Some(email) = changes.email {
            active.email = Set(user::normalize_email(&email));
        }
        if let Some(full_name) = changes.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(is_admin) = changes.is_admin {
            active.is_admin = Set(is_admin);
        }
        active.modified_by = Set(Some(actor_id.to_string()));
        active.modified_at = Set(OffsetDateTime::now_utc());

        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| conflict_on_unique(e, "user", &key))
    }

    pub async fn set_password_hash(
        &self,
        user_id: &str,
        password_hash: String,
        actor_id: &str,
    ) -> Result<(), AuthError> {
        let result = user::Entity::update_many()
            .col_expr(user::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(user::Column::ModifiedBy, Expr::value(actor_id))
            .col_expr(
                user::Column::ModifiedAt,
                Expr::value(OffsetDateTime::now_utc()),
            )
            .filter(user::Column::Id.eq(user_id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(AuthError::not_found("user", user_id));
        }
        Ok(())
    }

    pub async fn touch_last_login(&self, user_id: &str) -> Result<(), AuthError> {
        user::Entity::update_many()
            .col_expr(
                user::Column::LastLoginAt,
                Expr::value(OffsetDateTime::now_utc()),
            )
            .filter(user::Column::Id.eq(user_id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Soft-delete: strip personal data and access, keep the row for audit references.
    pub async fn anonymize(&self, user_id: &str, actor_id: &str) -> Result<user::Model, AuthError> {
        let txn = self.db.begin().await?;

        let existing = user::Entity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AuthError::not_found("user", user_id))?;

        permission::Entity::delete_many()
            .filter(permission::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        oauth2_token::Entity::delete_many()
            .filter(oauth2_token::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        oauth2_grant::Entity::delete_many()
            .filter(oauth2_grant::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        password_reset::Entity::update_many()
            .col_expr(password_reset::Column::IsActive, Expr::value(false))
            .filter(password_reset::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;

        let mut active: user::ActiveModel = existing.into();
        active.email = Set(anonymized_email(user_id));
        active.full_name = Set("Deleted user".to_string());
        active.password_hash = Set(None);
        active.is_active = Set(false);
        active.is_admin = Set(false);
        active.modified_by = Set(Some(actor_id.to_string()));
        active.modified_at = Set(OffsetDateTime::now_utc());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }
}

pub(crate) fn anonymized_email(user_id: &str) -> String {
    format!("deleted-{user_id}@invalid")
}
