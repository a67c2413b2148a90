//! Single-use password reset codes.
//!
//! Delivering the code to the user (email) happens outside this service.

use crate::auth::password::{PasswordHasher, generate_reset_code, validate_password};
use crate::config::PasswordResetConfig;
use crate::entity::{password_reset, user};
use crate::error::{AuthError, ResetRejection};
use crate::store::new_id;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

#[derive(Clone)]
pub struct PasswordResets {
    db: Arc<DatabaseConnection>,
    hasher: PasswordHasher,
    config: PasswordResetConfig,
}

impl PasswordResets {
    pub fn new(
        db: Arc<DatabaseConnection>,
        hasher: PasswordHasher,
        config: PasswordResetConfig,
    ) -> Self {
        Self { db, hasher, config }
    }

    /// Issue a new code for `user`.
    ///
    /// Refused with `RateLimited` once the user already holds the configured
    /// number of active, unexpired codes.
    #[tracing::instrument(skip_all, fields(user_id = %user.id))]
    pub async fn issue(&self, user: &user::Model) -> Result<password_reset::Model, AuthError> {
        if !user.is_active {
            return Err(AuthError::InsufficientPrivileges);
        }

        let now = OffsetDateTime::now_utc();
        let active = password_reset::Entity::find()
            .filter(password_reset::Column::UserId.eq(user.id.as_str()))
            .filter(password_reset::Column::IsActive.eq(true))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .filter(|r| !r.is_expired_at(now))
            .count() as u64;
        if active >= self.config.max_active_per_user {
            tracing::warn!(user_id = %user.id, active, "Too many active password reset codes");
            return Err(AuthError::RateLimited);
        }

        let reset = password_reset::ActiveModel {
            id: Set(new_id()),
            user_id: Set(user.id.clone()),
            code: Set(generate_reset_code()),
            is_active: Set(true),
            expires_at: Set(now + Duration::days(self.config.lifetime_days)),
            created_at: Set(now),
            modified_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        tracing::info!(user_id = %user.id, "Password reset code issued");
        Ok(reset)
    }

    /// Consume a code and set the new password, atomically.
    ///
    /// The code must belong to the account with `email`; a mismatch is
    /// indistinguishable from an unknown code.
    #[tracing::instrument(skip(self, code, new_password))]
    pub async fn consume(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;
        // Hash outside the transaction; it is the slow part.
        let password_hash = self.hasher.hash_password(new_password)?;
        let now = OffsetDateTime::now_utc();

        let txn = self.db.begin().await?;

        let user = user::Entity::find()
            .filter(user::Column::Email.eq(user::normalize_email(email)))
            .one(&txn)
            .await?
            .ok_or(AuthError::ResetRejected(ResetRejection::NotFound))?;

        let reset = password_reset::Entity::find()
            .filter(password_reset::Column::UserId.eq(user.id.as_str()))
            .filter(password_reset::Column::Code.eq(code))
            .one(&txn)
            .await?
            .ok_or(AuthError::ResetRejected(ResetRejection::NotFound))?;

        // A used code reports AlreadyUsed even after it has also expired.
        if !reset.is_active {
            return Err(AuthError::ResetRejected(ResetRejection::AlreadyUsed));
        }
        if reset.is_expired_at(now) {
            return Err(AuthError::ResetRejected(ResetRejection::Expired));
        }

        // Conditional on is_active so a concurrent consume cannot also win.
        let deactivated = password_reset::Entity::update_many()
            .col_expr(password_reset::Column::IsActive, Expr::value(false))
            .col_expr(password_reset::Column::ModifiedAt, Expr::value(now))
            .filter(password_reset::Column::Id.eq(reset.id.as_str()))
            .filter(password_reset::Column::IsActive.eq(true))
            .exec(&txn)
            .await?;
        if deactivated.rows_affected == 0 {
            return Err(AuthError::ResetRejected(ResetRejection::AlreadyUsed));
        }

        user::Entity::update_many()
            .col_expr(user::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(user::Column::ModifiedBy, Expr::value(user.id.clone()))
            .col_expr(user::Column::ModifiedAt, Expr::value(now))
            .filter(user::Column::Id.eq(user.id.as_str()))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(())
    }
}
