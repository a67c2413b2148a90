//! Sliding-window throttle on failed logins, keyed by (username, remote address).

use crate::config::ThrottleConfig;
use crate::entity::{failed_login_attempt, user::normalize_email};
use crate::error::AuthError;
use crate::store::new_id;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter,
};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

#[derive(Clone)]
pub struct LoginThrottle {
    db: Arc<DatabaseConnection>,
    config: ThrottleConfig,
}

impl LoginThrottle {
    pub fn new(db: Arc<DatabaseConnection>, config: ThrottleConfig) -> Self {
        Self { db, config }
    }

    /// Record a failure and drop the pair's attempts that fell out of the window.
    pub async fn record_failure(&self, username: &str, remote_addr: &str) -> Result<(), AuthError> {
        let username = normalize_email(username);
        let now = OffsetDateTime::now_utc();
        failed_login_attempt::Entity::delete_many()
            .filter(failed_login_attempt::Column::Username.eq(username.as_str()))
            .filter(failed_login_attempt::Column::RemoteAddr.eq(remote_addr))
            .filter(
                failed_login_attempt::Column::CreatedAt
                    .lt(now - Duration::seconds(self.config.window_seconds)),
            )
            .exec(self.db.as_ref())
            .await?;

        failed_login_attempt::ActiveModel {
            id: Set(new_id()),
            username: Set(username),
            remote_addr: Set(remote_addr.to_string()),
            created_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Failures for the pair within the last `window_seconds`.
    pub async fn recent_failures(
        &self,
        username: &str,
        remote_addr: &str,
        window_seconds: i64,
    ) -> Result<u64, AuthError> {
        let cutoff = OffsetDateTime::now_utc() - Duration::seconds(window_seconds);
        let count = failed_login_attempt::Entity::find()
            .filter(failed_login_attempt::Column::Username.eq(normalize_email(username)))
            .filter(failed_login_attempt::Column::RemoteAddr.eq(remote_addr))
            .filter(failed_login_attempt::Column::CreatedAt.gte(cutoff))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    pub async fn is_blocked(
        &self,
        username: &str,
        remote_addr: &str,
        window_seconds: i64,
        max_attempts: u64,
    ) -> Result<bool, AuthError> {
        Ok(self
            .recent_failures(username, remote_addr, window_seconds)
            .await?
            >= max_attempts)
    }

    /// `is_blocked` with the configured window and limit.
    pub async fn check(&self, username: &str, remote_addr: &str) -> Result<bool, AuthError> {
        self.is_blocked(
            username,
            remote_addr,
            self.config.window_seconds,
            self.config.max_attempts,
        )
        .await
    }

    /// Forget every failure recorded for the pair.
    pub async fn purge(&self, username: &str, remote_addr: &str) -> Result<u64, AuthError> {
        let result = failed_login_attempt::Entity::delete_many()
            .filter(failed_login_attempt::Column::Username.eq(normalize_email(username)))
            .filter(failed_login_attempt::Column::RemoteAddr.eq(remote_addr))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}
