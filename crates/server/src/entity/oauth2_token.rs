//! OAuth2 Token entity - bearer and refresh token pair.
//!
//! At most one row exists per `(client_id, user_id)`.

use crate::oauth2::SpaceList;
use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[derive(Clone, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth2_token")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub access_token: String,
    #[sea_orm(unique)]
    pub refresh_token: Option<String>,
    /// Always "Bearer"
    pub token_type: String,
    pub client_id: String,
    pub user_id: String,
    pub scopes: String,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Token")
            .field("id", &self.id)
            .field("client_id", &self.client_id)
            .field("user_id", &self.user_id)
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

impl Model {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    pub fn scope_list(&self) -> SpaceList {
        SpaceList::decode(&self.scopes)
    }

    /// Seconds until expiry, clamped at zero
    pub fn expires_in(&self, now: OffsetDateTime) -> i64 {
        (self.expires_at - now).whole_seconds().max(0)
    }
}
