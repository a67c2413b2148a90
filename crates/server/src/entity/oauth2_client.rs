//! OAuth2 Client entity.

use crate::oauth2::SpaceList;
use sea_orm::entity::prelude::*;
use std::fmt;
use time::OffsetDateTime;

#[derive(Clone, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth2_client")]
pub struct Model {
    /// Public client identifier
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Client secret; only checked for confidential clients
    pub secret: String,
    pub is_confidential: bool,
    /// Human-readable client name
    pub name: String,
    pub description: Option<String>,
    /// Space-separated redirect URIs; the first one is the default
    pub redirect_uris: String,
    /// Space-separated scopes the client may request
    pub default_scopes: String,
    /// Owning user, if any
    pub user_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: OffsetDateTime,
    pub modified_by: Option<String>,
    pub modified_at: OffsetDateTime,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Client")
            .field("id", &self.id)
            .field("is_confidential", &self.is_confidential)
            .field("name", &self.name)
            .field("redirect_uris", &self.redirect_uris)
            .field("default_scopes", &self.default_scopes)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn redirect_uri_list(&self) -> SpaceList {
        SpaceList::decode(&self.redirect_uris)
    }

    pub fn scope_list(&self) -> SpaceList {
        SpaceList::decode(&self.default_scopes)
    }

    /// Exact-match check against the registered redirect URIs
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uri_list().contains(uri)
    }

    /// The first registered redirect URI
    pub fn default_redirect_uri(&self) -> Option<String> {
        self.redirect_uri_list().first().map(String::from)
    }
}
