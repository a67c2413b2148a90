//! OAuth2 Grant entity - authorization codes, exchanged exactly once.

use crate::oauth2::SpaceList;
use sea_orm::entity::prelude::*;
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth2_grant")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub client_id: String,
    pub user_id: String,
    /// Redirect URI the code was issued for; the exchange must repeat it
    pub redirect_uri: String,
    pub scopes: String,
    /// PKCE code challenge (public clients)
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    pub fn scope_list(&self) -> SpaceList {
        SpaceList::decode(&self.scopes)
    }

    /// Verify a PKCE code verifier against the stored S256 challenge
    pub fn verify_pkce(&self, code_verifier: &str) -> bool {
        use base64::Engine;
        use sha2::{Digest, Sha256};
        use subtle::ConstantTimeEq;

        match (&self.code_challenge, self.code_challenge_method.as_deref()) {
            (Some(challenge), Some("S256")) => {
                let digest = Sha256::digest(code_verifier.as_bytes());
                let computed = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);
                computed.as_bytes().ct_eq(challenge.as_bytes()).into()
            }
            _ => false,
        }
    }
}
