//! Authorization-code grants and bearer tokens.
//!
//! Grants are single-use: presenting a code deletes its grant before anything
//! else is checked, and the deletion is kept even when the exchange is then
//! refused. Each (client, user) pair holds at most one token; issuing a new one
//! replaces the old.

use crate::auth::password::generate_token;
use crate::config::OAuth2Config;
use crate::entity::{oauth2_client, oauth2_grant, oauth2_token, user};
use crate::error::AuthError;
use crate::oauth2::SpaceList;
use crate::store::{PermissionEntry, PermissionRepository, new_id};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use time::{Duration, OffsetDateTime};

pub const PKCE_METHOD_S256: &str = "S256";

/// Parameters of an authorization request, before validation.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: Option<String>,
    pub scope: Option<SpaceList>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

/// PKCE challenge stored with a grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pkce {
    pub challenge: String,
    pub method: String,
}

/// The outcome of a successful token verification.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user: user::Model,
    pub token: oauth2_token::Model,
    /// Permissions on active collections only, ordered by collection code.
    pub permissions: Vec<PermissionEntry>,
}

/// Pick the redirect URI for a grant: the requested one if registered,
/// otherwise the client's default.
pub fn resolve_redirect_uri(
    client: &oauth2_client::Model,
    requested: Option<&str>,
) -> Result<String, AuthError> {
    match requested {
        Some(uri) if client.is_redirect_uri_allowed(uri) => Ok(uri.to_string()),
        Some(_) => Err(AuthError::InvalidRedirectUri),
        None => client
            .default_redirect_uri()
            .ok_or(AuthError::InvalidRedirectUri),
    }
}

/// Requested scopes must be a subset of the client's; none means all of them.
pub fn resolve_scopes(
    client: &oauth2_client::Model,
    requested: Option<&SpaceList>,
) -> Result<SpaceList, AuthError> {
    let allowed = client.scope_list();
    match requested {
        Some(scopes) if !scopes.is_empty() => {
            if scopes.is_subset_of(&allowed) {
                Ok(scopes.clone())
            } else {
                Err(AuthError::InvalidScope)
            }
        }
        _ => Ok(allowed),
    }
}

/// Public clients must send an S256 challenge; confidential clients may.
pub fn resolve_pkce(
    client: &oauth2_client::Model,
    challenge: Option<&str>,
    method: Option<&str>,
) -> Result<Option<Pkce>, AuthError> {
    match (challenge, method) {
        (Some(challenge), Some(PKCE_METHOD_S256) | None) if !challenge.is_empty() => {
            Ok(Some(Pkce {
                challenge: challenge.to_string(),
                method: PKCE_METHOD_S256.to_string(),
            }))
        }
        (Some(_), Some(_)) => Err(AuthError::validation(
            "code_challenge_method",
            "only S256 is supported",
        )),
        _ if !client.is_confidential => Err(AuthError::validation(
            "code_challenge",
            "required for public clients",
        )),
        _ => Ok(None),
    }
}

/// Checks run on a grant that has already been consumed.
pub fn check_grant(
    grant: &oauth2_grant::Model,
    client: &oauth2_client::Model,
    redirect_uri: Option<&str>,
    code_verifier: Option<&str>,
    now: OffsetDateTime,
) -> Result<(), AuthError> {
    if grant.client_id != client.id {
        return Err(AuthError::not_found("grant", "authorization code"));
    }
    if grant.is_expired_at(now) {
        return Err(AuthError::GrantExpired);
    }

    let redirect_matches = match redirect_uri {
        Some(uri) => uri == grant.redirect_uri,
        // Omitting it is only fine when the grant went to the default URI.
        None => client.default_redirect_uri().as_deref() == Some(grant.redirect_uri.as_str()),
    };
    if !redirect_matches {
        return Err(AuthError::InvalidRedirectUri);
    }

    match (&grant.code_challenge, code_verifier) {
        (Some(_), Some(verifier)) if grant.verify_pkce(verifier) => Ok(()),
        (Some(_), Some(_)) => Err(AuthError::validation("code_verifier", "does not match")),
        (Some(_), None) => Err(AuthError::validation("code_verifier", "is required")),
        (None, _) if !client.is_confidential => Err(AuthError::InvalidClient),
        (None, _) => Ok(()),
    }
}

#[derive(Clone)]
pub struct TokenService {
    db: Arc<DatabaseConnection>,
    permissions: PermissionRepository,
    config: OAuth2Config,
}

impl TokenService {
    pub fn new(db: Arc<DatabaseConnection>, config: OAuth2Config) -> Self {
        Self {
            permissions: PermissionRepository::new(db.clone()),
            db,
            config,
        }
    }

    pub async fn find_client(&self, client_id: &str) -> Result<oauth2_client::Model, AuthError> {
        oauth2_client::Entity::find_by_id(client_id)
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::InvalidClient)
    }

    /// Authenticate a client at the token and revocation endpoints.
    ///
    /// Confidential clients must present their secret. Public clients are
    /// identified by id alone and prove possession with PKCE at exchange time.
    #[tracing::instrument(skip(self, client_secret))]
    pub async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<oauth2_client::Model, AuthError> {
        let client = self.find_client(client_id).await?;
        if client.is_confidential {
            let presented = client_secret.ok_or(AuthError::InvalidClient)?;
            if !bool::from(presented.as_bytes().ct_eq(client.secret.as_bytes())) {
                tracing::info!(client_id, "Client authentication failed");
                return Err(AuthError::InvalidClient);
            }
        }
        Ok(client)
    }

    /// Validate an authorization request and issue a grant to `resource_owner`.
    pub async fn authorize(
        &self,
        request: &AuthorizationRequest,
        resource_owner: &user::Model,
    ) -> Result<oauth2_grant::Model, AuthError> {
        let client = self.find_client(&request.client_id).await?;
        let redirect_uri = resolve_redirect_uri(&client, request.redirect_uri.as_deref())?;
        let scopes = resolve_scopes(&client, request.scope.as_ref())?;
        let pkce = resolve_pkce(
            &client,
            request.code_challenge.as_deref(),
            request.code_challenge_method.as_deref(),
        )?;
        self.issue_grant(&client, resource_owner, redirect_uri, scopes, pkce)
            .await
    }

    /// Store a grant for already-validated parameters.
    pub async fn issue_grant(
        &self,
        client: &oauth2_client::Model,
        resource_owner: &user::Model,
        redirect_uri: String,
        scopes: SpaceList,
        pkce: Option<Pkce>,
    ) -> Result<oauth2_grant::Model, AuthError> {
        if !resource_owner.is_active {
            return Err(AuthError::InsufficientPrivileges);
        }

        let now = OffsetDateTime::now_utc();
        let (code_challenge, code_challenge_method) = match pkce {
            Some(p) => (Some(p.challenge), Some(p.method)),
            None => (None, None),
        };
        let grant = oauth2_grant::ActiveModel {
            code: Set(generate_token()),
            client_id: Set(client.id.clone()),
            user_id: Set(resource_owner.id.clone()),
            redirect_uri: Set(redirect_uri),
            scopes: Set(scopes.encode()),
            code_challenge: Set(code_challenge),
            code_challenge_method: Set(code_challenge_method),
            expires_at: Set(now + Duration::seconds(self.config.grant_lifetime)),
            created_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        tracing::info!(client_id = %client.id, user_id = %resource_owner.id, "Authorization grant issued");
        Ok(grant)
    }

    /// Exchange an authorization code for a token.
    ///
    /// Whoever presents the code burns it: the grant is deleted and committed
    /// before the client, redirect URI, expiry or PKCE checks run, so neither
    /// a refused exchange nor a later storage failure leaves it usable.
    #[tracing::instrument(skip_all, fields(client_id = %client.id))]
    pub async fn exchange_code(
        &self,
        client: &oauth2_client::Model,
        code: &str,
        redirect_uri: Option<&str>,
        code_verifier: Option<&str>,
    ) -> Result<oauth2_token::Model, AuthError> {
        let now = OffsetDateTime::now_utc();
        let grant = self.take_grant(code).await?;

        if let Err(err) = check_grant(&grant, client, redirect_uri, code_verifier, now) {
            tracing::info!(client_id = %client.id, error = %err, "Authorization code exchange refused");
            return Err(err);
        }

        let txn = self.db.begin().await?;
        let owner = user::Entity::find_by_id(grant.user_id.as_str())
            .one(&txn)
            .await?;
        if !owner.is_some_and(|u| u.is_active) {
            return Err(AuthError::InsufficientPrivileges);
        }

        let token = self
            .issue_token(&txn, &client.id, &grant.user_id, &grant.scope_list(), now)
            .await?;
        txn.commit().await?;

        tracing::info!(client_id = %client.id, user_id = %grant.user_id, "Access token issued");
        Ok(token)
    }

    /// Delete the grant for `code` and return it. Only one caller can win.
    async fn take_grant(&self, code: &str) -> Result<oauth2_grant::Model, AuthError> {
        let txn = self.db.begin().await?;
        let grant = oauth2_grant::Entity::find_by_id(code)
            .one(&txn)
            .await?
            .ok_or_else(|| AuthError::not_found("grant", "authorization code"))?;

        let deleted = oauth2_grant::Entity::delete_by_id(grant.code.clone())
            .exec(&txn)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(AuthError::not_found("grant", "authorization code"));
        }
        txn.commit().await?;
        Ok(grant)
    }

    /// Rotate a token. The old access and refresh tokens stop working.
    ///
    /// A narrower scope may be requested; it must be a subset of the original.
    #[tracing::instrument(skip_all, fields(client_id = %client.id))]
    pub async fn refresh(
        &self,
        client: &oauth2_client::Model,
        refresh_token: &str,
        scope: Option<&SpaceList>,
    ) -> Result<oauth2_token::Model, AuthError> {
        let now = OffsetDateTime::now_utc();
        let txn = self.db.begin().await?;

        let existing = oauth2_token::Entity::find()
            .filter(oauth2_token::Column::RefreshToken.eq(refresh_token))
            .filter(oauth2_token::Column::ClientId.eq(client.id.as_str()))
            .one(&txn)
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        let original = existing.scope_list();
        let scopes = match scope {
            Some(requested) if !requested.is_empty() => {
                if !requested.is_subset_of(&original) {
                    return Err(AuthError::InvalidScope);
                }
                requested.clone()
            }
            _ => original,
        };

        let owner = user::Entity::find_by_id(existing.user_id.as_str())
            .one(&txn)
            .await?;
        if !owner.is_some_and(|u| u.is_active) {
            return Err(AuthError::TokenNotFound);
        }

        let deleted = oauth2_token::Entity::delete_by_id(existing.id.clone())
            .exec(&txn)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(AuthError::TokenNotFound);
        }

        let token = self
            .issue_token(&txn, &client.id, &existing.user_id, &scopes, now)
            .await?;
        txn.commit().await?;

        tracing::info!(client_id = %client.id, user_id = %existing.user_id, "Token refreshed");
        Ok(token)
    }

    /// Resolve a bearer token to its user and their active-collection permissions.
    #[tracing::instrument(skip_all)]
    pub async fn verify(&self, access_token: &str) -> Result<Principal, AuthError> {
        let token = oauth2_token::Entity::find()
            .filter(oauth2_token::Column::AccessToken.eq(access_token))
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::TokenNotFound)?;

        if token.is_expired_at(OffsetDateTime::now_utc()) {
            return Err(AuthError::TokenExpired);
        }

        let user = user::Entity::find_by_id(token.user_id.as_str())
            .one(self.db.as_ref())
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::TokenNotFound)?;

        let permissions = self
            .permissions
            .list_for_user(&user.id)
            .await?
            .into_iter()
            .filter(|e| e.collection.is_active)
            .collect();

        Ok(Principal {
            user,
            token,
            permissions,
        })
    }

    /// Delete the token matching `token` (access or refresh) for this client.
    ///
    /// Unknown tokens are not an error.
    #[tracing::instrument(skip_all, fields(client_id = %client.id))]
    pub async fn revoke(
        &self,
        client: &oauth2_client::Model,
        token: &str,
    ) -> Result<u64, AuthError> {
        let result = oauth2_token::Entity::delete_many()
            .filter(oauth2_token::Column::ClientId.eq(client.id.as_str()))
            .filter(
                Condition::any()
                    .add(oauth2_token::Column::AccessToken.eq(token))
                    .add(oauth2_token::Column::RefreshToken.eq(token)),
            )
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected > 0 {
            tracing::info!(client_id = %client.id, "Token revoked");
        }
        Ok(result.rows_affected)
    }

    async fn issue_token<C: ConnectionTrait>(
        &self,
        conn: &C,
        client_id: &str,
        user_id: &str,
        scopes: &SpaceList,
        now: OffsetDateTime,
    ) -> Result<oauth2_token::Model, AuthError> {
        oauth2_token::Entity::delete_many()
            .filter(oauth2_token::Column::ClientId.eq(client_id))
            .filter(oauth2_token::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;

        let token = oauth2_token::ActiveModel {
            id: Set(new_id()),
            access_token: Set(generate_token()),
            refresh_token: Set(Some(generate_token())),
            token_type: Set(oauth2_token::TOKEN_TYPE_BEARER.to_string()),
            client_id: Set(client_id.to_string()),
            user_id: Set(user_id.to_string()),
            scopes: Set(scopes.encode()),
            expires_at: Set(now + Duration::seconds(self.config.access_token_lifetime)),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use sha2::{Digest, Sha256};

    fn client(is_confidential: bool) -> oauth2_client::Model {
        let now = OffsetDateTime::now_utc();
        oauth2_client::Model {
            id: "client-1".into(),
            secret: "s3cret".into(),
            is_confidential,
            name: "Cataloguing UI".into(),
            description: None,
            redirect_uris: "https://app.example/cb https://app.example/alt".into(),
            default_scopes: "read write".into(),
            user_id: None,
            created_by: None,
            created_at: now,
            modified_by: None,
            modified_at: now,
        }
    }

    fn grant(redirect_uri: &str, challenge: Option<&str>) -> oauth2_grant::Model {
        let now = OffsetDateTime::now_utc();
        oauth2_grant::Model {
            code: "code".into(),
            client_id: "client-1".into(),
            user_id: "u1".into(),
            redirect_uri: redirect_uri.into(),
            scopes: "read".into(),
            code_challenge: challenge.map(String::from),
            code_challenge_method: challenge.map(|_| PKCE_METHOD_S256.to_string()),
            expires_at: now + Duration::seconds(100),
            created_at: now,
        }
    }

    fn s256(verifier: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    #[test]
    fn redirect_uri_defaults_to_first_registered() {
        let c = client(true);
        assert_eq!(resolve_redirect_uri(&c, None).unwrap(), "https://app.example/cb");
        assert_eq!(
            resolve_redirect_uri(&c, Some("https://app.example/alt")).unwrap(),
            "https://app.example/alt"
        );
        assert!(matches!(
            resolve_redirect_uri(&c, Some("https://evil.example/cb")),
            Err(AuthError::InvalidRedirectUri)
        ));
    }

    #[test]
    fn scopes_must_be_subset() {
        let c = client(true);
        assert_eq!(resolve_scopes(&c, None).unwrap().encode(), "read write");
        assert_eq!(
            resolve_scopes(&c, Some(&SpaceList::decode(""))).unwrap().encode(),
            "read write"
        );
        assert_eq!(
            resolve_scopes(&c, Some(&SpaceList::decode("write"))).unwrap().encode(),
            "write"
        );
        assert!(matches!(
            resolve_scopes(&c, Some(&SpaceList::decode("read admin"))),
            Err(AuthError::InvalidScope)
        ));
    }

    #[test]
    fn public_clients_need_s256() {
        let public = client(false);
        assert!(resolve_pkce(&public, None, None).is_err());
        assert!(resolve_pkce(&public, Some("abc"), Some("plain")).is_err());
        assert_eq!(
            resolve_pkce(&public, Some("abc"), Some("S256")).unwrap(),
            Some(Pkce {
                challenge: "abc".into(),
                method: "S256".into()
            })
        );
        assert_eq!(resolve_pkce(&client(true), None, None).unwrap(), None);
    }

    #[test]
    fn grant_checks() {
        let c = client(true);
        let now = OffsetDateTime::now_utc();
        let g = grant("https://app.example/cb", None);

        assert!(check_grant(&g, &c, Some("https://app.example/cb"), None, now).is_ok());
        assert!(check_grant(&g, &c, None, None, now).is_ok());
        assert!(matches!(
            check_grant(&g, &c, Some("https://app.example/alt"), None, now),
            Err(AuthError::InvalidRedirectUri)
        ));
        assert!(matches!(
            check_grant(&g, &c, None, None, now + Duration::seconds(101)),
            Err(AuthError::GrantExpired)
        ));

        let alt = grant("https://app.example/alt", None);
        assert!(matches!(
            check_grant(&alt, &c, None, None, now),
            Err(AuthError::InvalidRedirectUri)
        ));
    }

    #[test]
    fn grant_pkce_checks() {
        let public = client(false);
        let now = OffsetDateTime::now_utc();
        let challenge = s256("a-long-enough-code-verifier-value");
        let g = grant("https://app.example/cb", Some(&challenge));

        assert!(
            check_grant(&g, &public, None, Some("a-long-enough-code-verifier-value"), now).is_ok()
        );
        assert!(matches!(
            check_grant(&g, &public, None, Some("wrong"), now),
            Err(AuthError::ValidationFailed { field: "code_verifier", .. })
        ));
        assert!(check_grant(&g, &public, None, None, now).is_err());

        let without = grant("https://app.example/cb", None);
        assert!(matches!(
            check_grant(&without, &public, None, None, now),
            Err(AuthError::InvalidClient)
        ));
    }
}
