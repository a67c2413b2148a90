//! Administrative operations on users, collections, permissions and clients.
//!
//! Every mutating call takes the acting user explicitly and is checked by the
//! [`PolicyEngine`] before anything is read or written.

mod clients;
mod collections;
mod permissions;
mod users;

pub use users::{SelfRegistration, UserRegistration};

use crate::auth::{PasswordHasher, PermissionResolver, PolicyEngine};
use crate::error::AuthError;
use crate::oauth2::SpaceList;
use crate::store::{ClientRepository, CollectionRepository, PermissionRepository, UserRepository};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Longest code accepted for new collections.
pub const MAX_COLLECTION_CODE_LENGTH: usize = 5;

#[derive(Clone)]
pub struct Directory {
    users: UserRepository,
    collections: CollectionRepository,
    permissions: PermissionRepository,
    clients: ClientRepository,
    resolver: PermissionResolver,
    policy: PolicyEngine,
    hasher: PasswordHasher,
}

impl Directory {
    pub fn new(db: Arc<DatabaseConnection>, hasher: PasswordHasher) -> Self {
        let permissions = PermissionRepository::new(db.clone());
        let resolver = PermissionResolver::new(permissions.clone());
        Self {
            users: UserRepository::new(db.clone()),
            collections: CollectionRepository::new(db.clone()),
            clients: ClientRepository::new(db),
            policy: PolicyEngine::new(resolver.clone()),
            resolver,
            permissions,
            hasher,
        }
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn collections(&self) -> &CollectionRepository {
        &self.collections
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), AuthError> {
    if value.trim().is_empty() {
        return Err(AuthError::validation(field, "must not be empty"));
    }
    Ok(())
}

/// Loose shape check: one `@` with something on both sides, no whitespace.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid || email.len() > 255 {
        return Err(AuthError::validation("email", "is not a valid address"));
    }
    Ok(())
}

/// Codes for new collections: 1 to 5 alphanumeric characters.
pub fn validate_collection_code(code: &str) -> Result<(), AuthError> {
    if code.is_empty() {
        return Err(AuthError::validation("code", "must not be empty"));
    }
    if code.chars().count() > MAX_COLLECTION_CODE_LENGTH {
        return Err(AuthError::validation(
            "code",
            format!("must be at most {MAX_COLLECTION_CODE_LENGTH} characters"),
        ));
    }
    if !code.chars().all(char::is_alphanumeric) {
        return Err(AuthError::validation("code", "must be alphanumeric"));
    }
    Ok(())
}

/// At least one URI; each absolute http(s) without a fragment.
pub fn validate_redirect_uris(uris: &SpaceList) -> Result<(), AuthError> {
    if uris.is_empty() {
        return Err(AuthError::validation(
            "redirect_uris",
            "at least one redirect URI is required",
        ));
    }
    for uri in uris.iter() {
        let parsed = url::Url::parse(uri).map_err(|_| {
            AuthError::validation("redirect_uris", format!("{uri} is not an absolute URI"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.fragment().is_some() {
            return Err(AuthError::validation(
                "redirect_uris",
                format!("{uri} must be an http(s) URI without fragment"),
            ));
        }
    }
    Ok(())
}

pub fn validate_scopes(scopes: &SpaceList) -> Result<(), AuthError> {
    if scopes.is_empty() {
        return Err(AuthError::validation(
            "default_scopes",
            "at least one scope is required",
        ));
    }
    Ok(())
}
