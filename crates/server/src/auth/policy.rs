//! Authorization decisions for directory operations.
//!
//! Every mutating directory call asks [`PolicyEngine::authorize`] first:
//!
//! - collections: anyone may view; everything else needs a superuser
//! - permissions: cataloging admin of the permission's collection
//! - users: self may view, edit and change password; a cataloging admin may
//!   view users holding permissions on collections they administer; the rest
//!   needs a superuser
//! - clients: superuser only
//!
//! Inactive actors are denied everything. Field immutability is enforced
//! separately by [`check_user_immutable`] and [`check_collection_immutable`],
//! which apply to superusers too.

use crate::auth::permissions::PermissionResolver;
use crate::entity::{collection, user};
use crate::error::AuthError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Register,
    View,
    Edit,
    ChangePassword,
    Delete,
    /// Privileged changes: activation and superuser flags
    Administer,
}

#[derive(Clone, Copy, Debug)]
pub enum Resource<'a> {
    Collection,
    Permission { collection_id: &'a str },
    /// `None` for a user that does not exist yet.
    User { target_id: Option<&'a str> },
    Client,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenyReason {
    InactiveActor,
    SuperuserRequired,
    CatalogingAdminRequired,
    NotSelf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Decide without touching storage, if possible.
///
/// Returns `None` when the answer depends on the actor's permission rows.
pub fn static_decision(actor: &user::Model, op: Operation, resource: Resource<'_>) -> Option<Decision> {
    if !actor.is_active {
        return Some(Decision::Deny(DenyReason::InactiveActor));
    }
    if actor.is_admin {
        return Some(Decision::Allow);
    }
    match (resource, op) {
        (Resource::Collection, Operation::View) => Some(Decision::Allow),
        (Resource::Collection, _) | (Resource::Client, _) => {
            Some(Decision::Deny(DenyReason::SuperuserRequired))
        }
        (Resource::Permission { .. }, _) => None,
        (
            Resource::User {
                target_id: Some(target),
            },
            Operation::View | Operation::Edit | Operation::ChangePassword,
        ) if target == actor.id => {
            Some(Decision::Allow)
        }
        (Resource::User { target_id: Some(_) }, Operation::View) => None,
        (Resource::User { .. }, Operation::Edit | Operation::ChangePassword) => {
            Some(Decision::Deny(DenyReason::NotSelf))
        }
        (Resource::User { .. }, _) => Some(Decision::Deny(DenyReason::SuperuserRequired)),
    }
}

#[derive(Clone)]
pub struct PolicyEngine {
    resolver: PermissionResolver,
}

impl PolicyEngine {
    pub fn new(resolver: PermissionResolver) -> Self {
        Self { resolver }
    }

    pub async fn authorize(
        &self,
        actor: &user::Model,
        op: Operation,
        resource: Resource<'_>,
    ) -> Result<Decision, AuthError> {
        if let Some(decision) = static_decision(actor, op, resource) {
            return Ok(decision);
        }

        let allowed = match resource {
            Resource::Permission { collection_id } => {
                self.resolver
                    .is_cataloging_admin_for(actor, collection_id)
                    .await?
            }
            Resource::User {
                target_id: Some(target),
            } => self.resolver.administers_user(actor, target).await?,
            _ => false,
        };

        Ok(if allowed {
            Decision::Allow
        } else if matches!(resource, Resource::Permission { .. }) {
            Decision::Deny(DenyReason::CatalogingAdminRequired)
        } else {
            Decision::Deny(DenyReason::NotSelf)
        })
    }

    /// Like [`authorize`](Self::authorize) but turns a denial into `InsufficientPrivileges`.
    pub async fn ensure(
        &self,
        actor: &user::Model,
        op: Operation,
        resource: Resource<'_>,
    ) -> Result<(), AuthError> {
        match self.authorize(actor, op, resource).await? {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                tracing::info!(
                    actor = %actor.id,
                    operation = ?op,
                    resource = ?resource,
                    reason = ?reason,
                    "Authorization denied"
                );
                Err(AuthError::InsufficientPrivileges)
            }
        }
    }
}

/// Reject any attempt to change a user's email.
pub fn check_user_immutable(existing: &user::Model, email: Option<&str>) -> Result<(), AuthError> {
    match email {
        Some(email) if user::normalize_email(email) != existing.email => {
            Err(AuthError::validation("email", "cannot be changed"))
        }
        _ => Ok(()),
    }
}

/// Reject any attempt to change a collection's code.
pub fn check_collection_immutable(
    existing: &collection::Model,
    code: Option<&str>,
) -> Result<(), AuthError> {
    match code {
        Some(code) if code != existing.code => {
            Err(AuthError::validation("code", "cannot be changed"))
        }
        _ => Ok(()),
    }
}
