//! Effective capabilities of a user on a collection.
//!
//! The decision logic is a set of pure functions over already-loaded rows;
//! [`PermissionResolver`] only loads those rows and calls them.

use crate::entity::{permission, user};
use crate::error::AuthError;
use crate::store::{PermissionEntry, PermissionRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;

/// The three capability flags of a permission row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Capabilities {
    pub registrant: bool,
    pub cataloger: bool,
    pub cataloging_admin: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        registrant: true,
        cataloger: true,
        cataloging_admin: true,
    };

    pub const NONE: Capabilities = Capabilities {
        registrant: false,
        cataloger: false,
        cataloging_admin: false,
    };

    pub fn any(&self) -> bool {
        self.registrant || self.cataloger || self.cataloging_admin
    }
}

impl From<&permission::Model> for Capabilities {
    fn from(row: &permission::Model) -> Self {
        Capabilities {
            registrant: row.registrant,
            cataloger: row.cataloger,
            cataloging_admin: row.cataloging_admin,
        }
    }
}

/// Capabilities of `user` given their row for one collection (if any).
///
/// Superusers hold every capability on every collection.
pub fn effective_capabilities(user: &user::Model, row: Option<&permission::Model>) -> Capabilities {
    if user.is_admin {
        return Capabilities::ALL;
    }
    row.map(Capabilities::from).unwrap_or(Capabilities::NONE)
}

/// Collection ids on which the given rows carry `cataloging_admin`.
pub fn administered_collections(rows: &[PermissionEntry]) -> HashSet<&str> {
    rows.iter()
        .filter(|e| e.permission.cataloging_admin)
        .map(|e| e.permission.collection_id.as_str())
        .collect()
}

/// Which of `target_rows` a viewer may see.
///
/// Superusers and the target themselves see everything; anyone else sees only
/// rows for collections on which they are a cataloging admin. The result keeps
/// the input order.
pub fn visible_permissions(
    viewer: &user::Model,
    target_id: &str,
    viewer_rows: &[PermissionEntry],
    target_rows: Vec<PermissionEntry>,
) -> Vec<PermissionEntry> {
    if viewer.is_admin || viewer.id == target_id {
        return target_rows;
    }
    let administered = administered_collections(viewer_rows);
    target_rows
        .into_iter()
        .filter(|e| administered.contains(e.permission.collection_id.as_str()))
        .collect()
}

#[derive(Clone)]
pub struct PermissionResolver {
    permissions: PermissionRepository,
}

impl PermissionResolver {
    pub fn new(permissions: PermissionRepository) -> Self {
        Self { permissions }
    }

    pub async fn capabilities(
        &self,
        user: &user::Model,
        collection_id: &str,
    ) -> Result<Capabilities, AuthError> {
        if user.is_admin {
            return Ok(Capabilities::ALL);
        }
        let row = self
            .permissions
            .find_for_pair(&user.id, collection_id)
            .await?;
        Ok(effective_capabilities(user, row.as_ref()))
    }

    pub async fn is_cataloging_admin_for(
        &self,
        user: &user::Model,
        collection_id: &str,
    ) -> Result<bool, AuthError> {
        Ok(self.capabilities(user, collection_id).await?.cataloging_admin)
    }

    /// Cataloging admin on at least one collection (or superuser).
    pub async fn is_cataloging_admin(&self, user: &user::Model) -> Result<bool, AuthError> {
        if user.is_admin {
            return Ok(true);
        }
        let rows = self.permissions.list_for_user(&user.id).await?;
        Ok(!administered_collections(&rows).is_empty())
    }

    pub async fn has_any_permission_for(
        &self,
        user: &user::Model,
        collection_id: &str,
    ) -> Result<bool, AuthError> {
        Ok(self.capabilities(user, collection_id).await?.any())
    }

    /// Whether `viewer` administers any collection `target_id` holds a permission on.
    pub async fn administers_user(
        &self,
        viewer: &user::Model,
        target_id: &str,
    ) -> Result<bool, AuthError> {
        Ok(!self
            .visible_permissions_for_viewer(viewer, target_id)
            .await?
            .is_empty())
    }

    /// Target's permissions as the viewer may see them, ordered by collection code.
    pub async fn visible_permissions_for_viewer(
        &self,
        viewer: &user::Model,
        target_id: &str,
    ) -> Result<Vec<PermissionEntry>, AuthError> {
        let target_rows = self.permissions.list_for_user(target_id).await?;
        if viewer.is_admin || viewer.id == target_id {
            return Ok(target_rows);
        }
        let viewer_rows = self.permissions.list_for_user(&viewer.id).await?;
        Ok(visible_permissions(
            viewer,
            target_id,
            &viewer_rows,
            target_rows,
        ))
    }
}
