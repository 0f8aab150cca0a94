use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::permission::{Action, Resource, Role, Scope};
use super::policy::{PolicyTables, ResourcePermissions, ScopedActions};
use crate::principal::PrincipalId;

/// Per-principal permission document.
///
/// Permissions are keyed by resource, so there is never more than one entry
/// per resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionDocument {
    pub principal_id: PrincipalId,
    pub role: Role,
    pub permissions: ResourcePermissions,
    /// Bumped by the store on every committed write
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PermissionDocument {
    /// A new document seeded verbatim from the role defaults
    pub fn seeded(principal_id: PrincipalId, role: Role, tables: &PolicyTables) -> Self {
        let now = Utc::now();
        Self {
            principal_id,
            role,
            permissions: tables.defaults_for(role),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn allows(&self, resource: Resource, action: Action, scope: Scope) -> bool {
        self.permissions
            .get(&resource)
            .is_some_and(|actions| actions.allows(action, scope))
    }

    pub fn actions(&self, resource: Resource, scope: Scope) -> BTreeSet<Action> {
        self.permissions
            .get(&resource)
            .map(|actions| actions.get(scope).clone())
            .unwrap_or_default()
    }

    /// Entry for `resource`, created empty if the document has none yet
    pub fn entry_mut(&mut self, resource: Resource) -> &mut ScopedActions {
        self.permissions.entry(resource).or_default()
    }

    pub fn entry(&self, resource: Resource) -> Option<&ScopedActions> {
        self.permissions.get(&resource)
    }

    /// Reset permissions to the defaults of `role`
    pub fn reseed(&mut self, role: Role, tables: &PolicyTables) {
        self.role = role;
        self.permissions = tables.defaults_for(role);
        self.updated_at = Utc::now();
    }

    /// True when every entry sits inside the ceiling
    pub fn is_within_ceiling(&self, tables: &PolicyTables) -> bool {
        self.permissions.iter().all(|(resource, actions)| {
            tables
                .ceiling_for(*resource)
                .is_some_and(|ceiling| actions.is_within(ceiling))
        })
    }
}
