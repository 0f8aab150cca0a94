//! Ceiling and role-default tables
//!
//! Both tables are plain data, built once at startup (either the built-in
//! tables or a validated YAML override) and shared read-only afterwards.

use anyhow::{Context, Result};
use maplit::{btreemap, btreeset};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use super::permission::{Action, Resource, Role, Scope};

/// Action sets for the two scopes of one resource
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScopedActions {
    #[serde(default)]
    pub own: BTreeSet<Action>,
    #[serde(default)]
    pub others: BTreeSet<Action>,
}

impl ScopedActions {
    pub fn new(own: BTreeSet<Action>, others: BTreeSet<Action>) -> Self {
        Self { own, others }
    }

    pub fn get(&self, scope: Scope) -> &BTreeSet<Action> {
        match scope {
            Scope::Own => &self.own,
            Scope::Others => &self.others,
        }
    }

    pub fn get_mut(&mut self, scope: Scope) -> &mut BTreeSet<Action> {
        match scope {
            Scope::Own => &mut self.own,
            Scope::Others => &mut self.others,
        }
    }

    pub fn allows(&self, action: Action, scope: Scope) -> bool {
        self.get(scope).contains(&action)
    }

    /// True when both scopes are subsets of `ceiling`
    pub fn is_within(&self, ceiling: &ScopedActions) -> bool {
        self.own.is_subset(&ceiling.own) && self.others.is_subset(&ceiling.others)
    }
}

pub type ResourcePermissions = BTreeMap<Resource, ScopedActions>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Role '{0}' has no default permissions")]
    MissingRoleDefaults(Role),

    #[error("Default permissions of role '{role}' reference resource '{resource}' which has no ceiling entry")]
    DefaultsWithoutCeiling { role: Role, resource: Resource },

    #[error("Default permissions of role '{role}' exceed the ceiling for resource '{resource}'")]
    DefaultsExceedCeiling { role: Role, resource: Resource },
}

/// The capability ceiling plus the role defaults table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyTables {
    ceiling: ResourcePermissions,
    defaults: BTreeMap<Role, ResourcePermissions>,
}

static BUILTIN: Lazy<PolicyTables> = Lazy::new(|| {
    let read_only = || ScopedActions::new(btreeset! {Action::Read}, btreeset! {Action::Read});

    PolicyTables {
        ceiling: btreemap! {
            Resource::Announcements => ScopedActions::new(
                btreeset! {Action::Read, Action::Delete, Action::Create},
                btreeset! {Action::Read, Action::Delete},
            ),
            Resource::Users => ScopedActions::new(
                btreeset! {Action::Read, Action::Update, Action::Delete},
                btreeset! {Action::Read, Action::Update, Action::Delete},
            ),
            Resource::CourseMaterials => ScopedActions::new(
                btreeset! {Action::Read, Action::Delete, Action::Create},
                btreeset! {Action::Read, Action::Delete},
            ),
        },
        defaults: btreemap! {
            Role::Student => btreemap! {
                Resource::Announcements => read_only(),
                Resource::Users => read_only(),
                Resource::CourseMaterials => read_only(),
            },
            Role::Admin => btreemap! {
                Resource::Announcements => ScopedActions::new(
                    btreeset! {Action::Read, Action::Delete, Action::Create},
                    btreeset! {Action::Read},
                ),
                Resource::Users => ScopedActions::new(
                    btreeset! {Action::Read, Action::Update, Action::Delete},
                    btreeset! {Action::Read},
                ),
                Resource::CourseMaterials => read_only(),
            },
            Role::SuperAdmin => btreemap! {
                Resource::Announcements => ScopedActions::new(
                    btreeset! {Action::Read, Action::Delete, Action::Create},
                    btreeset! {Action::Read, Action::Delete},
                ),
                Resource::Users => ScopedActions::new(
                    btreeset! {Action::Read, Action::Update, Action::Delete},
                    btreeset! {Action::Read, Action::Update, Action::Delete},
                ),
                Resource::CourseMaterials => ScopedActions::new(
                    btreeset! {Action::Read, Action::Delete, Action::Create},
                    btreeset! {Action::Read, Action::Delete},
                ),
            },
        },
    }
});

impl Default for PolicyTables {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PolicyTables {
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    pub fn new(
        ceiling: ResourcePermissions,
        defaults: BTreeMap<Role, ResourcePermissions>,
    ) -> Result<Self, PolicyError> {
        let tables = Self { ceiling, defaults };
        tables.validate()?;
        Ok(tables)
    }

    /// Load tables from a YAML file, falling back to the built-in tables
    /// when the file does not exist.
    pub async fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            warn!("Policy file not found at {}, using built-in tables", path);
            return Ok(Self::builtin());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .context("Failed to read policy file")?;

        let tables: PolicyTables =
            serde_norway::from_str(&content).context("Failed to parse policy file")?;
        tables.validate().context("Invalid policy file")?;

        info!(
            "Loaded policy from {} with {} resources and {} roles",
            path,
            tables.ceiling.len(),
            tables.defaults.len()
        );
        Ok(tables)
    }

    /// Every role needs defaults, and every default must sit inside the ceiling.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for role in Role::all() {
            let defaults = self
                .defaults
                .get(&role)
                .ok_or(PolicyError::MissingRoleDefaults(role))?;

            for (resource, actions) in defaults {
                let ceiling = self
                    .ceiling
                    .get(resource)
                    .ok_or(PolicyError::DefaultsWithoutCeiling {
                        role,
                        resource: *resource,
                    })?;
                if !actions.is_within(ceiling) {
                    return Err(PolicyError::DefaultsExceedCeiling {
                        role,
                        resource: *resource,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn ceiling_for(&self, resource: Resource) -> Option<&ScopedActions> {
        self.ceiling.get(&resource)
    }

    pub fn ceiling(&self) -> &ResourcePermissions {
        &self.ceiling
    }

    /// A fresh copy of the defaults for `role`
    pub fn defaults_for(&self, role: Role) -> ResourcePermissions {
        self.defaults.get(&role).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_are_valid() {
        assert_eq!(PolicyTables::builtin().validate(), Ok(()));
    }

    #[test]
    fn test_notifications_has_no_ceiling() {
        let tables = PolicyTables::builtin();
        assert!(tables.ceiling_for(Resource::Notifications).is_none());
        assert!(tables.ceiling_for(Resource::Announcements).is_some());
    }

    #[test]
    fn test_student_defaults_are_read_only() {
        let defaults = PolicyTables::builtin().defaults_for(Role::Student);
        assert_eq!(defaults.len(), 3);
        for actions in defaults.values() {
            assert_eq!(actions.own, btreeset! {Action::Read});
            assert_eq!(actions.others, btreeset! {Action::Read});
        }
    }

    #[test]
    fn test_defaults_exceeding_ceiling_are_rejected() {
        let ceiling = btreemap! {
            Resource::Users => ScopedActions::new(btreeset! {Action::Read}, btreeset! {}),
        };
        let too_much = btreemap! {
            Resource::Users => ScopedActions::new(btreeset! {Action::Read, Action::Delete}, btreeset! {}),
        };
        let defaults = btreemap! {
            Role::Student => btreemap! {},
            Role::Admin => too_much,
            Role::SuperAdmin => btreemap! {},
        };

        assert_eq!(
            PolicyTables::new(ceiling, defaults),
            Err(PolicyError::DefaultsExceedCeiling {
                role: Role::Admin,
                resource: Resource::Users
            })
        );
    }

    #[test]
    fn test_missing_role_defaults_are_rejected() {
        let defaults = btreemap! {
            Role::Student => btreemap! {},
        };
        assert_eq!(
            PolicyTables::new(btreemap! {}, defaults),
            Err(PolicyError::MissingRoleDefaults(Role::Admin))
        );
    }

    #[tokio::test]
    async fn test_load_policy_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        let yaml = r#"
ceiling:
  announcements:
    own: [read, create]
    others: [read]
defaults:
  student:
    announcements:
      own: [read]
      others: [read]
  admin:
    announcements:
      own: [read, create]
  super_admin:
    announcements:
      own: [read, create]
      others: [read]
"#;
        tokio::fs::write(&path, yaml).await.unwrap();

        let tables = PolicyTables::load(path.to_str().unwrap()).await.unwrap();
        assert!(tables.ceiling_for(Resource::Users).is_none());
        assert_eq!(
            tables.defaults_for(Role::Admin)[&Resource::Announcements].others,
            btreeset! {}
        );
    }

    #[tokio::test]
    async fn test_missing_policy_file_falls_back_to_builtin() {
        let tables = PolicyTables::load("does/not/exist.yaml").await.unwrap();
        assert_eq!(tables, PolicyTables::builtin());
    }
}
