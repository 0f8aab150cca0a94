use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use warden_core::authorization::{
    Action, ActionOrWildcard, PermissionDocument, PolicyTables, Resource, Role, Scope,
    ScopedActions,
};
use warden_core::principal::{Principal, PrincipalId};

use super::permission_store::PermissionStore;
use super::types::{Decision, GrantOutcome, PermissionTarget, RevokeOutcome};
use crate::services::error::{AuthError, DenyReason};
use crate::store::{DocumentStore, StoreError};

/// Decides whether a principal may perform an action, and manages the
/// grants that change the answer.
#[derive(Debug, Clone)]
pub struct AuthorizationEngine {
    permissions: PermissionStore,
    store: Arc<dyn DocumentStore>,
    floor_rule: bool,
}

enum Change {
    Grant,
    Revoke,
}

impl AuthorizationEngine {
    pub fn new(permissions: PermissionStore, store: Arc<dyn DocumentStore>, floor_rule: bool) -> Self {
        Self {
            permissions,
            store,
            floor_rule,
        }
    }

    pub fn tables(&self) -> &PolicyTables {
        self.permissions.tables()
    }

    pub fn permission_store(&self) -> &PermissionStore {
        &self.permissions
    }

    fn ceiling(&self, resource: Resource) -> Result<&ScopedActions, AuthError> {
        self.tables()
            .ceiling_for(resource)
            .ok_or_else(|| AuthError::InvalidResource(resource.to_string()))
    }

    /// Validate a triple for `check`: known resource, concrete action, and an
    /// (action, scope) pair that the ceiling allows at all.
    pub fn validate(&self, target: &PermissionTarget) -> Result<Action, AuthError> {
        let ceiling = self.ceiling(target.resource)?;
        let action = match target.action {
            ActionOrWildcard::Action(action) => action,
            ActionOrWildcard::Wildcard => return Err(AuthError::InvalidAction("*".to_string())),
        };
        if !ceiling.allows(action, target.scope) {
            return Err(AuthError::CeilingViolation {
                resource: target.resource,
                action,
                scope: target.scope,
            });
        }
        Ok(action)
    }

    /// The action set a grant or revoke works on: a single action, or the
    /// whole ceiling for the wildcard.
    fn validate_change(&self, target: &PermissionTarget) -> Result<BTreeSet<Action>, AuthError> {
        let ceiling = self.ceiling(target.resource)?;
        match target.action {
            ActionOrWildcard::Wildcard => Ok(ceiling.get(target.scope).clone()),
            ActionOrWildcard::Action(action) => {
                if !ceiling.allows(action, target.scope) {
                    return Err(AuthError::CeilingViolation {
                        resource: target.resource,
                        action,
                        scope: target.scope,
                    });
                }
                Ok(BTreeSet::from([action]))
            }
        }
    }

    /// Decide whether `principal` may perform `target`.
    ///
    /// Input errors come back as `Err`, denials as `Ok(Decision::Deny)`. A
    /// store failure is an error, never an allow.
    #[instrument(skip(self, principal), fields(principal = %principal.id, role = %principal.role))]
    pub async fn check(
        &self,
        principal: &Principal,
        target: &PermissionTarget,
    ) -> Result<Decision, AuthError> {
        let action = self.validate(target)?;

        if !principal.is_verified {
            debug!("Denied {} on {}: unverified", action, target.resource);
            return Ok(Decision::Deny(DenyReason::Unverified));
        }

        if self.floor_rule && principal.role.is_lowest() && action != Action::Read {
            debug!("Denied {} on {}: floor rule", action, target.resource);
            return Ok(Decision::Deny(DenyReason::FloorRule));
        }

        let document = self
            .permissions
            .get_or_create(principal.id, principal.role)
            .await
            .inspect_err(|e| error!("Permission check failed closed: {}", e))?;

        if document.allows(target.resource, action, target.scope) {
            debug!("Allowed {} on {} ({})", action, target.resource, target.scope);
            Ok(Decision::Allow)
        } else {
            debug!("Denied {} on {} ({}): not granted", action, target.resource, target.scope);
            Ok(Decision::Deny(DenyReason::NotGranted))
        }
    }

    /// Convenience for callers that only continue on allow
    pub async fn require(
        &self,
        principal: &Principal,
        resource: Resource,
        action: Action,
        scope: Scope,
    ) -> Result<(), AuthError> {
        let target = PermissionTarget {
            resource,
            action: action.into(),
            scope,
        };
        self.check(principal, &target).await?.into_result()
    }

    fn require_super_admin(acting: &Principal) -> Result<(), AuthError> {
        if acting.role != Role::SuperAdmin || !acting.is_verified {
            warn!(
                "{} ({}) tried to change permissions",
                acting.id, acting.role
            );
            return Err(AuthError::Forbidden(
                "only a verified super_admin may change permissions".to_string(),
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, acting), fields(acting = %acting.id))]
    pub async fn grant(
        &self,
        acting: &Principal,
        target_id: PrincipalId,
        target: &PermissionTarget,
    ) -> Result<GrantOutcome, AuthError> {
        Self::require_super_admin(acting)?;
        let actions = self.validate_change(target)?;
        let changed = self
            .apply_change(target_id, target, &actions, Change::Grant)
            .await?;

        let outcome = if changed {
            GrantOutcome::Granted
        } else {
            GrantOutcome::AlreadyHeld
        };
        info!(
            "Grant {} on {} ({}) to {}: {:?}",
            target.action, target.resource, target.scope, target_id, outcome
        );
        Ok(outcome)
    }

    #[instrument(skip(self, acting), fields(acting = %acting.id))]
    pub async fn revoke(
        &self,
        acting: &Principal,
        target_id: PrincipalId,
        target: &PermissionTarget,
    ) -> Result<RevokeOutcome, AuthError> {
        Self::require_super_admin(acting)?;
        let actions = self.validate_change(target)?;
        let changed = self
            .apply_change(target_id, target, &actions, Change::Revoke)
            .await?;

        let outcome = if changed {
            RevokeOutcome::Revoked
        } else {
            RevokeOutcome::NeverHeld
        };
        info!(
            "Revoke {} on {} ({}) from {}: {:?}",
            target.action, target.resource, target.scope, target_id, outcome
        );
        Ok(outcome)
    }

    /// Read-modify-write of the target's document with optimistic retry.
    /// Returns whether anything changed; nothing is written otherwise.
    async fn apply_change(
        &self,
        target_id: PrincipalId,
        target: &PermissionTarget,
        actions: &BTreeSet<Action>,
        change: Change,
    ) -> Result<bool, AuthError> {
        let max_retries = self.permissions.max_retries();
        for attempt in 1..=max_retries {
            let principal = self
                .store
                .principal(&target_id)
                .await?
                .ok_or(AuthError::PrincipalNotFound(target_id))?;
            let mut document = self
                .permissions
                .get_or_create(principal.id, principal.role)
                .await?;

            if !mutate(&mut document, target, actions, &change) {
                return Ok(false);
            }

            match self.permissions.save(&document).await {
                Ok(_) => return Ok(true),
                Err(StoreError::VersionConflict(_)) => {
                    debug!(
                        "Permission document of {} changed concurrently (attempt {}/{})",
                        target_id, attempt, max_retries
                    );
                }
                Err(StoreError::NotFound(_)) => return Err(AuthError::PrincipalNotFound(target_id)),
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::StoreUnavailable(format!(
            "permission change for {} kept conflicting",
            target_id
        )))
    }
}

fn mutate(
    document: &mut PermissionDocument,
    target: &PermissionTarget,
    actions: &BTreeSet<Action>,
    change: &Change,
) -> bool {
    let wildcard = target.action == ActionOrWildcard::Wildcard;

    if let Change::Revoke = change {
        // Revoking from a resource the document has no entry for is a no-op
        if document.entry(target.resource).is_none() {
            return false;
        }
    }

    let set = document.entry_mut(target.resource).get_mut(target.scope);
    let changed = match (change, wildcard) {
        (Change::Grant, true) => {
            if set == actions {
                false
            } else {
                *set = actions.clone();
                true
            }
        }
        (Change::Revoke, true) => {
            if set.is_empty() {
                false
            } else {
                set.clear();
                true
            }
        }
        (Change::Grant, false) => actions.iter().fold(false, |acc, a| set.insert(*a) || acc),
        (Change::Revoke, false) => actions.iter().fold(false, |acc, a| set.remove(a) || acc),
    };

    if changed {
        document.updated_at = chrono::Utc::now();
    }
    changed
}
