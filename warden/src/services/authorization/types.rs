use serde::{Deserialize, Serialize};

use warden_core::authorization::{ActionOrWildcard, Resource, Scope};

use crate::services::error::{AuthError, DenyReason};

/// Result of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Turn a deny into `AuthError::Denied`
    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(AuthError::Denied(reason)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantOutcome {
    Granted,
    AlreadyHeld,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevokeOutcome {
    Revoked,
    NeverHeld,
}

/// A (resource, action, scope) triple as it arrives from a caller
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PermissionRequest {
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub scope: Option<String>,
}

impl PermissionRequest {
    pub fn new(resource: &str, action: &str, scope: Option<&str>) -> Self {
        Self {
            resource: resource.to_string(),
            action: action.to_string(),
            scope: scope.map(str::to_string),
        }
    }

    /// Parse the names; a missing scope means `own`
    pub fn parse(&self) -> Result<PermissionTarget, AuthError> {
        let resource = Resource::from_str(&self.resource)
            .ok_or_else(|| AuthError::InvalidResource(self.resource.clone()))?;
        let action = ActionOrWildcard::from_str(&self.action)
            .ok_or_else(|| AuthError::InvalidAction(self.action.clone()))?;
        let scope = match &self.scope {
            None => Scope::default(),
            Some(scope) => {
                Scope::from_str(scope).ok_or_else(|| AuthError::InvalidScope(scope.clone()))?
            }
        };
        Ok(PermissionTarget {
            resource,
            action,
            scope,
        })
    }
}

/// A parsed triple, not yet checked against the ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionTarget {
    pub resource: Resource,
    pub action: ActionOrWildcard,
    pub scope: Scope,
}
