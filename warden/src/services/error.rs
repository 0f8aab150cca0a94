use serde::Serialize;
use thiserror::Error;

use warden_core::authorization::{Action, Resource, Scope};
use warden_core::principal::PrincipalId;

use crate::store::StoreError;

/// Why `check` said no
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The principal has not verified its account yet
    Unverified,
    /// Lowest role asking for anything but read
    FloorRule,
    /// The permission document does not hold the action
    NotGranted,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            DenyReason::Unverified => "account is not verified",
            DenyReason::FloorRule => "role may only read",
            DenyReason::NotGranted => "permission not granted",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Input,
    Forbidden,
    Denied,
    Unauthenticated,
    Conflict,
    NotFound,
    Unavailable,
    Internal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("'{action}' on '{resource}' ({scope}) is outside the capability ceiling")]
    CeilingViolation {
        resource: Resource,
        action: Action,
        scope: Scope,
    },

    #[error("Malformed token")]
    MalformedToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Denied: {0}")]
    Denied(DenyReason),

    #[error("Login required")]
    ReplayDetected,

    #[error("Login required")]
    LoginRequired,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token revoked")]
    TokenRevoked,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is not verified")]
    AccountNotVerified,

    #[error("Principal not found: {0}")]
    PrincipalNotFound(PrincipalId),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Invalid or expired one-time code")]
    InvalidOtp,

    #[error("Password does not meet the policy: {0}")]
    WeakPassword(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidResource(_)
            | AuthError::InvalidAction(_)
            | AuthError::InvalidScope(_)
            | AuthError::CeilingViolation { .. }
            | AuthError::MalformedToken
            | AuthError::InvalidOtp
            | AuthError::WeakPassword(_)
            | AuthError::InvalidEmail(_) => ErrorKind::Input,
            AuthError::Forbidden(_) => ErrorKind::Forbidden,
            AuthError::Denied(_) => ErrorKind::Denied,
            AuthError::ReplayDetected
            | AuthError::LoginRequired
            | AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::InvalidCredentials
            | AuthError::AccountNotVerified => ErrorKind::Unauthenticated,
            AuthError::EmailTaken(_) => ErrorKind::Conflict,
            AuthError::PrincipalNotFound(_) => ErrorKind::NotFound,
            AuthError::StoreUnavailable(_) => ErrorKind::Unavailable,
            AuthError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::StoreUnavailable(_))
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Timeout(_)
            | StoreError::Unavailable(_)
            | StoreError::Journal(_)
            | StoreError::VersionConflict(_) => AuthError::StoreUnavailable(e.to_string()),
            StoreError::UniqueViolation(_) | StoreError::NotFound(_) => {
                AuthError::Internal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_store_timeouts_are_retryable() {
        let err: AuthError = StoreError::Timeout(Duration::from_secs(2)).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_replay_reads_as_login_required() {
        assert_eq!(AuthError::ReplayDetected.to_string(), "Login required");
        assert_eq!(AuthError::ReplayDetected.kind(), ErrorKind::Unauthenticated);
        assert!(!AuthError::ReplayDetected.is_retryable());
    }

    #[test]
    fn test_input_errors_are_not_denials() {
        assert_eq!(
            AuthError::InvalidResource("notifications".into()).kind(),
            ErrorKind::Input
        );
        assert_eq!(
            AuthError::Denied(DenyReason::NotGranted).kind(),
            ErrorKind::Denied
        );
    }
}
