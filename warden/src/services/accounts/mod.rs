//! Account lifecycle on top of the authorization and credential services:
//! registration with one-time code verification, login, sessions, role
//! changes and deletion.

pub mod notifier;
pub mod otp;
pub mod password;
pub mod service;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use warden_core::authorization::Role;
use warden_core::principal::{Principal, PrincipalSummary};
use warden_core::utils::secret::MaskedSecret;

use super::credentials::{Claims, TokenPair};

pub use notifier::{LogNotifier, MemoryNotifier, OtpNotifier};
pub use service::AccountService;

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: MaskedSecret,
    pub first_name: String,
    pub last_name: String,
    /// Defaults to the lowest role
    #[serde(default)]
    pub role: Option<Role>,
}

/// A principal resolved from a live access token
#[derive(Debug, Clone)]
pub struct CurrentPrincipal {
    pub principal: Principal,
    pub claims: Claims,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub principal: PrincipalSummary,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Verified(Session),
    AlreadyVerified,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoleChange {
    Changed { principal: PrincipalSummary },
    Unchanged,
}
