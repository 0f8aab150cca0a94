use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::authorization::Role;
use crate::utils::secret::MaskedSecret;

/// Stable identifier of a principal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct PrincipalId(Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for PrincipalId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// One live session: the fingerprint of a registered refresh token.
///
/// The raw token is never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshEntry {
    pub fingerprint: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// An account that can authenticate and be authorized
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub password_hash: MaskedSecret,
    pub is_verified: bool,
    #[serde(default)]
    pub refresh_tokens: Vec<RefreshEntry>,
    /// Bumped by the store on every committed write
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    pub fn new(
        email: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
        password_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PrincipalId::new(),
            email: normalize_email(email),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            role,
            password_hash: MaskedSecret::new(password_hash),
            is_verified: false,
            refresh_tokens: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }

    pub fn has_refresh_token(&self, fingerprint: &str) -> bool {
        self.refresh_tokens
            .iter()
            .any(|entry| entry.fingerprint == fingerprint)
    }

    /// Drop refresh entries whose tokens have expired on their own
    pub fn prune_expired_refresh_tokens(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|entry| !entry.is_expired(now));
        before - self.refresh_tokens.len()
    }

    pub fn remove_refresh_token(&mut self, fingerprint: &str) -> bool {
        let before = self.refresh_tokens.len();
        self.refresh_tokens
            .retain(|entry| entry.fingerprint != fingerprint);
        before != self.refresh_tokens.len()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Emails are compared case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// What callers get to see of a principal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrincipalSummary {
    pub id: PrincipalId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_verified: bool,
    pub active_sessions: usize,
}

impl From<&Principal> for PrincipalSummary {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id,
            email: principal.email.clone(),
            first_name: principal.first_name.clone(),
            last_name: principal.last_name.clone(),
            role: principal.role,
            is_verified: principal.is_verified,
            active_sessions: principal.refresh_tokens.len(),
        }
    }
}
