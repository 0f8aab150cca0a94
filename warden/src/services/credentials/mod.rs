//! Credential lifecycle: minting, rotating and revoking bearer tokens

pub mod issuer;
pub mod registry;
pub mod revocation;
pub mod signer;


use chrono::{DateTime, Utc};
use serde::Serialize;

pub use issuer::CredentialIssuer;
pub use registry::RefreshTokenRegistry;
pub use revocation::AccessTokenRevocationCache;
pub use signer::{fingerprint, Claims, SignedToken, TokenKind, TokenSigner};

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl TokenPair {
    pub fn new(access: SignedToken, refresh: SignedToken) -> Self {
        Self {
            access_expires_at: access.claims.expires_at(),
            refresh_expires_at: refresh.claims.expires_at(),
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: "Bearer",
        }
    }
}
