use std::sync::Arc;
use tracing::{debug, instrument};

use chrono::Duration;
use warden_core::principal::Principal;

use super::registry::RefreshTokenRegistry;
use super::revocation::AccessTokenRevocationCache;
use super::signer::{Claims, SignedToken, TokenKind, TokenSigner};
use super::TokenPair;
use crate::services::error::AuthError;

/// Mints access and refresh tokens.
///
/// Access tokens are stateless. Refresh tokens are registered before they
/// are handed out, so the registry always knows every live one.
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    signer: Arc<TokenSigner>,
    registry: RefreshTokenRegistry,
    revocations: AccessTokenRevocationCache,
}

impl CredentialIssuer {
    pub fn new(
        signer: Arc<TokenSigner>,
        registry: RefreshTokenRegistry,
        revocations: AccessTokenRevocationCache,
    ) -> Self {
        Self {
            signer,
            registry,
            revocations,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn registry(&self) -> &RefreshTokenRegistry {
        &self.registry
    }

    pub fn revocations(&self) -> &AccessTokenRevocationCache {
        &self.revocations
    }

    pub fn issue_access_token(&self, principal: &Principal) -> Result<SignedToken, AuthError> {
        self.issue_access_token_with_ttl(principal, self.signer.ttl(TokenKind::Access))
    }

    pub fn issue_access_token_with_ttl(
        &self,
        principal: &Principal,
        ttl: Duration,
    ) -> Result<SignedToken, AuthError> {
        self.signer.sign(principal, TokenKind::Access, ttl)
    }

    pub async fn issue_refresh_token(&self, principal: &Principal) -> Result<SignedToken, AuthError> {
        self.issue_refresh_token_with_ttl(principal, self.signer.ttl(TokenKind::Refresh))
            .await
    }

    pub async fn issue_refresh_token_with_ttl(
        &self,
        principal: &Principal,
        ttl: Duration,
    ) -> Result<SignedToken, AuthError> {
        let token = self.signer.sign(principal, TokenKind::Refresh, ttl)?;
        self.registry.register(principal.id, &token).await?;
        debug!("Issued refresh token for {}", principal.id);
        Ok(token)
    }

    /// A new session: one access token plus one registered refresh token
    #[instrument(skip_all, fields(principal = %principal.id))]
    pub async fn issue_pair(&self, principal: &Principal) -> Result<TokenPair, AuthError> {
        let access = self.issue_access_token(principal)?;
        let refresh = self.issue_refresh_token(principal).await?;
        Ok(TokenPair::new(access, refresh))
    }

    /// Signature and expiry only; no store or cache lookup
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        self.signer.verify(token, TokenKind::Access)
    }

    /// `verify_access` plus the revocation check
    pub async fn verify_live_access(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.verify_access(token)?;
        if self.revocations.is_revoked(&claims.sub, token).await? {
            debug!("Rejected revoked access token of {}", claims.sub);
            return Err(AuthError::TokenRevoked);
        }
        Ok(claims)
    }

    pub async fn rotate(&self, refresh_token: &str) -> Result<(Principal, TokenPair), AuthError> {
        self.registry.rotate(refresh_token).await
    }

    /// Block an access token for the rest of its lifetime
    pub async fn revoke_access(&self, claims: &Claims, token: &str) -> Result<bool, AuthError> {
        self.revocations
            .revoke(&claims.sub, token, claims.expires_at())
            .await
    }
}
