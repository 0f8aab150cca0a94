use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use warden_core::principal::{Principal, PrincipalId, RefreshEntry};

use super::signer::{fingerprint, SignedToken, TokenKind, TokenSigner};
use super::TokenPair;
use crate::services::error::AuthError;
use crate::store::{DocumentStore, StoreError, WriteOp};

/// The server-side record of live refresh tokens, one per session.
///
/// A refresh token is only good while its fingerprint is in the owning
/// principal's set; the signature alone is not enough.
#[derive(Debug, Clone)]
pub struct RefreshTokenRegistry {
    store: Arc<dyn DocumentStore>,
    signer: Arc<TokenSigner>,
    max_retries: u32,
    revoke_all_on_replay: bool,
}

impl RefreshTokenRegistry {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        signer: Arc<TokenSigner>,
        max_retries: u32,
        revoke_all_on_replay: bool,
    ) -> Self {
        Self {
            store,
            signer,
            max_retries: max_retries.max(1),
            revoke_all_on_replay,
        }
    }

    fn entry(token: &SignedToken) -> RefreshEntry {
        RefreshEntry {
            fingerprint: fingerprint(&token.token),
            issued_at: chrono::DateTime::from_timestamp(token.claims.iat, 0).unwrap_or_default(),
            expires_at: token.claims.expires_at(),
        }
    }

    /// Run `change` against the stored principal and commit it, retrying on
    /// concurrent updates. `change` returns `None` when it changed nothing;
    /// the principal is then only written if expired entries were pruned.
    async fn update<T, F>(&self, principal_id: PrincipalId, mut change: F) -> Result<Option<T>, AuthError>
    where
        F: FnMut(&mut Principal) -> Option<T>,
    {
        for attempt in 1..=self.max_retries {
            let mut principal = self
                .store
                .principal(&principal_id)
                .await?
                .ok_or(AuthError::PrincipalNotFound(principal_id))?;

            let pruned = principal.prune_expired_refresh_tokens(self.signer.now());
            let result = change(&mut principal);
            if result.is_none() && pruned == 0 {
                return Ok(None);
            }

            principal.touch();
            match self.store.commit(vec![WriteOp::PutPrincipal(principal)]).await {
                Ok(()) => return Ok(result),
                Err(StoreError::VersionConflict(_)) => {
                    debug!(
                        "Refresh tokens of {} changed concurrently (attempt {}/{})",
                        principal_id, attempt, self.max_retries
                    );
                }
                Err(StoreError::NotFound(_)) => return Err(AuthError::PrincipalNotFound(principal_id)),
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::StoreUnavailable(format!(
            "refresh tokens of {} kept conflicting",
            principal_id
        )))
    }

    /// Record a freshly minted refresh token
    pub async fn register(&self, principal_id: PrincipalId, token: &SignedToken) -> Result<(), AuthError> {
        let entry = Self::entry(token);
        self.update(principal_id, |principal| {
            principal.refresh_tokens.push(entry.clone());
            Some(())
        })
        .await?;
        Ok(())
    }

    pub async fn contains(&self, principal_id: &PrincipalId, token: &str) -> Result<bool, AuthError> {
        let fingerprint = fingerprint(token);
        let now = self.signer.now();
        Ok(self.store.principal(principal_id).await?.is_some_and(|p| {
            p.refresh_tokens
                .iter()
                .any(|e| e.fingerprint == fingerprint && !e.is_expired(now))
        }))
    }

    /// Exchange `old_token` for a new access and refresh pair.
    ///
    /// The old token must carry a valid signature and still be registered.
    /// A validly signed token that is no longer registered was already used
    /// or logged out; that is treated as replay.
    #[instrument(skip_all)]
    pub async fn rotate(&self, old_token: &str) -> Result<(Principal, TokenPair), AuthError> {
        let claims = self.signer.decode(old_token, TokenKind::Refresh)?;
        let principal_id = claims.sub;
        let old_fingerprint = fingerprint(old_token);

        if claims.is_expired(self.signer.now()) {
            debug!("Refresh token of {} has expired", principal_id);
            return Err(AuthError::TokenExpired);
        }

        for attempt in 1..=self.max_retries {
            let mut principal = match self.store.principal(&principal_id).await? {
                Some(principal) => principal,
                None => return Err(AuthError::LoginRequired),
            };
            principal.prune_expired_refresh_tokens(self.signer.now());

            if !principal.remove_refresh_token(&old_fingerprint) {
                return Err(self.replay_detected(principal_id).await);
            }

            let access = self.signer.access_token(&principal)?;
            let refresh = self.signer.refresh_token(&principal)?;
            principal.refresh_tokens.push(Self::entry(&refresh));
            principal.touch();

            match self
                .store
                .commit(vec![WriteOp::PutPrincipal(principal.clone())])
                .await
            {
                Ok(()) => {
                    principal.version += 1;
                    info!("Rotated refresh token of {}", principal_id);
                    return Ok((principal, TokenPair::new(access, refresh)));
                }
                Err(StoreError::VersionConflict(_)) => {
                    debug!(
                        "Rotation for {} raced another update (attempt {}/{})",
                        principal_id, attempt, self.max_retries
                    );
                }
                Err(StoreError::NotFound(_)) => return Err(AuthError::LoginRequired),
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::StoreUnavailable(format!(
            "rotation for {} kept conflicting",
            principal_id
        )))
    }

    async fn replay_detected(&self, principal_id: PrincipalId) -> AuthError {
        warn!(
            event = "refresh_token_replay",
            principal = %principal_id,
            "Refresh token presented after it was rotated or revoked"
        );
        if self.revoke_all_on_replay {
            match self.revoke_all(principal_id).await {
                Ok(count) => warn!(
                    event = "refresh_token_replay",
                    principal = %principal_id,
                    "Revoked {} remaining session(s)",
                    count
                ),
                Err(e) => warn!(
                    event = "refresh_token_replay",
                    principal = %principal_id,
                    "Could not revoke remaining sessions: {}",
                    e
                ),
            }
        }
        AuthError::ReplayDetected
    }

    /// Remove one session; returns whether it was registered
    pub async fn revoke_one(&self, principal_id: PrincipalId, token: &str) -> Result<bool, AuthError> {
        let fingerprint = fingerprint(token);
        let removed = self
            .update(principal_id, |principal| {
                principal.remove_refresh_token(&fingerprint).then_some(())
            })
            .await?;
        Ok(removed.is_some())
    }

    /// Remove every session; returns how many there were
    pub async fn revoke_all(&self, principal_id: PrincipalId) -> Result<usize, AuthError> {
        let count = self
            .update(principal_id, |principal| {
                let count = principal.refresh_tokens.len();
                principal.refresh_tokens.clear();
                (count > 0).then_some(count)
            })
            .await?
            .unwrap_or(0);
        info!("Revoked {} session(s) of {}", count, principal_id);
        Ok(count)
    }
}
