use std::sync::Arc;
use tracing::debug;

use chrono::{DateTime, Utc};
use warden_core::principal::PrincipalId;

use super::signer::fingerprint;
use crate::clock::Clock;
use crate::services::error::AuthError;
use crate::store::EphemeralCache;

/// Denylist for access tokens invalidated before their natural expiry.
///
/// Entries live exactly as long as the token they block would have.
#[derive(Debug, Clone)]
pub struct AccessTokenRevocationCache {
    cache: Arc<dyn EphemeralCache>,
    clock: Arc<dyn Clock>,
}

impl AccessTokenRevocationCache {
    pub fn new(cache: Arc<dyn EphemeralCache>, clock: Arc<dyn Clock>) -> Self {
        Self { cache, clock }
    }

    fn key(principal_id: &PrincipalId) -> String {
        format!("{}:revoked", principal_id)
    }

    /// Block `token` until `expires_at`. Returns false when the token has
    /// already expired and nothing needed to be stored.
    pub async fn revoke(
        &self,
        principal_id: &PrincipalId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let remaining = expires_at - self.clock.now();
        let ttl = match remaining.to_std() {
            Ok(ttl) if !ttl.is_zero() => ttl,
            _ => {
                debug!("Access token of {} already expired, not revoking", principal_id);
                return Ok(false);
            }
        };

        self.cache
            .set_add(&Self::key(principal_id), &fingerprint(token), ttl)
            .await?;
        debug!("Revoked access token of {} for {:?}", principal_id, ttl);
        Ok(true)
    }

    pub async fn is_revoked(&self, principal_id: &PrincipalId, token: &str) -> Result<bool, AuthError> {
        Ok(self
            .cache
            .set_contains(&Self::key(principal_id), &fingerprint(token))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryCache;
    use chrono::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_entry_lives_as_long_as_the_token() {
        let clock = Arc::new(ManualClock::default());
        let revocations = AccessTokenRevocationCache::new(Arc::new(MemoryCache::new()), clock.clone());
        let id = PrincipalId::new();
        let expires_at = clock.now() + Duration::seconds(300);

        assert!(revocations.revoke(&id, "token", expires_at).await.unwrap());
        assert!(revocations.is_revoked(&id, "token").await.unwrap());

        tokio::time::advance(std::time::Duration::from_secs(299)).await;
        assert!(revocations.is_revoked(&id, "token").await.unwrap());

        tokio::time::advance(std::time::Duration::from_secs(2)).await;
        assert!(!revocations.is_revoked(&id, "token").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_token_is_not_stored() {
        let clock = Arc::new(ManualClock::default());
        let revocations = AccessTokenRevocationCache::new(Arc::new(MemoryCache::new()), clock.clone());
        let id = PrincipalId::new();

        let expired = clock.now() - Duration::seconds(1);
        assert!(!revocations.revoke(&id, "token", expired).await.unwrap());
        assert!(!revocations.is_revoked(&id, "token").await.unwrap());
    }

    #[tokio::test]
    async fn test_revocation_is_per_principal_and_token() {
        let clock = Arc::new(ManualClock::default());
        let revocations = AccessTokenRevocationCache::new(Arc::new(MemoryCache::new()), clock.clone());
        let alice = PrincipalId::new();
        let bob = PrincipalId::new();
        let expires_at = clock.now() + Duration::minutes(5);

        revocations.revoke(&alice, "token-a", expires_at).await.unwrap();
        assert!(!revocations.is_revoked(&alice, "token-b").await.unwrap());
        assert!(!revocations.is_revoked(&bob, "token-a").await.unwrap());
    }
}
