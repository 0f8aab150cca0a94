//! Timeout wrappers around the store and the cache
//!
//! No store or cache call may block a request indefinitely; once the
//! deadline passes the call fails with `StoreError::Timeout`.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

use warden_core::authorization::PermissionDocument;
use warden_core::principal::{Principal, PrincipalId};

use super::{DocumentStore, EphemeralCache, StoreError, WriteOp};

async fn bounded<T, F>(timeout: Duration, what: &str, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            error!("{} timed out after {:?}", what, timeout);
            Err(StoreError::Timeout(timeout))
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimedStore {
    inner: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl DocumentStore for TimedStore {
    async fn principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError> {
        bounded(self.timeout, "principal lookup", self.inner.principal(id)).await
    }

    async fn principal_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        bounded(
            self.timeout,
            "principal lookup by email",
            self.inner.principal_by_email(email),
        )
        .await
    }

    async fn permissions(
        &self,
        principal_id: &PrincipalId,
    ) -> Result<Option<PermissionDocument>, StoreError> {
        bounded(
            self.timeout,
            "permission document lookup",
            self.inner.permissions(principal_id),
        )
        .await
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        bounded(self.timeout, "store commit", self.inner.commit(ops)).await
    }
}

#[derive(Debug, Clone)]
pub struct TimedCache {
    inner: Arc<dyn EphemeralCache>,
    timeout: Duration,
}

impl TimedCache {
    pub fn new(inner: Arc<dyn EphemeralCache>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl EphemeralCache for TimedCache {
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        bounded(self.timeout, "cache set add", self.inner.set_add(key, member, ttl)).await
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        bounded(
            self.timeout,
            "cache set lookup",
            self.inner.set_contains(key, member),
        )
        .await
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        bounded(self.timeout, "cache put", self.inner.put(key, value, ttl)).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        bounded(self.timeout, "cache get", self.inner.get(key)).await
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        bounded(self.timeout, "cache take", self.inner.take(key)).await
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        bounded(self.timeout, "cache remove", self.inner.remove(key)).await
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        bounded(self.timeout, "cache purge", self.inner.purge_expired()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct StalledStore;

    #[async_trait]
    impl DocumentStore for StalledStore {
        async fn principal(&self, _id: &PrincipalId) -> Result<Option<Principal>, StoreError> {
            std::future::pending().await
        }

        async fn principal_by_email(&self, _email: &str) -> Result<Option<Principal>, StoreError> {
            std::future::pending().await
        }

        async fn permissions(
            &self,
            _principal_id: &PrincipalId,
        ) -> Result<Option<PermissionDocument>, StoreError> {
            std::future::pending().await
        }

        async fn commit(&self, _ops: Vec<WriteOp>) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_times_out() {
        let store = TimedStore::new(Arc::new(StalledStore), Duration::from_millis(250));
        let result = store.principal(&PrincipalId::new()).await;
        assert_eq!(result, Err(StoreError::Timeout(Duration::from_millis(250))));
    }
}
