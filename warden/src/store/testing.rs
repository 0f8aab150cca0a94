//! Store doubles for service tests

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use warden_core::authorization::PermissionDocument;
use warden_core::principal::{Principal, PrincipalId};

use super::{DocumentStore, MemoryStore, StoreError, WriteOp};

/// Reads go to the wrapped store; once stalled, commits never return
#[derive(Debug)]
pub struct StallingCommits {
    inner: Arc<MemoryStore>,
    stalled: AtomicBool,
}

impl StallingCommits {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            stalled: AtomicBool::new(false),
        }
    }

    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for StallingCommits {
    async fn principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError> {
        self.inner.principal(id).await
    }

    async fn principal_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        self.inner.principal_by_email(email).await
    }

    async fn permissions(
        &self,
        principal_id: &PrincipalId,
    ) -> Result<Option<PermissionDocument>, StoreError> {
        self.inner.permissions(principal_id).await
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if self.stalled.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        self.inner.commit(ops).await
    }
}
