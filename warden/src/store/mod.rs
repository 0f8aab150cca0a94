//! Durable document store and ephemeral cache
//!
//! The durable store keeps principals and permission documents. Writes are
//! committed as batches: either every operation in a batch applies or none
//! does. Documents carry a version that the store bumps on every write, so
//! read-modify-write cycles detect concurrent updates and retry.

pub mod cache;
pub mod journal;
pub mod memory;
#[cfg(test)]
pub mod testing;
pub mod timed;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

use warden_core::authorization::PermissionDocument;
use warden_core::principal::{Principal, PrincipalId};

pub use cache::{EphemeralCache, MemoryCache};
pub use memory::MemoryStore;
pub use timed::{TimedCache, TimedStore};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Version conflict on {0}")]
    VersionConflict(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Journal error: {0}")]
    Journal(String),
}

/// One operation inside a committed batch.
///
/// A document with version 0 has never been stored and is inserted; the
/// insert fails if a document with the same key already exists. Any other
/// version must match the stored one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", content = "document", rename_all = "snake_case")]
pub enum WriteOp {
    PutPrincipal(Principal),
    PutPermissions(PermissionDocument),
    DeletePrincipal(PrincipalId),
    DeletePermissions(PrincipalId),
}

impl WriteOp {
    pub fn describe(&self) -> String {
        match self {
            WriteOp::PutPrincipal(p) => format!("principal {}", p.id),
            WriteOp::PutPermissions(d) => format!("permissions {}", d.principal_id),
            WriteOp::DeletePrincipal(id) => format!("delete principal {}", id),
            WriteOp::DeletePermissions(id) => format!("delete permissions {}", id),
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    async fn principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError>;

    async fn principal_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    async fn permissions(
        &self,
        principal_id: &PrincipalId,
    ) -> Result<Option<PermissionDocument>, StoreError>;

    /// Apply every operation or none of them
    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;
}
