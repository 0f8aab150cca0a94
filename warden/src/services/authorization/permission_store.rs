use std::sync::Arc;
use tracing::{debug, info, warn};

use warden_core::authorization::{PermissionDocument, PolicyTables, Role};
use warden_core::principal::{Principal, PrincipalId};

use crate::services::error::AuthError;
use crate::store::{DocumentStore, StoreError, WriteOp};

/// Per-principal permission documents on top of the durable store
#[derive(Debug, Clone)]
pub struct PermissionStore {
    store: Arc<dyn DocumentStore>,
    tables: Arc<PolicyTables>,
    max_retries: u32,
}

impl PermissionStore {
    pub fn new(store: Arc<dyn DocumentStore>, tables: Arc<PolicyTables>, max_retries: u32) -> Self {
        Self {
            store,
            tables,
            max_retries: max_retries.max(1),
        }
    }

    pub fn tables(&self) -> &PolicyTables {
        &self.tables
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// A role-seeded document that has not been stored yet
    pub fn seed(&self, principal_id: PrincipalId, role: Role) -> PermissionDocument {
        PermissionDocument::seeded(principal_id, role, &self.tables)
    }

    /// Load the document, creating it from the role defaults if missing.
    ///
    /// Concurrent first accesses race on the insert; the loser sees a unique
    /// violation and reads the winner's document.
    pub async fn get_or_create(
        &self,
        principal_id: PrincipalId,
        role: Role,
    ) -> Result<PermissionDocument, AuthError> {
        for _ in 0..self.max_retries {
            if let Some(document) = self.store.permissions(&principal_id).await? {
                return Ok(document);
            }

            let mut document = self.seed(principal_id, role);
            match self
                .store
                .commit(vec![WriteOp::PutPermissions(document.clone())])
                .await
            {
                Ok(()) => {
                    document.version += 1;
                    info!(
                        "Created permission document for {} from '{}' defaults",
                        principal_id, role
                    );
                    return Ok(document);
                }
                Err(StoreError::UniqueViolation(_)) => {
                    debug!(
                        "Permission document for {} was created concurrently, reloading",
                        principal_id
                    );
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(AuthError::PrincipalNotFound(principal_id));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::StoreUnavailable(format!(
            "could not materialize permissions of {}",
            principal_id
        )))
    }

    /// Write back a document read earlier; fails with a version conflict if
    /// it changed in between.
    pub async fn save(&self, document: &PermissionDocument) -> Result<u64, StoreError> {
        self.store
            .commit(vec![WriteOp::PutPermissions(document.clone())])
            .await?;
        Ok(document.version + 1)
    }

    /// Change the role of a principal and reseed its document, in one batch
    pub async fn update_role(
        &self,
        principal_id: PrincipalId,
        new_role: Role,
    ) -> Result<(Principal, PermissionDocument), AuthError> {
        for attempt in 1..=self.max_retries {
            let mut principal = self
                .store
                .principal(&principal_id)
                .await?
                .ok_or(AuthError::PrincipalNotFound(principal_id))?;

            let mut document = match self.store.permissions(&principal_id).await? {
                Some(document) => document,
                None => self.seed(principal_id, principal.role),
            };

            principal.role = new_role;
            principal.touch();
            document.reseed(new_role, &self.tables);

            match self
                .store
                .commit(vec![
                    WriteOp::PutPrincipal(principal.clone()),
                    WriteOp::PutPermissions(document.clone()),
                ])
                .await
            {
                Ok(()) => {
                    principal.version += 1;
                    document.version += 1;
                    return Ok((principal, document));
                }
                Err(StoreError::VersionConflict(what)) | Err(StoreError::UniqueViolation(what)) => {
                    warn!(
                        "Role change of {} conflicted on {} (attempt {}/{})",
                        principal_id, what, attempt, self.max_retries
                    );
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(AuthError::PrincipalNotFound(principal_id));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AuthError::StoreUnavailable(format!(
            "role change of {} kept conflicting",
            principal_id
        )))
    }
}
