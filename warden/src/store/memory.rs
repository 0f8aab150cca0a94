use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use warden_core::authorization::PermissionDocument;
use warden_core::principal::{normalize_email, Principal, PrincipalId};

use super::journal::{Journal, JournalEntry};
use super::{DocumentStore, StoreError, WriteOp};

#[derive(Debug, Default)]
struct Collections {
    principals: HashMap<PrincipalId, Principal>,
    emails: HashMap<String, PrincipalId>,
    permissions: HashMap<PrincipalId, PermissionDocument>,
    seq: u64,
}

impl Collections {
    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::PutPrincipal(principal) => {
                if let Some(previous) = self.principals.get(&principal.id) {
                    if previous.email != principal.email {
                        self.emails.remove(&previous.email);
                    }
                }
                self.emails.insert(principal.email.clone(), principal.id);
                self.principals.insert(principal.id, principal);
            }
            WriteOp::PutPermissions(document) => {
                self.permissions.insert(document.principal_id, document);
            }
            WriteOp::DeletePrincipal(id) => {
                if let Some(previous) = self.principals.remove(&id) {
                    self.emails.remove(&previous.email);
                }
            }
            WriteOp::DeletePermissions(id) => {
                self.permissions.remove(&id);
            }
        }
    }
}

/// Pending state of a batch that has not been applied yet
#[derive(Default)]
struct Staged {
    principals: HashMap<PrincipalId, Option<Principal>>,
    emails: HashMap<String, Option<PrincipalId>>,
    permissions: HashMap<PrincipalId, Option<PermissionDocument>>,
}

impl Staged {
    fn principal<'a>(&'a self, state: &'a Collections, id: &PrincipalId) -> Option<&'a Principal> {
        match self.principals.get(id) {
            Some(staged) => staged.as_ref(),
            None => state.principals.get(id),
        }
    }

    fn email_owner(&self, state: &Collections, email: &str) -> Option<PrincipalId> {
        match self.emails.get(email) {
            Some(staged) => *staged,
            None => state.emails.get(email).copied(),
        }
    }

    fn permissions<'a>(
        &'a self,
        state: &'a Collections,
        id: &PrincipalId,
    ) -> Option<&'a PermissionDocument> {
        match self.permissions.get(id) {
            Some(staged) => staged.as_ref(),
            None => state.permissions.get(id),
        }
    }
}

/// Single-node store: an in-process lock over the collections plus an
/// optional write-ahead journal.
///
/// A commit that has passed validation runs to completion on its own task,
/// so dropping the caller's future cannot leave the journal and memory
/// disagreeing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<Collections>>,
    journal: Option<Arc<Journal>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a journal-backed store, replaying every committed batch
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let (journal, entries) = Journal::open(path).await?;
        let mut state = Collections::default();
        for entry in entries {
            state.seq = entry.seq;
            for op in entry.ops {
                state.apply(op);
            }
        }
        info!(
            "Restored {} principals and {} permission documents from {}",
            state.principals.len(),
            state.permissions.len(),
            journal.path().display()
        );
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            journal: Some(Arc::new(journal)),
        })
    }

    pub async fn counts(&self) -> (usize, usize) {
        let state = self.state.read().await;
        (state.principals.len(), state.permissions.len())
    }

    /// Check every operation against the current state and the operations
    /// before it, returning the operations with their new versions.
    fn resolve(state: &Collections, ops: Vec<WriteOp>) -> Result<Vec<WriteOp>, StoreError> {
        let mut staged = Staged::default();
        let mut resolved = Vec::with_capacity(ops.len());

        for op in ops {
            match op {
                WriteOp::PutPrincipal(mut principal) => {
                    principal.email = normalize_email(&principal.email);
                    let current = staged.principal(state, &principal.id);
                    match (principal.version, current) {
                        (0, Some(_)) => {
                            return Err(StoreError::UniqueViolation(format!(
                                "principal {} already exists",
                                principal.id
                            )))
                        }
                        (0, None) => {}
                        (_, None) => {
                            return Err(StoreError::NotFound(format!("principal {}", principal.id)))
                        }
                        (version, Some(current)) if current.version != version => {
                            return Err(StoreError::VersionConflict(format!(
                                "principal {}",
                                principal.id
                            )))
                        }
                        _ => {}
                    }
                    let previous_email = current.map(|p| p.email.clone());

                    if let Some(owner) = staged.email_owner(state, &principal.email) {
                        if owner != principal.id {
                            return Err(StoreError::UniqueViolation(format!(
                                "email {} is taken",
                                principal.email
                            )));
                        }
                    }

                    principal.version += 1;
                    if let Some(previous_email) = previous_email {
                        if previous_email != principal.email {
                            staged.emails.insert(previous_email, None);
                        }
                    }
                    staged
                        .emails
                        .insert(principal.email.clone(), Some(principal.id));
                    staged
                        .principals
                        .insert(principal.id, Some(principal.clone()));
                    resolved.push(WriteOp::PutPrincipal(principal));
                }
                WriteOp::PutPermissions(mut document) => {
                    let id = document.principal_id;
                    if staged.principal(state, &id).is_none() {
                        return Err(StoreError::NotFound(format!("principal {}", id)));
                    }
                    match (document.version, staged.permissions(state, &id)) {
                        (0, Some(_)) => {
                            return Err(StoreError::UniqueViolation(format!(
                                "permissions of {} already exist",
                                id
                            )))
                        }
                        (0, None) => {}
                        (_, None) => {
                            return Err(StoreError::NotFound(format!("permissions of {}", id)))
                        }
                        (version, Some(current)) if current.version != version => {
                            return Err(StoreError::VersionConflict(format!(
                                "permissions of {}",
                                id
                            )))
                        }
                        _ => {}
                    }
                    document.version += 1;
                    staged.permissions.insert(id, Some(document.clone()));
                    resolved.push(WriteOp::PutPermissions(document));
                }
                WriteOp::DeletePrincipal(id) => {
                    let email = staged
                        .principal(state, &id)
                        .map(|p| p.email.clone())
                        .ok_or_else(|| StoreError::NotFound(format!("principal {}", id)))?;
                    staged.emails.insert(email, None);
                    staged.principals.insert(id, None);
                    resolved.push(WriteOp::DeletePrincipal(id));
                }
                WriteOp::DeletePermissions(id) => {
                    staged.permissions.insert(id, None);
                    resolved.push(WriteOp::DeletePermissions(id));
                }
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError> {
        Ok(self.state.read().await.principals.get(id).cloned())
    }

    async fn principal_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .emails
            .get(&normalize_email(email))
            .and_then(|id| state.principals.get(id))
            .cloned())
    }

    async fn permissions(
        &self,
        principal_id: &PrincipalId,
    ) -> Result<Option<PermissionDocument>, StoreError> {
        Ok(self.state.read().await.permissions.get(principal_id).cloned())
    }

    async fn commit(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if ops.is_empty() {
            return Ok(());
        }

        // Waiting for the lock and validating can be abandoned; nothing has
        // been written yet.
        let mut state = self.state.clone().write_owned().await;
        let resolved = Self::resolve(&state, ops)?;
        let journal = self.journal.clone();

        tokio::spawn(async move {
            let seq = state.seq + 1;
            if let Some(journal) = journal {
                journal
                    .append(&JournalEntry {
                        seq,
                        committed_at: Utc::now(),
                        ops: resolved.clone(),
                    })
                    .await?;
            }

            debug!(
                "Committing batch {}: [{}]",
                seq,
                resolved
                    .iter()
                    .map(WriteOp::describe)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            state.seq = seq;
            for op in resolved {
                state.apply(op);
            }
            Ok::<(), StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("commit task failed: {}", e)))?
    }
}
