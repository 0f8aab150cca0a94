//! Ephemeral key-value cache with per-entry expiry
//!
//! Holds revocation sets and one-time codes. Nothing in here survives a
//! restart, and every entry carries its own deadline.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use super::StoreError;

#[async_trait]
pub trait EphemeralCache: Send + Sync + Debug {
    /// Add `member` to the set at `key`; the member expires after `ttl`
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Store `value` at `key`, replacing any previous value
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Remove and return the value at `key`
    async fn take(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn remove(&self, key: &str) -> Result<bool, StoreError>;

    /// Drop every expired entry, returning how many were removed
    async fn purge_expired(&self) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
struct Entries {
    sets: HashMap<String, HashMap<String, Instant>>,
    values: HashMap<String, (String, Instant)>,
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<Entries>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EphemeralCache for MemoryCache {
    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> Result<(), StoreError> {
        let deadline = Instant::now() + ttl;
        let mut entries = self.entries.write().await;
        let set = entries.sets.entry(key.to_string()).or_default();
        let slot = set.entry(member.to_string()).or_insert(deadline);
        if *slot < deadline {
            *slot = deadline;
        }
        Ok(())
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .sets
            .get(key)
            .and_then(|set| set.get(member))
            .is_some_and(|deadline| *deadline > now))
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let deadline = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .values
            .insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .values
            .get(key)
            .filter(|(_, deadline)| *deadline > now)
            .map(|(value, _)| value.clone()))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        Ok(entries
            .values
            .remove(key)
            .filter(|(_, deadline)| *deadline > now)
            .map(|(value, _)| value))
    }

    async fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        let had_value = entries.values.remove(key).is_some();
        let had_set = entries.sets.remove(key).is_some();
        Ok(had_value || had_set)
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut removed = 0;

        entries.values.retain(|key, (_, deadline)| {
            let live = *deadline > now;
            if !live {
                debug!("Removing expired cache value: key={}", key);
                removed += 1;
            }
            live
        });

        for set in entries.sets.values_mut() {
            let before = set.len();
            set.retain(|_, deadline| *deadline > now);
            removed += before - set.len();
        }
        entries.sets.retain(|_, set| !set.is_empty());

        if removed > 0 {
            info!(
                "Purged {} expired cache entries, {} values and {} sets remaining",
                removed,
                entries.values.len(),
                entries.sets.len()
            );
        }
        Ok(removed)
    }
}
