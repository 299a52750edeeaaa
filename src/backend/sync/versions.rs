/**
 * Version Store
 *
 * Allocates the per entity-type version numbers. The authoritative value
 * always comes from the store's atomic increment; this type adds a
 * read-through cache of last-known versions for cheap diagnostics reads.
 *
 * # Cache Staleness
 *
 * The cache is refreshed on every allocation and authoritative read made by
 * this process, and warmed from storage at startup. Allocations made by other
 * server instances are invisible to it until the next refresh, so
 * `cached_version` may lag. It is never used to allocate.
 */

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::error::SyncError;
use crate::backend::store::SyncStore;

#[derive(Clone)]
pub struct VersionStore {
    store: Arc<dyn SyncStore>,
    cache: Arc<RwLock<HashMap<String, i64>>>,
}

impl VersionStore {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Allocate the next version of `entity_type`
    ///
    /// Two concurrent calls for the same entity type always return two
    /// distinct, consecutive integers. On error no version may be assumed.
    pub async fn next_version(&self, entity_type: &str) -> Result<i64, SyncError> {
        let version = self.store.next_version(entity_type).await?;
        self.remember(entity_type, version).await;
        Ok(version)
    }

    /// Authoritative current version, 0 if the type has never changed
    pub async fn current_version(&self, entity_type: &str) -> Result<i64, SyncError> {
        let version = self.store.current_version(entity_type).await?;
        self.remember(entity_type, version).await;
        Ok(version)
    }

    /// Last version this process has seen for `entity_type`; may be stale
    pub async fn cached_version(&self, entity_type: &str) -> i64 {
        self.cache.read().await.get(entity_type).copied().unwrap_or(0)
    }

    /// Reload the cache from storage
    ///
    /// # Returns
    ///
    /// Number of entity types loaded
    pub async fn warm(&self) -> Result<usize, SyncError> {
        let versions = self.store.versions().await?;
        let mut cache = self.cache.write().await;
        cache.clear();
        for row in &versions {
            cache.insert(row.entity_type.clone(), row.current_version);
        }
        tracing::info!("[Sync] Version cache warmed with {} entity types", versions.len());
        Ok(versions.len())
    }

    async fn remember(&self, entity_type: &str, version: i64) {
        let mut cache = self.cache.write().await;
        let entry = cache.entry(entity_type.to_string()).or_insert(0);
        // Concurrent allocations may finish out of order; keep the highest
        if version > *entry {
            *entry = version;
        }
    }
}
