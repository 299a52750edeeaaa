/**
 * Change Log
 *
 * Durable, append-only record of tracked changes with range queries,
 * an observability aggregate and time-based retention.
 *
 * `since` is a finite query, not a stream: callers continue a catch-up by
 * re-querying with the last version they saw.
 */

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::error::SyncError;
use crate::backend::store::SyncStore;
use crate::shared::{ChangeRecord, EntityStatus, NewChange, SharedError};

#[derive(Clone)]
pub struct ChangeLog {
    store: Arc<dyn SyncStore>,
}

impl ChangeLog {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Persist one change
    ///
    /// `version` must have been allocated by the version store for the same
    /// entity type. Reusing one fails with [`SyncError::DuplicateVersion`].
    pub async fn append(
        &self,
        entity_type: &str,
        entity_id: &str,
        version: i64,
        payload: serde_json::Value,
        actor_id: &str,
    ) -> Result<ChangeRecord, SyncError> {
        let change = NewChange {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            version,
            payload,
            actor_id: actor_id.to_string(),
        };

        match self.store.append(change).await {
            Ok(record) => Ok(record),
            Err(e @ SyncError::DuplicateVersion { .. }) => {
                tracing::error!(
                    entity_type,
                    version,
                    "[Sync] Change log rejected a reused version; the caller has a bug"
                );
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// All changes of `entity_type` after `after_version`, ascending
    pub async fn since(
        &self,
        entity_type: &str,
        after_version: i64,
    ) -> Result<Vec<ChangeRecord>, SyncError> {
        self.store.since(entity_type, after_version, None).await
    }

    /// Like [`ChangeLog::since`], returning at most `limit` rows
    pub async fn since_page(
        &self,
        entity_type: &str,
        after_version: i64,
        limit: i64,
    ) -> Result<Vec<ChangeRecord>, SyncError> {
        self.store.since(entity_type, after_version, Some(limit)).await
    }

    pub async fn status(&self) -> Result<Vec<EntityStatus>, SyncError> {
        self.store.status().await
    }

    /// Delete changes older than `older_than`
    ///
    /// Idempotent. A zero duration deletes every existing change. Version
    /// counters are never touched.
    pub async fn prune(&self, older_than: Duration) -> Result<u64, SyncError> {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|horizon| Utc::now().checked_sub_signed(horizon))
            .ok_or_else(|| {
                SharedError::validation("retention", format!("{:?} is out of range", older_than))
            })?;
        let deleted = self.store.prune(cutoff).await?;
        if deleted > 0 {
            tracing::info!("[Sync] Pruned {} change records older than {}", deleted, cutoff);
        }
        Ok(deleted)
    }
}
