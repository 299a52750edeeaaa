/**
 * Change Tracker
 *
 * The single public write path of the sync subsystem. CRUD collaborators
 * never touch the version counters or the change log directly.
 *
 * # Failure Semantics
 *
 * Version allocation and the log append are two separate storage
 * operations. If the append fails the allocated version stays consumed: the
 * log may have a gap, but no version is ever handed out twice. Callers must
 * treat a failure as "notification may be lost, domain write already
 * committed" and never retry the domain write.
 */

use std::sync::Arc;

use crate::backend::error::SyncError;
use crate::backend::store::SyncStore;
use crate::backend::sync::change_log::ChangeLog;
use crate::backend::sync::redact::redact_sensitive;
use crate::backend::sync::versions::VersionStore;
use crate::shared::change::validate_entity_type;
use crate::shared::{CatchUp, ChangeRecord};

#[derive(Clone)]
pub struct ChangeTracker {
    versions: VersionStore,
    log: ChangeLog,
}

impl ChangeTracker {
    pub fn new(versions: VersionStore, log: ChangeLog) -> Self {
        Self { versions, log }
    }

    /// Build a tracker with its version store and change log over `store`
    pub fn from_store(store: Arc<dyn SyncStore>) -> Self {
        Self::new(VersionStore::new(store.clone()), ChangeLog::new(store))
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn log(&self) -> &ChangeLog {
        &self.log
    }

    /// Record a change and return its version
    ///
    /// # Arguments
    ///
    /// * `entity_type` - Entity type of the changed record
    /// * `entity_id` - Domain identifier of the changed record
    /// * `payload` - Mutated fields; sensitive keys are stripped before writing
    /// * `actor_id` - Principal that caused the change
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed entity type, `Storage` when allocation
    /// or append fails, `DuplicateVersion` if storage rejects the version.
    pub async fn track_change(
        &self,
        entity_type: &str,
        entity_id: &str,
        payload: &serde_json::Value,
        actor_id: &str,
    ) -> Result<i64, SyncError> {
        self.track_change_record(entity_type, entity_id, payload, actor_id)
            .await
            .map(|record| record.version)
    }

    /// Same as [`ChangeTracker::track_change`], returning the stored row
    pub async fn track_change_record(
        &self,
        entity_type: &str,
        entity_id: &str,
        payload: &serde_json::Value,
        actor_id: &str,
    ) -> Result<ChangeRecord, SyncError> {
        validate_entity_type(entity_type)?;

        let version = self.versions.next_version(entity_type).await?;
        let redacted = redact_sensitive(payload);

        match self
            .log
            .append(entity_type, entity_id, version, redacted, actor_id)
            .await
        {
            Ok(record) => {
                tracing::debug!(
                    entity_type,
                    entity_id,
                    version,
                    "[Sync] Change tracked"
                );
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(
                    entity_type,
                    entity_id,
                    version,
                    "[Sync] Version consumed but change not logged: {}",
                    e
                );
                Err(e)
            }
        }
    }

    /// Catch-up query: changes after `after_version` plus the current version
    ///
    /// The current version is read before the changes so that a client
    /// re-querying from `current_version` never skips a change.
    pub async fn changes_since(
        &self,
        entity_type: &str,
        after_version: i64,
        limit: Option<i64>,
    ) -> Result<CatchUp, SyncError> {
        validate_entity_type(entity_type)?;

        let current_version = self.versions.current_version(entity_type).await?;
        let changes = match limit {
            Some(limit) => self.log.since_page(entity_type, after_version, limit).await?,
            None => self.log.since(entity_type, after_version).await?,
        };

        Ok(CatchUp {
            changes,
            current_version,
        })
    }
}
