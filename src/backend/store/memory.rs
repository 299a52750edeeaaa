/**
 * In-memory Sync Store
 *
 * Shared in-process storage implementing the same contract as the
 * PostgreSQL store. Cloning a `MemorySyncStore` yields another client of the
 * same storage, which is how tests model several server instances against
 * one database.
 *
 * Every operation runs under one mutex and never awaits while holding it,
 * which gives the same atomicity the database gets from row locks.
 */

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::error::SyncError;
use crate::backend::store::SyncStore;
use crate::shared::{ChangeRecord, EntityStatus, EntityVersion, NewChange};

#[derive(Debug, Default)]
struct MemoryInner {
    versions: HashMap<String, EntityVersion>,
    records: Vec<ChangeRecord>,
    next_id: i64,
}

/// Sync store keeping everything in process memory
#[derive(Debug, Clone, Default)]
pub struct MemorySyncStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, SyncError> {
        self.inner
            .lock()
            .map_err(|_| SyncError::storage("in-memory store lock poisoned"))
    }

    /// Number of change rows currently stored
    pub fn record_count(&self) -> usize {
        self.lock().map(|inner| inner.records.len()).unwrap_or(0)
    }
}

#[async_trait]
impl SyncStore for MemorySyncStore {
    async fn next_version(&self, entity_type: &str) -> Result<i64, SyncError> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let row = inner
            .versions
            .entry(entity_type.to_string())
            .or_insert_with(|| EntityVersion {
                entity_type: entity_type.to_string(),
                current_version: 0,
                updated_at: now,
            });
        row.current_version += 1;
        row.updated_at = now;
        Ok(row.current_version)
    }

    async fn current_version(&self, entity_type: &str) -> Result<i64, SyncError> {
        let inner = self.lock()?;
        Ok(inner
            .versions
            .get(entity_type)
            .map(|row| row.current_version)
            .unwrap_or(0))
    }

    async fn versions(&self) -> Result<Vec<EntityVersion>, SyncError> {
        let inner = self.lock()?;
        let mut versions: Vec<EntityVersion> = inner.versions.values().cloned().collect();
        versions.sort_by(|a, b| a.entity_type.cmp(&b.entity_type));
        Ok(versions)
    }

    async fn append(&self, change: NewChange) -> Result<ChangeRecord, SyncError> {
        let mut inner = self.lock()?;
        let exists = inner
            .records
            .iter()
            .any(|r| r.entity_type == change.entity_type && r.version == change.version);
        if exists {
            return Err(SyncError::DuplicateVersion {
                entity_type: change.entity_type,
                version: change.version,
            });
        }

        inner.next_id += 1;
        let record = ChangeRecord {
            id: inner.next_id,
            entity_type: change.entity_type,
            entity_id: change.entity_id,
            version: change.version,
            payload: change.payload,
            actor_id: change.actor_id,
            created_at: Utc::now(),
        };
        inner.records.push(record.clone());
        Ok(record)
    }

    async fn since(
        &self,
        entity_type: &str,
        after_version: i64,
        limit: Option<i64>,
    ) -> Result<Vec<ChangeRecord>, SyncError> {
        let inner = self.lock()?;
        let mut records: Vec<ChangeRecord> = inner
            .records
            .iter()
            .filter(|r| r.entity_type == entity_type && r.version > after_version)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.version);
        if let Some(limit) = limit {
            records.truncate(limit.max(0) as usize);
        }
        Ok(records)
    }

    async fn status(&self) -> Result<Vec<EntityStatus>, SyncError> {
        let inner = self.lock()?;
        let day_ago = Utc::now() - Duration::hours(24);
        let mut status: Vec<EntityStatus> = inner
            .versions
            .values()
            .map(|row| {
                let rows = inner
                    .records
                    .iter()
                    .filter(|r| r.entity_type == row.entity_type);
                let (total, recent) = rows.fold((0i64, 0i64), |(total, recent), r| {
                    (total + 1, recent + i64::from(r.created_at > day_ago))
                });
                EntityStatus {
                    entity_type: row.entity_type.clone(),
                    current_version: row.current_version,
                    updated_at: row.updated_at,
                    total_changes: total,
                    changes_last_24h: recent,
                }
            })
            .collect();
        status.sort_by(|a, b| a.entity_type.cmp(&b.entity_type));
        Ok(status)
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64, SyncError> {
        let mut inner = self.lock()?;
        let before = inner.records.len();
        inner.records.retain(|r| r.created_at > cutoff);
        Ok((before - inner.records.len()) as u64)
    }
}
