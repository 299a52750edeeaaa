//! Sync Storage Module
//!
//! Persistence seam for the version counters and the change log.
//!
//! # Architecture
//!
//! - **`postgres`** - `PgSyncStore`, the production backend (sqlx)
//! - **`memory`** - `MemorySyncStore`, shared in-process storage used when no
//!   database is configured and throughout the tests
//!
//! Both implement [`SyncStore`]. The version store and change log only ever
//! talk to storage through this trait, and only through the atomic
//! operations it exposes: there is no application-level locking around
//! version allocation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::backend::error::SyncError;
use crate::shared::{ChangeRecord, EntityStatus, EntityVersion, NewChange};

/// PostgreSQL backend
pub mod postgres;

/// In-memory backend
pub mod memory;

pub use memory::MemorySyncStore;
pub use postgres::PgSyncStore;

/// Storage operations needed by the sync core
#[async_trait]
pub trait SyncStore: Send + Sync + 'static {
    /// Atomically increment and return the version counter of `entity_type`,
    /// creating it at 1 on first use
    async fn next_version(&self, entity_type: &str) -> Result<i64, SyncError>;

    /// Current version of `entity_type`, 0 if it has never changed
    async fn current_version(&self, entity_type: &str) -> Result<i64, SyncError>;

    /// Every version row, ordered by entity type
    async fn versions(&self) -> Result<Vec<EntityVersion>, SyncError>;

    /// Persist one change row
    ///
    /// Fails with [`SyncError::DuplicateVersion`] if `(entity_type, version)`
    /// already exists.
    async fn append(&self, change: NewChange) -> Result<ChangeRecord, SyncError>;

    /// Changes of `entity_type` with `version > after_version`, ascending,
    /// at most `limit` rows when a limit is given
    async fn since(
        &self,
        entity_type: &str,
        after_version: i64,
        limit: Option<i64>,
    ) -> Result<Vec<ChangeRecord>, SyncError>;

    /// Per entity type aggregate
    async fn status(&self) -> Result<Vec<EntityStatus>, SyncError>;

    /// Delete change rows created at or before `cutoff`, returning the count
    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64, SyncError>;
}
