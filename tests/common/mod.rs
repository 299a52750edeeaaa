//! Common test utilities and helpers
//!
//! - Application fixtures over the in-memory store
//! - Connection helpers for the registry
//! - A store wrapper that fails appends on demand
//! - PostgreSQL pool for the `#[ignore]`d database tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use classroom_sync::backend::error::SyncError;
use classroom_sync::backend::realtime::connection::{outbound_channel, OutboundReceiver};
use classroom_sync::backend::realtime::{ConnectionRegistry, Outbound};
use classroom_sync::backend::server::{build_state, AppState};
use classroom_sync::backend::store::{MemorySyncStore, SyncStore};
use classroom_sync::backend::sync::ResolverRegistry;
use classroom_sync::shared::{
    ChangeRecord, EntityStatus, EntityVersion, NewChange, Role, ServerMessage, SyncConfig,
};

pub const TEST_SECRET: &str = "integration-test-secret";

pub fn test_config() -> SyncConfig {
    SyncConfig::builder()
        .jwt_secret(TEST_SECRET)
        .catch_up_limit(50)
        .build()
        .expect("test config is valid")
}

/// Application state over a fresh in-memory store
pub async fn memory_state(resolvers: ResolverRegistry) -> AppState {
    build_state(
        test_config(),
        Arc::new(MemorySyncStore::new()),
        resolvers,
        None,
    )
    .await
}

/// Register `principal_id` and swallow its `connected` acknowledgment
pub async fn connect(
    registry: &ConnectionRegistry,
    principal_id: &str,
    role: Role,
) -> OutboundReceiver {
    let (tx, mut rx) = outbound_channel();
    registry.register(principal_id, role, tx).await;
    match rx.recv().await {
        Some(Outbound::Message(ServerMessage::Connected { .. })) => rx,
        other => panic!("expected connected ack, got {:?}", other),
    }
}

/// Subscribe the principal's current connection to `channel`
pub async fn subscribe(registry: &ConnectionRegistry, principal_id: &str, channel: &str) {
    let connection = registry
        .connection(principal_id)
        .await
        .expect("principal has no registered connection");
    registry
        .subscribe(principal_id, connection.id, channel)
        .await
        .expect("subscribe failed");
}

/// Next queued item, failing the test if none arrives promptly
pub async fn next_outbound(rx: &mut OutboundReceiver) -> Outbound {
    tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for an outbound message")
        .expect("outbound queue closed")
}

/// Store wrapper whose appends fail while `fail_appends` is set
#[derive(Clone)]
pub struct FlakyStore {
    pub inner: MemorySyncStore,
    pub fail_appends: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemorySyncStore::new(),
            fail_appends: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_appends.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SyncStore for FlakyStore {
    async fn next_version(&self, entity_type: &str) -> Result<i64, SyncError> {
        self.inner.next_version(entity_type).await
    }

    async fn current_version(&self, entity_type: &str) -> Result<i64, SyncError> {
        self.inner.current_version(entity_type).await
    }

    async fn versions(&self) -> Result<Vec<EntityVersion>, SyncError> {
        self.inner.versions().await
    }

    async fn append(&self, change: NewChange) -> Result<ChangeRecord, SyncError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(SyncError::storage("simulated append failure"));
        }
        self.inner.append(change).await
    }

    async fn since(
        &self,
        entity_type: &str,
        after_version: i64,
        limit: Option<i64>,
    ) -> Result<Vec<ChangeRecord>, SyncError> {
        self.inner.since(entity_type, after_version, limit).await
    }

    async fn status(&self) -> Result<Vec<EntityStatus>, SyncError> {
        self.inner.status().await
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64, SyncError> {
        self.inner.prune(cutoff).await
    }
}

/// Pool for database tests, migrated and emptied
pub async fn pg_pool() -> sqlx::PgPool {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for database tests");
    let pool = sqlx::PgPool::connect(&database_url)
        .await
        .expect("Failed to create test database pool");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    sqlx::query("TRUNCATE TABLE change_log, entity_versions")
        .execute(&pool)
        .await
        .expect("Failed to clean sync tables");
    pool
}
