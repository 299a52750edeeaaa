//! Change Synchronization Module
//!
//! Versioned change tracking and the event router that turns tracked
//! changes into real-time notifications.
//!
//! # Module Structure
//!
//! ```text
//! sync/
//! ├── mod.rs          - SyncService composition root
//! ├── versions.rs     - VersionStore: atomic per-type version allocation
//! ├── change_log.rs   - ChangeLog: append-only log, catch-up, retention
//! ├── redact.rs       - Sensitive-field stripping for payloads
//! ├── tracker.rs      - ChangeTracker: the single write path
//! └── router.rs       - SyncEventRouter and principal resolvers
//! ```
//!
//! # Data Flow
//!
//! ```text
//! CRUD handler ──report_change──▶ SyncEventRouter
//!                                   ├─▶ ChangeTracker ─▶ VersionStore + ChangeLog
//!                                   ├─▶ PrincipalResolver (per entity type)
//!                                   └─▶ FanoutDispatcher ─▶ ConnectionRegistry
//! ```

pub mod change_log;
pub mod redact;
pub mod router;
pub mod tracker;
pub mod versions;

pub use change_log::ChangeLog;
pub use redact::redact_sensitive;
pub use router::{
    EntityRoute, FnResolver, PrincipalResolver, ResolverRegistry, RoutingOutcome, SyncEventRouter,
};
pub use tracker::ChangeTracker;
pub use versions::VersionStore;

use std::sync::Arc;
use std::time::Duration;

use crate::backend::error::SyncError;
use crate::backend::realtime::{ConnectionRegistry, FanoutDispatcher};
use crate::backend::store::SyncStore;
use crate::shared::{ChangeEvent, CloseReason};

/// Every sync component wired over one store
///
/// Cheap to clone; clones share the store, the registry and the version
/// cache. Constructed once by `server::init::create_app`.
#[derive(Clone)]
pub struct SyncService {
    tracker: ChangeTracker,
    registry: ConnectionRegistry,
    router: SyncEventRouter,
}

impl SyncService {
    pub fn new(store: Arc<dyn SyncStore>, resolvers: ResolverRegistry) -> Self {
        let tracker = ChangeTracker::from_store(store);
        let registry = ConnectionRegistry::new();
        let dispatcher = FanoutDispatcher::new(registry.clone());
        let router = SyncEventRouter::new(tracker.clone(), dispatcher, resolvers);

        tracing::info!(
            "[Sync] Service ready with resolvers for {:?}",
            router.resolvers().entity_types()
        );

        Self {
            tracker,
            registry,
            router,
        }
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Report a committed domain change; returns without waiting for delivery
    pub fn report_change(&self, event: ChangeEvent) {
        self.router.report_change(event);
    }

    /// Load last-known versions from storage into the version cache
    pub async fn warm(&self) -> Result<usize, SyncError> {
        self.tracker.versions().warm().await
    }

    /// Delete change records older than `retention`
    pub async fn run_retention(&self, retention: Duration) -> Result<u64, SyncError> {
        self.tracker.log().prune(retention).await
    }

    /// Unregister connections whose transport is gone
    pub async fn sweep(&self) -> usize {
        self.registry.sweep_closed().await
    }

    /// Close every live socket with 1001
    pub async fn shutdown(&self) -> usize {
        self.registry.close_all(CloseReason::ServerShutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::store::MemorySyncStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_retention_with_zero_horizon_keeps_versions() {
        let service = SyncService::new(Arc::new(MemorySyncStore::new()), ResolverRegistry::new());
        for id in ["1", "2"] {
            service
                .tracker()
                .track_change("grades", id, &json!({"score": 10}), "t1")
                .await
                .unwrap();
        }

        assert_eq!(service.run_retention(Duration::ZERO).await.unwrap(), 2);
        let catch_up = service.tracker().changes_since("grades", 0, None).await.unwrap();
        assert!(catch_up.changes.is_empty());
        assert_eq!(catch_up.current_version, 2);
        assert_eq!(
            service.tracker().track_change("grades", "3", &json!({}), "t1").await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_warm_loads_existing_versions() {
        let store = MemorySyncStore::new();
        let other = SyncService::new(Arc::new(store.clone()), ResolverRegistry::new());
        other.tracker().track_change("attendance", "1", &json!({}), "t").await.unwrap();

        let service = SyncService::new(Arc::new(store), ResolverRegistry::new());
        assert_eq!(service.tracker().versions().cached_version("attendance").await, 0);
        assert_eq!(service.warm().await.unwrap(), 1);
        assert_eq!(service.tracker().versions().cached_version("attendance").await, 1);
    }
}
