/**
 * Server Initialization
 *
 * This module handles the initialization and setup of the Axum HTTP server,
 * including store selection, sync service wiring and background tasks.
 *
 * # Initialization Process
 *
 * 1. Load the optional database and run migrations
 * 2. Pick the sync store (PostgreSQL, or in-memory without a database)
 * 3. Register the principal resolvers
 * 4. Build the sync service and warm its version cache
 * 5. Start the connection sweep and the retention pruner
 * 6. Create the router
 */

use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::backend::auth::JwtAuthenticator;
use crate::backend::routes::router::create_router;
use crate::backend::school::register_school_resolvers;
use crate::backend::server::config::load_database;
use crate::backend::server::state::AppState;
use crate::backend::store::{MemorySyncStore, PgSyncStore, SyncStore};
use crate::backend::sync::{ResolverRegistry, SyncService};
use crate::backend::tasks::spawn_periodic;
use crate::shared::SyncConfig;

/// Create and configure the Axum application
///
/// # Returns
///
/// The router ready to serve, and the sync service so the caller can report
/// changes and close sockets at shutdown
///
/// # Error Handling
///
/// The function is designed to be resilient:
/// - Missing or unreachable database: falls back to the in-memory store
/// - Migration failures: logged but don't prevent startup
/// - Cache warm-up failures: logged; the cache fills on first use
pub async fn create_app(config: SyncConfig) -> (Router<()>, SyncService) {
    tracing::info!("[Server] Initializing classroom sync server");

    let db_pool = load_database(&config).await;

    let store: Arc<dyn SyncStore> = match &db_pool {
        Some(pool) => Arc::new(PgSyncStore::new(pool.clone())),
        None => Arc::new(MemorySyncStore::new()),
    };

    let mut resolvers = ResolverRegistry::new();
    if let Some(pool) = &db_pool {
        register_school_resolvers(&mut resolvers, pool);
    }
    if resolvers.is_empty() {
        tracing::warn!("[Server] No principal resolvers; changes reach channel subscribers only");
    } else {
        tracing::info!("[Server] Notifying principals for {} entity types", resolvers.len());
    }

    let state = build_state(config, store, resolvers, db_pool).await;
    spawn_background_tasks(&state);

    let sync = state.sync.clone();
    (create_router(state), sync)
}

/// Wire the application state over an explicit store
///
/// Used by `create_app` and by tests that need the router without a
/// database.
pub async fn build_state(
    config: SyncConfig,
    store: Arc<dyn SyncStore>,
    resolvers: ResolverRegistry,
    db_pool: Option<PgPool>,
) -> AppState {
    let sync = SyncService::new(store, resolvers);
    if let Err(e) = sync.warm().await {
        tracing::warn!("[Server] Could not warm the version cache: {}", e);
    }

    let authenticator = JwtAuthenticator::new(&config.jwt_secret);
    AppState::new(config, sync, authenticator, db_pool)
}

/// Start the periodic maintenance jobs
///
/// - Connection sweep: unregisters dead sockets and forgets expired
///   revocations
/// - Retention: prunes change records older than the configured horizon
pub fn spawn_background_tasks(state: &AppState) -> Vec<JoinHandle<()>> {
    let sweep_sync = state.sync.clone();
    let authenticator = state.authenticator.clone();
    let sweep = spawn_periodic("connection-sweep", state.config.sweep_interval, move || {
        let sync = sweep_sync.clone();
        let authenticator = authenticator.clone();
        async move {
            let swept = sync.sweep().await;
            let purged = authenticator.revoked().purge_expired().await;
            tracing::debug!(
                "[Server] Sweep removed {} dead connections and {} expired revocations",
                swept,
                purged
            );
        }
    });

    let prune_sync = state.sync.clone();
    let retention = state.config.retention;
    let prune = spawn_periodic("change-log-retention", state.config.prune_interval, move || {
        let sync = prune_sync.clone();
        async move {
            if let Err(e) = sync.run_retention(retention).await {
                tracing::error!("[Server] Change log retention failed: {}", e);
            }
        }
    });

    tracing::info!("[Server] Background tasks started");
    vec![sweep, prune]
}
