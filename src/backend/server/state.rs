/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * the necessary `FromRef` traits for Axum state extraction.
 *
 * # Architecture
 *
 * The `AppState` struct serves as the central state container for the
 * application, holding:
 * - The loaded configuration
 * - The sync service (tracker, registry, dispatcher, router)
 * - The bearer-token authenticator
 * - Optional services (database)
 *
 * # Thread Safety
 *
 * Every field is cheap to clone and shares its inner state through `Arc`,
 * so handlers on any worker thread see the same registry and caches.
 */

use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;

use crate::backend::auth::JwtAuthenticator;
use crate::backend::realtime::ConnectionRegistry;
use crate::backend::sync::SyncService;
use crate::shared::SyncConfig;

/// Application state shared by every handler
///
/// # Usage
///
/// ```rust,ignore
/// use classroom_sync::backend::server::state::AppState;
/// use axum::extract::State;
///
/// async fn handler(State(app_state): State<AppState>) {
///     let live = app_state.sync.registry().connection_count().await;
/// }
/// ```
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SyncConfig>,

    /// Change tracking and real-time fan-out
    pub sync: SyncService,

    /// Verifies bearer tokens and holds the revocation cache
    pub authenticator: Arc<JwtAuthenticator>,

    /// Database connection pool
    ///
    /// `None` when the server runs on the in-memory store.
    pub db_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(
        config: SyncConfig,
        sync: SyncService,
        authenticator: JwtAuthenticator,
        db_pool: Option<PgPool>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sync,
            authenticator: Arc::new(authenticator),
            db_pool,
        }
    }
}

impl FromRef<AppState> for SyncService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.sync.clone()
    }
}

impl FromRef<AppState> for ConnectionRegistry {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.sync.registry().clone()
    }
}

impl FromRef<AppState> for Arc<JwtAuthenticator> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.authenticator.clone()
    }
}

/// Implement FromRef for Option<PgPool>
///
/// This allows Axum handlers to extract the optional database pool
/// directly from `AppState`.
impl FromRef<AppState> for Option<PgPool> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}
