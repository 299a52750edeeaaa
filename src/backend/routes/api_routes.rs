/**
 * API Route Handlers
 *
 * Thin HTTP surface over the sync core. Every route here requires a bearer
 * token (see `middleware::auth`).
 *
 * # Routes
 *
 * ## Sync
 * - `GET /api/sync/{entity_type}/changes?since=N&limit=M` - Catch-up query
 * - `GET /api/sync/status` - Per entity-type versions and live connection counts
 *
 * ## Authentication
 * - `POST /api/auth/logout` - Revoke the presented token and close the caller's socket
 */

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::backend::error::BackendError;
use crate::backend::middleware::{auth_middleware, AuthUser};
use crate::backend::server::state::AppState;
use crate::shared::{CatchUp, CloseReason, EntityStatus};

/// Query parameters of the catch-up endpoint
#[derive(Debug, Default, Deserialize)]
pub struct ChangesQuery {
    /// Last version the client has seen; defaults to 0
    pub since: Option<i64>,
    /// Page size, capped by `SYNC_CATCHUP_LIMIT`
    pub limit: Option<i64>,
}

/// Body of `GET /api/sync/status`
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub entities: Vec<EntityStatus>,
    /// Live connections on this instance
    pub connections: usize,
    /// Channels with at least one subscriber on this instance
    pub channels: usize,
}

/// Body of `POST /api/auth/logout`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub logged_out: bool,
    /// Whether a live socket was closed
    pub closed_connection: bool,
}

/// Configure API routes
///
/// # Arguments
///
/// * `router` - The router to add routes to
/// * `app_state` - State handed to the auth middleware
///
/// # Returns
///
/// Router with API routes configured behind the auth middleware
pub fn configure_api_routes(router: Router<AppState>, app_state: &AppState) -> Router<AppState> {
    let api = Router::new()
        .route("/api/sync/{entity_type}/changes", get(get_changes))
        .route("/api/sync/status", get(get_status))
        .route("/api/auth/logout", post(logout))
        .route_layer(from_fn_with_state(app_state.clone(), auth_middleware));

    router.merge(api)
}

/// Catch-up query (GET /api/sync/{entity_type}/changes)
///
/// # Errors
///
/// * `400 Bad Request` - Malformed entity type, negative `since`, non-positive `limit`
/// * `401 Unauthorized` - Missing or invalid token
pub async fn get_changes(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Query(query): Query<ChangesQuery>,
    AuthUser(auth): AuthUser,
) -> Result<Json<CatchUp>, BackendError> {
    let since = query.since.unwrap_or(0);
    if since < 0 {
        return Err(BackendError::handler(
            StatusCode::BAD_REQUEST,
            "since must not be negative",
        ));
    }

    let cap = state.config.catch_up_limit;
    let limit = match query.limit {
        Some(limit) if limit <= 0 => {
            return Err(BackendError::handler(
                StatusCode::BAD_REQUEST,
                "limit must be positive",
            ))
        }
        Some(limit) => limit.min(cap),
        None => cap,
    };

    let catch_up = state
        .sync
        .tracker()
        .changes_since(&entity_type, since, Some(limit))
        .await?;

    tracing::debug!(
        principal_id = %auth.principal.id,
        %entity_type,
        since,
        "[Sync] Catch-up returned {} changes (current {})",
        catch_up.changes.len(),
        catch_up.current_version
    );
    Ok(Json(catch_up))
}

/// Sync status (GET /api/sync/status)
pub async fn get_status(
    State(state): State<AppState>,
    AuthUser(_auth): AuthUser,
) -> Result<Json<StatusResponse>, BackendError> {
    let entities = state.sync.tracker().log().status().await?;
    let registry = state.sync.registry();

    Ok(Json(StatusResponse {
        entities,
        connections: registry.connection_count().await,
        channels: registry.channel_count().await,
    }))
}

/// Logout (POST /api/auth/logout)
///
/// Revokes the presented token and closes the caller's live socket with
/// close code 4004.
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(auth): AuthUser,
) -> Result<Json<LogoutResponse>, BackendError> {
    state.authenticator.revoke(&auth.token).await?;
    let closed_connection = state
        .sync
        .registry()
        .invalidate(&auth.principal.id, CloseReason::LoggedOut)
        .await;

    tracing::info!(principal_id = %auth.principal.id, "[Auth] Logged out");
    Ok(Json(LogoutResponse {
        logged_out: true,
        closed_connection,
    }))
}
