/**
 * Server Configuration
 *
 * This module handles the optional PostgreSQL connection behind the sync
 * store.
 *
 * # Error Handling
 *
 * Connection errors are logged but do not prevent server startup. Without a
 * database the server runs on the in-memory store: versions and the change
 * log then live only as long as the process.
 */

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::shared::SyncConfig;

/// Database configuration result
///
/// Contains the database connection pool if successfully configured,
/// or `None` if the database is not available.
pub type DatabaseConfig = Option<PgPool>;

const MAX_CONNECTIONS: u32 = 10;

/// Load and initialize database connection pool
///
/// This function:
/// 1. Reads `database_url` from the configuration
/// 2. Creates a PostgreSQL connection pool
/// 3. Runs database migrations
///
/// # Returns
///
/// - `Some(PgPool)` if database is successfully configured
/// - `None` if no URL is configured or the connection fails
pub async fn load_database(config: &SyncConfig) -> DatabaseConfig {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("[Server] DATABASE_URL not set. Using the in-memory sync store.");
        return None;
    };

    tracing::info!("[Server] Connecting to database...");

    let pool = match PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("[Server] Failed to create database connection pool: {:?}", e);
            tracing::warn!("[Server] Falling back to the in-memory sync store.");
            return None;
        }
    };

    tracing::info!("[Server] Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("[Server] Database migrations completed successfully"),
        Err(e) => {
            tracing::error!("[Server] Failed to run database migrations: {}", e);
            tracing::warn!("[Server] Continuing; the sync tables may already exist");
        }
    }

    Some(pool)
}
