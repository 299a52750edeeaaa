/**
 * PostgreSQL Sync Store
 *
 * This module persists version counters and change rows to PostgreSQL.
 * Tables are created by `migrations/` (see `server::config::load_database`).
 *
 * # Atomicity
 *
 * Version allocation is a single `INSERT ... ON CONFLICT DO UPDATE ...
 * RETURNING` statement. PostgreSQL takes a row lock on the conflicting
 * `entity_versions` row, so concurrent callers for the same entity type
 * (from this process or any other) serialize on it and always observe
 * distinct, consecutive values.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::backend::error::SyncError;
use crate::backend::store::SyncStore;
use crate::shared::{ChangeRecord, EntityStatus, EntityVersion, NewChange};

/// Sync store backed by a PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PgSyncStore {
    pool: PgPool,
}

impl PgSyncStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncStore for PgSyncStore {
    async fn next_version(&self, entity_type: &str) -> Result<i64, SyncError> {
        let version: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO entity_versions (entity_type, current_version, updated_at)
            VALUES ($1, 1, NOW())
            ON CONFLICT (entity_type) DO UPDATE SET
                current_version = entity_versions.current_version + 1,
                updated_at = NOW()
            RETURNING current_version
            "#,
        )
        .bind(entity_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(version)
    }

    async fn current_version(&self, entity_type: &str) -> Result<i64, SyncError> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT current_version
            FROM entity_versions
            WHERE entity_type = $1
            "#,
        )
        .bind(entity_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(version.unwrap_or(0))
    }

    async fn versions(&self) -> Result<Vec<EntityVersion>, SyncError> {
        let versions = sqlx::query_as::<_, EntityVersion>(
            r#"
            SELECT entity_type, current_version, updated_at
            FROM entity_versions
            ORDER BY entity_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(versions)
    }

    async fn append(&self, change: NewChange) -> Result<ChangeRecord, SyncError> {
        let result = sqlx::query_as::<_, ChangeRecord>(
            r#"
            INSERT INTO change_log (entity_type, entity_id, version, payload, actor_id, created_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            RETURNING id, entity_type, entity_id, version, payload, actor_id, created_at
            "#,
        )
        .bind(&change.entity_type)
        .bind(&change.entity_id)
        .bind(change.version)
        .bind(&change.payload)
        .bind(&change.actor_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(record),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(SyncError::DuplicateVersion {
                    entity_type: change.entity_type,
                    version: change.version,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn since(
        &self,
        entity_type: &str,
        after_version: i64,
        limit: Option<i64>,
    ) -> Result<Vec<ChangeRecord>, SyncError> {
        // LIMIT NULL means no limit in PostgreSQL
        let records = sqlx::query_as::<_, ChangeRecord>(
            r#"
            SELECT id, entity_type, entity_id, version, payload, actor_id, created_at
            FROM change_log
            WHERE entity_type = $1 AND version > $2
            ORDER BY version ASC
            LIMIT $3
            "#,
        )
        .bind(entity_type)
        .bind(after_version)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn status(&self) -> Result<Vec<EntityStatus>, SyncError> {
        let status = sqlx::query_as::<_, EntityStatus>(
            r#"
            SELECT
                v.entity_type,
                v.current_version,
                v.updated_at,
                COUNT(c.id) AS total_changes,
                COUNT(c.id) FILTER (WHERE c.created_at > NOW() - INTERVAL '24 hours') AS changes_last_24h
            FROM entity_versions v
            LEFT JOIN change_log c ON c.entity_type = v.entity_type
            GROUP BY v.entity_type, v.current_version, v.updated_at
            ORDER BY v.entity_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(status)
    }

    async fn prune(&self, cutoff: DateTime<Utc>) -> Result<u64, SyncError> {
        let result = sqlx::query(
            r#"
            DELETE FROM change_log
            WHERE created_at <= $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
