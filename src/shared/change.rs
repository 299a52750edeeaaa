/**
 * Change Records and Version Rows
 *
 * This module defines the persisted shapes of the change-synchronization
 * subsystem: one `EntityVersion` row per entity type and one `ChangeRecord`
 * per tracked change. Both map 1:1 onto the `entity_versions` and
 * `change_log` tables.
 *
 * # Invariants
 *
 * - `EntityVersion::current_version` only increases, by exactly 1 per
 *   allocation.
 * - `(entity_type, version)` is unique across `ChangeRecord`s.
 * - A `ChangeRecord` is never updated after it is written.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::SharedError;

/// Actor id recorded for changes that no authenticated principal caused
pub const SYSTEM_ACTOR: &str = "system";

/// Longest accepted entity type name
pub const MAX_ENTITY_TYPE_LEN: usize = 64;

/// Current version counter of one entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EntityVersion {
    /// Entity type name (e.g. `grades`)
    pub entity_type: String,
    /// Last allocated version, 0 before the first change
    pub current_version: i64,
    /// When the counter was last incremented
    pub updated_at: DateTime<Utc>,
}

/// One immutable row of the change log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Surrogate key assigned by storage
    pub id: i64,
    /// Entity type the change belongs to
    pub entity_type: String,
    /// Domain identifier of the changed record
    pub entity_id: String,
    /// Version allocated for this change, unique within `entity_type`
    pub version: i64,
    /// Redacted description of the change
    pub payload: serde_json::Value,
    /// Principal that caused the change, or [`SYSTEM_ACTOR`]
    pub actor_id: String,
    /// Write timestamp
    pub created_at: DateTime<Utc>,
}

/// A change row that has not been written yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewChange {
    pub entity_type: String,
    pub entity_id: String,
    pub version: i64,
    pub payload: serde_json::Value,
    pub actor_id: String,
}

/// Per entity type summary used by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EntityStatus {
    pub entity_type: String,
    pub current_version: i64,
    pub updated_at: DateTime<Utc>,
    pub total_changes: i64,
    pub changes_last_24h: i64,
}

/// Result of a catch-up query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchUp {
    /// Changes after the requested version, ascending
    pub changes: Vec<ChangeRecord>,
    /// Current version of the entity type at query time
    pub current_version: i64,
}

/// Validate an entity type name
///
/// Entity type names are used verbatim as table keys and as the prefix of
/// channel names, so they are restricted to lowercase ASCII letters, digits
/// and underscores.
pub fn validate_entity_type(entity_type: &str) -> Result<(), SharedError> {
    if entity_type.is_empty() {
        return Err(SharedError::validation("entity_type", "must not be empty"));
    }
    if entity_type.len() > MAX_ENTITY_TYPE_LEN {
        return Err(SharedError::validation(
            "entity_type",
            format!("must be at most {} characters", MAX_ENTITY_TYPE_LEN),
        ));
    }
    if !entity_type
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(SharedError::validation(
            "entity_type",
            "may only contain lowercase letters, digits and underscores",
        ));
    }
    Ok(())
}

/// Channel name for one entity: `"{entity_type}:{entity_id}"`
pub fn channel_name(entity_type: &str, entity_id: &str) -> String {
    format!("{}:{}", entity_type, entity_id)
}
