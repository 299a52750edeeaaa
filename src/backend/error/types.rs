/**
 * Backend Error Types
 *
 * This module defines the error taxonomy of the sync subsystem and the
 * HTTP-facing wrapper used by handlers.
 *
 * # Error Types
 *
 * - `SyncError` - failures inside the version store, change log, registry,
 *   dispatcher and router
 * - `BackendError` - what an HTTP handler returns; converts into a JSON
 *   response (see `conversion`)
 *
 * # Propagation
 *
 * `SyncError::Storage` and `SyncError::DuplicateVersion` surface to the direct
 * caller of the version store, change log and tracker. `Delivery` is caught
 * by the dispatcher and turned into an unregister. `Subscription` becomes an
 * inline `{type:"error"}` reply. Nothing inside the notification pipeline
 * ever reaches the originating domain request.
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::auth::sessions::AuthError;
use crate::shared::SharedError;

/// Errors raised by the sync core
#[derive(Debug, Error)]
pub enum SyncError {
    /// Version or change-log persistence failed
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message
        message: String,
    },

    /// A change was appended with a version that already exists
    ///
    /// This signals a bug in the caller, never a transient condition.
    #[error("Duplicate version {version} for entity type '{entity_type}'")]
    DuplicateVersion { entity_type: String, version: i64 },

    /// Sending to a live connection failed
    #[error("Delivery to '{principal_id}' failed: {message}")]
    Delivery {
        principal_id: String,
        message: String,
    },

    /// Subscribe or unsubscribe for a principal without a live connection
    #[error("Cannot change subscription to '{channel}' for '{principal_id}': {message}")]
    Subscription {
        principal_id: String,
        channel: String,
        message: String,
    },

    /// A principal resolver failed
    #[error("Resolving principals for '{entity_type}' failed: {message}")]
    Resolution {
        entity_type: String,
        message: String,
    },

    /// Input failed validation
    #[error(transparent)]
    Validation(#[from] SharedError),
}

impl SyncError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn delivery(principal_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            principal_id: principal_id.into(),
            message: message.into(),
        }
    }

    pub fn subscription(
        principal_id: impl Into<String>,
        channel: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Subscription {
            principal_id: principal_id.into(),
            channel: channel.into(),
            message: message.into(),
        }
    }

    pub fn resolution(entity_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            entity_type: entity_type.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        Self::storage(err.to_string())
    }
}

/// Backend-specific error types
///
/// Returned by HTTP handlers; each variant maps to a status code.
///
/// # Usage
///
/// ```rust
/// use classroom_sync::backend::error::BackendError;
/// use axum::http::StatusCode;
///
/// let err = BackendError::handler(StatusCode::BAD_REQUEST, "Invalid request");
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// Handler error (e.g., missing parameters, invalid request)
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// Error from the sync core
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Authentication failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Shared error (from shared module)
    #[error(transparent)]
    SharedError(#[from] SharedError),
}

impl BackendError {
    /// Create a new handler error with a status code
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `HandlerError` - Uses the status code from the error
    /// - `Sync` - 400 for validation, 409 for subscription, 500 otherwise
    /// - `Auth` - 401 Unauthorized
    /// - `SharedError` - 400 for validation, 500 for serialization
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::HandlerError { status, .. } => *status,
            Self::Sync(err) => match err {
                SyncError::Validation(_) => StatusCode::BAD_REQUEST,
                SyncError::Subscription { .. } => StatusCode::CONFLICT,
                SyncError::Storage { .. }
                | SyncError::DuplicateVersion { .. }
                | SyncError::Delivery { .. }
                | SyncError::Resolution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::SharedError(err) => match err {
                SharedError::SerializationError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                SharedError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            },
        }
    }

    /// Get the error message
    ///
    /// Internal failures are reported generically so storage details do not
    /// leak to clients.
    pub fn message(&self) -> String {
        match self {
            Self::HandlerError { message, .. } => message.clone(),
            Self::Sync(SyncError::Validation(err)) => err.to_string(),
            Self::Sync(err @ SyncError::Subscription { .. }) => err.to_string(),
            Self::Sync(_) => "Internal server error".to_string(),
            Self::Auth(err) => err.to_string(),
            Self::SharedError(err) => err.to_string(),
        }
    }
}
