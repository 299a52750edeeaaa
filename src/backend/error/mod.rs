//! Backend Error Module
//!
//! Error types of the sync core and the HTTP layer.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - SyncError and BackendError
//! └── conversion.rs - IntoResponse for BackendError
//! ```
//!
//! # Error Types
//!
//! - `SyncError::Storage` - version or log persistence failed
//! - `SyncError::DuplicateVersion` - a caller reused a version
//! - `SyncError::Delivery` - a transport send failed (never propagated)
//! - `SyncError::Subscription` - subscribe/unsubscribe without a live connection
//! - `SyncError::Resolution` - a principal resolver failed
//! - `BackendError` - handler-level wrapper rendered as `{error, status}` JSON

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use types::{BackendError, SyncError};
