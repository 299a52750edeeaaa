//! Shared Module
//!
//! This module contains the plain data types used across the crate: change
//! records, wire messages, principals, configuration and the validation
//! error type. Nothing in here performs I/O.
//!
//! # Overview
//!
//! - **`change`** - `EntityVersion`, `ChangeRecord`, status and catch-up shapes
//! - **`event`** - domain change events and WebSocket wire messages
//! - **`principal`** - authenticated identities and roles
//! - **`config`** - `SyncConfig` and its builder
//! - **`error`** - `SharedError`

/// Change log and version row types
pub mod change;

/// Real-time event and wire message types
pub mod event;

/// Principals and roles
pub mod principal;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use change::{CatchUp, ChangeRecord, EntityStatus, EntityVersion, NewChange, SYSTEM_ACTOR};
pub use config::{ConfigError, SyncConfig, SyncConfigBuilder};
pub use error::SharedError;
pub use event::{ChangeEvent, ChangeType, ClientMessage, CloseReason, NotificationPayload, ServerMessage};
pub use principal::{Principal, Role};
