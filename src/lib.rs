// Increase recursion limit for complex async operations
#![recursion_limit = "256"]

//! Classroom Sync - Main Library
//!
//! Change synchronization and real-time notifications for a school
//! management backend. CRUD handlers report committed changes to grades,
//! attendance, assignments and other records; this crate versions them,
//! keeps a catch-up log, and pushes notifications to the principals who
//! care over WebSockets.
//!
//! # Module Structure
//!
//! - **`shared`** - Wire and storage types shared by every layer
//!   - Change records, change events, WebSocket messages
//!   - Principals and roles
//!   - Configuration and shared error types
//!
//! - **`backend`** - Server-side code
//!   - Sync store (PostgreSQL or in-memory)
//!   - Version store, change log, change tracker, event router
//!   - Connection registry, fan-out dispatcher, WebSocket transport
//!   - Axum routes, auth middleware, background tasks
//!
//! # Usage
//!
//! ```rust,no_run
//! use classroom_sync::backend::server::create_app;
//! use classroom_sync::shared::{ChangeEvent, SyncConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (app, sync) = create_app(SyncConfig::from_env()?).await;
//!
//! // After a grade row is committed and the HTTP response is sent:
//! sync.report_change(ChangeEvent::updated(
//!     "grades",
//!     "42",
//!     serde_json::json!({"percentage": 91}),
//!     "teacher-7",
//! ));
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! All server state is shared through `Arc`. The connection registry keeps
//! its indices behind one `tokio::sync::RwLock`; version allocation relies
//! on the store's atomic increment, never on an in-process lock.

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
pub mod backend;
