//! Backend Module
//!
//! All server-side code of the sync service.
//!
//! # Architecture
//!
//! - **`store`** - `SyncStore` seam with PostgreSQL and in-memory backends
//! - **`sync`** - Version store, change log, change tracker, event router
//! - **`realtime`** - Connection registry, fan-out dispatcher, WebSocket transport
//! - **`school`** - Default principal resolvers for the school schema
//! - **`auth`** - Bearer-token verification and revocation
//! - **`middleware`** - Request authentication
//! - **`routes`** - HTTP route configuration
//! - **`server`** - Application state, database loading, initialization
//! - **`tasks`** - Detached and periodic background tasks
//! - **`error`** - Backend error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - Server binary
//! ├── store/          - Persistence backends
//! ├── sync/           - Change tracking and routing
//! ├── realtime/       - Live connections and fan-out
//! ├── school/         - School resolvers
//! ├── auth/           - Token verification
//! ├── middleware/     - Request middleware
//! ├── routes/         - Route configuration
//! ├── server/         - Server initialization and state
//! ├── tasks.rs        - Background task helpers
//! └── error/          - Error types
//! ```
//!
//! # Error Handling
//!
//! The sync core returns `SyncError`. HTTP handlers return `BackendError`,
//! which renders as `{error, status}` JSON. The notification pipeline never
//! propagates errors back to the CRUD handler that reported a change.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Sync storage backends
pub mod store;

/// Change tracking and event routing
pub mod sync;

/// Real-time connections and fan-out
pub mod realtime;

/// School domain resolvers
pub mod school;

/// Background tasks
pub mod tasks;

/// Backend error types
pub mod error;

/// Token authentication
pub mod auth;

/// Middleware for request processing
pub mod middleware;

/// Re-export commonly used types
pub use error::{BackendError, SyncError};
pub use server::create_app;
pub use sync::SyncService;
