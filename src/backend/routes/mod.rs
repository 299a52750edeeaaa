//! Route Configuration Module
//!
//! This module configures all HTTP routes for the sync server.
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! ├── router.rs       - Main router creation, /health and /ws
//! └── api_routes.rs   - Catch-up, status and logout handlers
//! ```
//!
//! # Route Types
//!
//! ## Public
//!
//! - `GET /health` - Liveness check
//! - `GET /ws?token=` - WebSocket upgrade; authenticates from the query string
//!
//! ## API (bearer token)
//!
//! - `GET /api/sync/{entity_type}/changes?since=&limit=` - Catch-up query
//! - `GET /api/sync/status` - Sync status
//! - `POST /api/auth/logout` - Revoke token, close live socket

/// Main router creation
pub mod router;

/// API endpoint handlers
pub mod api_routes;

pub use router::create_router;
