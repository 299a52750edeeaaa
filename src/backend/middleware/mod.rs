//! Middleware Module
//!
//! HTTP middleware for the sync server.
//!
//! - **`auth`** - bearer-token authentication for the `/api` routes
//!
//! # Example
//!
//! ```rust,ignore
//! use classroom_sync::backend::middleware::auth_middleware;
//!
//! let protected = api_routes().route_layer(
//!     axum::middleware::from_fn_with_state(state.clone(), auth_middleware),
//! );
//! ```

pub mod auth;

pub use auth::{auth_middleware, bearer_token, AuthUser, AuthenticatedPrincipal};
