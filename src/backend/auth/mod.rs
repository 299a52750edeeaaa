//! Authentication Module
//!
//! Credential verification at the edge of the sync service. Login, signup
//! and user storage belong to the surrounding application; this module only
//! turns a presented bearer token into a [`Principal`](crate::shared::Principal).
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs          - Module exports and documentation
//! └── sessions.rs     - JWT verification, issuance and revocation
//! ```
//!
//! # Flow
//!
//! 1. **WebSocket handshake**: `?token=` verified → principal registered
//! 2. **HTTP API**: `Authorization: Bearer` verified by the auth middleware
//! 3. **Logout**: token revoked → live socket closed with code 4004
//!
//! # Security
//!
//! - Tokens are HS256 JWTs signed with `JWT_SECRET`
//! - Tokens expire after 30 days by default
//! - Revocation is in-memory and per process

/// JWT token generation, validation and revocation
pub mod sessions;

pub use sessions::{
    AuthError, Claims, JwtAuthenticator, PrincipalAuthenticator, RevokedTokens,
    DEFAULT_TOKEN_LIFETIME,
};
