//! Real-time Notification Module
//!
//! Live WebSocket connections, their channel subscriptions, and best-effort
//! fan-out of server messages to them.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs          - Module exports and documentation
//! ├── connection.rs   - Connection handle and its outbound queue
//! ├── registry.rs     - ConnectionRegistry: principal and channel indices
//! ├── dispatcher.rs   - FanoutDispatcher: principal, channel and broadcast sends
//! └── socket.rs       - /ws handler, handshake and control messages
//! ```
//!
//! # Scope
//!
//! Everything here is process-local. A principal connected to another server
//! instance is invisible to this registry, and there is no replay: a client
//! that was offline catches up through the HTTP catch-up endpoint.
//!
//! # Close Codes
//!
//! | code | reason |
//! |---|---|
//! | 4001 | missing credential |
//! | 4002 | invalid, expired or revoked credential |
//! | 4003 | superseded by a newer connection |
//! | 4004 | logged out |
//! | 1001 | server shutting down |

pub mod connection;
pub mod dispatcher;
pub mod registry;
pub mod socket;

pub use connection::{outbound_channel, Connection, ConnectionState, Outbound};
pub use dispatcher::FanoutDispatcher;
pub use registry::ConnectionRegistry;
pub use socket::{authenticate_handshake, handle_client_message, handle_socket_upgrade};
