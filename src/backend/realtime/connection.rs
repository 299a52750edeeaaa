/**
 * Live Connections
 *
 * A `Connection` is the registry's view of one authenticated WebSocket
 * session. It does not own the socket: it owns the sending half of an
 * unbounded FIFO queue whose receiving half is drained by exactly one writer
 * task per socket (see `socket.rs`). That gives per-connection ordering and
 * rules out concurrent writes to the same transport.
 *
 * When the writer task stops (socket closed, send error), the receiver is
 * dropped and every later send fails, which the dispatcher treats as a
 * disconnect.
 */

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::error::SyncError;
use crate::shared::{CloseReason, Role, ServerMessage};

/// Item queued for a socket's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Serialize and send as a text frame
    Message(ServerMessage),
    /// Send a close frame and stop writing
    Close(CloseReason),
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// Create the queue for a new connection
pub fn outbound_channel() -> (OutboundSender, OutboundReceiver) {
    mpsc::unbounded_channel()
}

/// Transport liveness as seen from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    /// A close frame has been queued
    Closing,
    /// The writer task is gone
    Closed,
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: Uuid,
    pub principal_id: String,
    pub role: Role,
    pub connected_at: DateTime<Utc>,
    sender: OutboundSender,
    closing: Arc<AtomicBool>,
}

impl Connection {
    pub fn new(principal_id: impl Into<String>, role: Role, sender: OutboundSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal_id: principal_id.into(),
            role,
            connected_at: Utc::now(),
            sender,
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.sender.is_closed() {
            ConnectionState::Closed
        } else if self.closing.load(Ordering::Acquire) {
            ConnectionState::Closing
        } else {
            ConnectionState::Open
        }
    }

    /// Queue a message for the writer task
    pub fn send(&self, message: ServerMessage) -> Result<(), SyncError> {
        self.sender
            .send(Outbound::Message(message))
            .map_err(|_| SyncError::delivery(&self.principal_id, "transport closed"))
    }

    /// Queue a close frame; later messages are still accepted but never written
    pub fn close(&self, reason: CloseReason) {
        self.closing.store(true, Ordering::Release);
        if self.sender.send(Outbound::Close(reason)).is_err() {
            tracing::debug!(
                principal_id = %self.principal_id,
                "[Registry] Close requested on an already closed transport"
            );
        }
    }
}
