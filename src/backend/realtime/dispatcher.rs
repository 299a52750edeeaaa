/**
 * Fan-out Dispatcher
 *
 * Best-effort delivery of server messages to principals, channels or every
 * live connection. A send never blocks on the transport: it enqueues on the
 * connection's writer queue and returns.
 *
 * A failed enqueue means the writer task is gone. The failure is logged as a
 * delivery error and the connection is released from the registry, so the
 * dispatcher never raises to its caller.
 */

use std::collections::HashSet;

use crate::backend::error::SyncError;
use crate::backend::realtime::connection::Connection;
use crate::backend::realtime::registry::ConnectionRegistry;
use crate::shared::ServerMessage;

#[derive(Debug, Clone)]
pub struct FanoutDispatcher {
    registry: ConnectionRegistry,
}

impl FanoutDispatcher {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Send to one principal's live connection
    ///
    /// # Returns
    ///
    /// `true` if the message was queued, `false` when the principal is
    /// offline or its transport failed
    pub async fn send_to_principal(&self, principal_id: &str, message: ServerMessage) -> bool {
        match self.registry.connection(principal_id).await {
            Some(connection) => self.deliver(&connection, message).await,
            None => {
                tracing::trace!(principal_id, "[Fanout] Principal offline, dropping message");
                false
            }
        }
    }

    /// Send the same message to several principals
    ///
    /// # Returns
    ///
    /// Number of principals the message was queued for
    pub async fn send_to_principals<I, S>(&self, principal_ids: I, message: ServerMessage) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut delivered = 0;
        for principal_id in principal_ids {
            if self
                .send_to_principal(principal_id.as_ref(), message.clone())
                .await
            {
                delivered += 1;
            }
        }
        delivered
    }

    /// Send to every live subscriber of `channel`
    pub async fn send_to_channel(&self, channel: &str, message: ServerMessage) -> usize {
        let subscribers = self.registry.subscribers_of(channel).await;
        if subscribers.is_empty() {
            return 0;
        }
        let delivered = self.send_to_principals(&subscribers, message).await;
        tracing::debug!(
            channel,
            "[Fanout] Channel message delivered to {}/{} subscribers",
            delivered,
            subscribers.len()
        );
        delivered
    }

    /// Send to every live connection except the principals in `exclude`
    pub async fn broadcast(&self, message: ServerMessage, exclude: &HashSet<String>) -> usize {
        let targets: Vec<String> = self
            .registry
            .live_principals()
            .await
            .into_iter()
            .filter(|principal_id| !exclude.contains(principal_id))
            .collect();
        let delivered = self.send_to_principals(&targets, message).await;
        tracing::debug!("[Fanout] Broadcast delivered to {} connections", delivered);
        delivered
    }

    async fn deliver(&self, connection: &Connection, message: ServerMessage) -> bool {
        let kind = message.kind();
        match connection.send(message) {
            Ok(()) => true,
            Err(e @ SyncError::Delivery { .. }) => {
                tracing::warn!(kind, "[Fanout] {}", e);
                self.registry
                    .release(&connection.principal_id, connection.id)
                    .await;
                false
            }
            Err(e) => {
                tracing::warn!(kind, "[Fanout] Unexpected send failure: {}", e);
                false
            }
        }
    }
}
