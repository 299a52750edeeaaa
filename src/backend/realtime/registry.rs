/**
 * Connection Registry
 *
 * Maps each authenticated principal to at most one live connection, and each
 * channel to the principals subscribed to it.
 *
 * # Lifecycle
 *
 * One registry is constructed at process start (see `server::init`) and
 * injected wherever it is needed; it is torn down by `close_all` at
 * shutdown. Its state is process-local: a principal connected to another
 * server instance is invisible here.
 *
 * # State Machine
 *
 * Per principal: `Disconnected -> Connected` on `register`, and back on
 * `unregister`, `release`, `invalidate`, a failed send, or supersession by a
 * newer `register` for the same principal. Subscriptions belong to the
 * connection and are purged with it.
 *
 * # Thread Safety
 *
 * All indices live behind one `RwLock`, so a principal's connection entry and
 * its channel memberships always change together.
 */

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::error::SyncError;
use crate::backend::realtime::connection::{Connection, ConnectionState, OutboundSender};
use crate::shared::{CloseReason, Role, ServerMessage};

#[derive(Debug, Default)]
struct RegistryInner {
    clients: HashMap<String, Connection>,
    /// channel -> subscribed principals
    channels: HashMap<String, HashSet<String>>,
    /// principal -> subscribed channels
    memberships: HashMap<String, HashSet<String>>,
}

impl RegistryInner {
    fn is_current(&self, principal_id: &str, connection_id: Uuid) -> bool {
        self.clients
            .get(principal_id)
            .is_some_and(|c| c.id == connection_id)
    }

    fn remove(&mut self, principal_id: &str) -> Option<Connection> {
        let connection = self.clients.remove(principal_id)?;
        self.purge_subscriptions(principal_id);
        Some(connection)
    }

    fn purge_subscriptions(&mut self, principal_id: &str) {
        let Some(channels) = self.memberships.remove(principal_id) else {
            return;
        };
        for channel in channels {
            if let Some(subscribers) = self.channels.get_mut(&channel) {
                subscribers.remove(principal_id);
                if subscribers.is_empty() {
                    self.channels.remove(&channel);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly authenticated connection
    ///
    /// An existing connection for the same principal is closed with
    /// [`CloseReason::Superseded`] and its subscriptions purged before the new
    /// connection is acknowledged with `{type:"connected"}`. The acknowledgment
    /// is queued before the registry lock is released, so it is always the
    /// first message the new connection receives.
    ///
    /// # Returns
    ///
    /// The registered connection
    pub async fn register(
        &self,
        principal_id: &str,
        role: Role,
        sender: OutboundSender,
    ) -> Connection {
        let connection = Connection::new(principal_id, role, sender);
        let mut inner = self.inner.write().await;

        if let Some(previous) = inner.remove(principal_id) {
            tracing::info!(
                principal_id,
                old_connection = %previous.id,
                new_connection = %connection.id,
                "[Registry] Superseding existing connection"
            );
            previous.close(CloseReason::Superseded);
        }

        let ack = ServerMessage::Connected {
            user_id: principal_id.to_string(),
            role,
        };
        if let Err(e) = connection.send(ack) {
            tracing::warn!("[Registry] Could not acknowledge new connection: {}", e);
            return connection;
        }

        inner.clients.insert(principal_id.to_string(), connection.clone());
        tracing::info!(
            principal_id,
            %role,
            connection_id = %connection.id,
            "[Registry] Principal connected ({} live)",
            inner.clients.len()
        );
        connection
    }

    /// Remove a principal's connection and every subscription it held
    ///
    /// The transport is not closed; use [`ConnectionRegistry::invalidate`] for
    /// that. No-op when the principal is not registered.
    pub async fn unregister(&self, principal_id: &str) -> bool {
        let removed = self.inner.write().await.remove(principal_id);
        if removed.is_some() {
            tracing::info!(principal_id, "[Registry] Principal disconnected");
        }
        removed.is_some()
    }

    /// Unregister only if `connection_id` is still the principal's connection
    ///
    /// Used by socket teardown and failed sends, so a superseded connection
    /// closing late never evicts its replacement.
    pub async fn release(&self, principal_id: &str, connection_id: Uuid) -> bool {
        let mut inner = self.inner.write().await;
        let is_current = inner.is_current(principal_id, connection_id);
        if is_current {
            inner.remove(principal_id);
            tracing::info!(principal_id, %connection_id, "[Registry] Connection released");
        }
        is_current
    }

    /// Close a principal's connection with `reason` and unregister it
    pub async fn invalidate(&self, principal_id: &str, reason: CloseReason) -> bool {
        let removed = self.inner.write().await.remove(principal_id);
        match removed {
            Some(connection) => {
                connection.close(reason);
                tracing::info!(principal_id, reason = reason.reason(), "[Registry] Connection invalidated");
                true
            }
            None => false,
        }
    }

    /// Subscribe the principal's connection `connection_id` to `channel`
    ///
    /// # Errors
    ///
    /// [`SyncError::Subscription`] when `connection_id` is not the principal's
    /// registered connection, either because it never registered or because a
    /// newer connection superseded it.
    pub async fn subscribe(
        &self,
        principal_id: &str,
        connection_id: Uuid,
        channel: &str,
    ) -> Result<(), SyncError> {
        let mut inner = self.inner.write().await;
        if !inner.is_current(principal_id, connection_id) {
            return Err(SyncError::subscription(principal_id, channel, "no live connection"));
        }

        inner
            .channels
            .entry(channel.to_string())
            .or_default()
            .insert(principal_id.to_string());
        inner
            .memberships
            .entry(principal_id.to_string())
            .or_default()
            .insert(channel.to_string());

        tracing::debug!(principal_id, channel, "[Registry] Subscribed");
        Ok(())
    }

    /// Remove the principal's connection `connection_id` from `channel`
    ///
    /// Succeeds if it was not subscribed. Fails like
    /// [`ConnectionRegistry::subscribe`] for a stale or unknown connection.
    pub async fn unsubscribe(
        &self,
        principal_id: &str,
        connection_id: Uuid,
        channel: &str,
    ) -> Result<(), SyncError> {
        let mut inner = self.inner.write().await;
        if !inner.is_current(principal_id, connection_id) {
            return Err(SyncError::subscription(principal_id, channel, "no live connection"));
        }

        if let Some(subscribers) = inner.channels.get_mut(channel) {
            subscribers.remove(principal_id);
            if subscribers.is_empty() {
                inner.channels.remove(channel);
            }
        }
        if let Some(channels) = inner.memberships.get_mut(principal_id) {
            channels.remove(channel);
            if channels.is_empty() {
                inner.memberships.remove(principal_id);
            }
        }

        tracing::debug!(principal_id, channel, "[Registry] Unsubscribed");
        Ok(())
    }

    pub async fn subscribers_of(&self, channel: &str) -> HashSet<String> {
        self.inner
            .read()
            .await
            .channels
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    /// Channels a principal is subscribed to
    pub async fn subscriptions_of(&self, principal_id: &str) -> HashSet<String> {
        self.inner
            .read()
            .await
            .memberships
            .get(principal_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn is_live(&self, principal_id: &str) -> bool {
        self.inner
            .read()
            .await
            .clients
            .get(principal_id)
            .is_some_and(|c| c.state() != ConnectionState::Closed)
    }

    /// The principal's registered connection, if any
    pub async fn connection(&self, principal_id: &str) -> Option<Connection> {
        self.inner.read().await.clients.get(principal_id).cloned()
    }

    pub async fn live_principals(&self) -> Vec<String> {
        self.inner.read().await.clients.keys().cloned().collect()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.clients.len()
    }

    pub async fn channel_count(&self) -> usize {
        self.inner.read().await.channels.len()
    }

    /// Unregister every connection whose transport is gone
    ///
    /// # Returns
    ///
    /// Number of connections removed
    pub async fn sweep_closed(&self) -> usize {
        let mut inner = self.inner.write().await;
        let dead: Vec<String> = inner
            .clients
            .iter()
            .filter(|(_, c)| c.state() == ConnectionState::Closed)
            .map(|(principal_id, _)| principal_id.clone())
            .collect();
        for principal_id in &dead {
            inner.remove(principal_id);
        }
        if !dead.is_empty() {
            tracing::info!("[Registry] Swept {} dead connections", dead.len());
        }
        dead.len()
    }

    /// Close and unregister every connection
    pub async fn close_all(&self, reason: CloseReason) -> usize {
        let mut inner = self.inner.write().await;
        let connections: Vec<Connection> = inner.clients.drain().map(|(_, c)| c).collect();
        inner.channels.clear();
        inner.memberships.clear();
        for connection in &connections {
            connection.close(reason);
        }
        tracing::info!("[Registry] Closed {} connections ({})", connections.len(), reason.reason());
        connections.len()
    }
}
