/**
 * Sync Event Router
 *
 * Turns a committed domain change into a tracked version plus real-time
 * notifications:
 *
 * 1. Track the change (allocate a version, append to the change log)
 * 2. Resolve the principals interested in the changed entity
 * 3. Publish to the entity's channel and notify the resolved principals
 *
 * Routing is advisory. A failure in any step is logged and the remaining
 * steps still run; nothing is ever returned to the CRUD handler that reported
 * the change, which has already answered its own request.
 */

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;

use crate::backend::error::SyncError;
use crate::backend::realtime::FanoutDispatcher;
use crate::backend::sync::redact::redact_sensitive;
use crate::backend::sync::tracker::ChangeTracker;
use crate::backend::tasks::spawn_detached;
use crate::shared::{ChangeEvent, NotificationPayload, ServerMessage};

/// Finds the principals who should hear about a change to one entity
///
/// Implemented by the domain module that owns the entity type and registered
/// in a [`ResolverRegistry`] at startup.
#[async_trait]
pub trait PrincipalResolver: Send + Sync + 'static {
    async fn resolve(&self, entity_id: &str, payload: &Value) -> Result<Vec<String>, SyncError>;
}

/// Adapts an async closure into a [`PrincipalResolver`]
///
/// ```rust,ignore
/// let resolver = FnResolver::new(|entity_id, _payload| async move {
///     Ok(vec![format!("student-{entity_id}")])
/// });
/// ```
pub struct FnResolver<F> {
    resolve: F,
}

impl<F> FnResolver<F> {
    pub fn new<Fut>(resolve: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<String>, SyncError>> + Send + 'static,
    {
        Self { resolve }
    }
}

#[async_trait]
impl<F, Fut> PrincipalResolver for FnResolver<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<String>, SyncError>> + Send + 'static,
{
    async fn resolve(&self, entity_id: &str, payload: &Value) -> Result<Vec<String>, SyncError> {
        (self.resolve)(entity_id.to_string(), payload.clone()).await
    }
}

/// How changes to one entity type are presented and to whom
#[derive(Clone)]
pub struct EntityRoute {
    /// Singular category sent with notifications, e.g. `grade`
    pub category: String,
    /// Capitalized noun used in notification text, e.g. `Grade`
    pub label: String,
    pub resolver: Arc<dyn PrincipalResolver>,
}

impl std::fmt::Debug for EntityRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityRoute")
            .field("category", &self.category)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Entity type -> route, populated once at startup
#[derive(Debug, Clone, Default)]
pub struct ResolverRegistry {
    routes: HashMap<String, EntityRoute>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the route for `entity_type`, replacing any earlier one
    pub fn register<R>(
        &mut self,
        entity_type: impl Into<String>,
        category: impl Into<String>,
        label: impl Into<String>,
        resolver: R,
    ) -> &mut Self
    where
        R: PrincipalResolver,
    {
        let entity_type = entity_type.into();
        let route = EntityRoute {
            category: category.into(),
            label: label.into(),
            resolver: Arc::new(resolver),
        };
        if self.routes.insert(entity_type.clone(), route).is_some() {
            tracing::warn!(entity_type, "[Router] Replaced existing resolver");
        }
        self
    }

    pub fn get(&self, entity_type: &str) -> Option<&EntityRoute> {
        self.routes.get(entity_type)
    }

    pub fn entity_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// What happened to one routed event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingOutcome {
    /// Allocated version, `None` when tracking failed or the event was rejected
    pub version: Option<i64>,
    /// Deduplicated resolved principals, sorted
    pub recipients: Vec<String>,
    /// Subscribers the channel message was queued for
    pub channel_deliveries: usize,
    /// Resolved principals the notification was queued for
    pub principal_deliveries: usize,
}

#[derive(Clone)]
pub struct SyncEventRouter {
    tracker: ChangeTracker,
    dispatcher: FanoutDispatcher,
    resolvers: Arc<ResolverRegistry>,
}

impl SyncEventRouter {
    pub fn new(
        tracker: ChangeTracker,
        dispatcher: FanoutDispatcher,
        resolvers: ResolverRegistry,
    ) -> Self {
        Self {
            tracker,
            dispatcher,
            resolvers: Arc::new(resolvers),
        }
    }

    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.resolvers
    }

    /// Fire-and-forget entry point for CRUD handlers
    ///
    /// Spawns [`SyncEventRouter::handle`] on a detached task and returns
    /// immediately. Call it after the domain write has committed.
    pub fn report_change(&self, event: ChangeEvent) {
        let router = self.clone();
        spawn_detached("sync-router", async move {
            router.handle(event).await;
        });
    }

    /// Track, resolve and publish one change event
    ///
    /// Never fails: every error is logged and reflected in the outcome.
    pub async fn handle(&self, event: ChangeEvent) -> RoutingOutcome {
        if let Err(e) = event.validate() {
            tracing::warn!(
                entity_type = %event.entity_type,
                entity_id = %event.entity_id,
                "[Router] Rejected change event: {}",
                e
            );
            return RoutingOutcome::default();
        }

        let version = match self
            .tracker
            .track_change(&event.entity_type, &event.entity_id, &event.payload, &event.actor_id)
            .await
        {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::error!(
                    entity_type = %event.entity_type,
                    entity_id = %event.entity_id,
                    "[Router] Tracking failed, notifying without a version: {}",
                    e
                );
                None
            }
        };

        let route = self.resolvers.get(&event.entity_type);
        let recipients = match route {
            Some(route) => self.resolve(route, &event).await,
            None => {
                tracing::warn!(
                    entity_type = %event.entity_type,
                    "[Router] No resolver registered; publishing to the channel only"
                );
                Vec::new()
            }
        };

        let data = json!({
            "type": event.change_type.as_str(),
            "entityType": event.entity_type,
            "entityId": event.entity_id,
            "version": version,
            "payload": redact_sensitive(&event.payload),
            "actorId": event.actor_id,
        });

        let channel = event.channel();
        let channel_deliveries = self
            .dispatcher
            .send_to_channel(
                &channel,
                ServerMessage::Channel {
                    channel: channel.clone(),
                    data: data.clone(),
                },
            )
            .await;

        let principal_deliveries = match route {
            Some(route) if !recipients.is_empty() => {
                let notification = ServerMessage::Notification {
                    payload: NotificationPayload {
                        category: route.category.clone(),
                        action: event.change_type,
                        entity_id: event.entity_id.clone(),
                        message: format!(
                            "{} has been {}",
                            route.label,
                            event.change_type.past_tense()
                        ),
                        data,
                    },
                };
                self.dispatcher
                    .send_to_principals(&recipients, notification)
                    .await
            }
            _ => 0,
        };

        tracing::debug!(
            %channel,
            ?version,
            "[Router] Routed {} event: {} channel deliveries, {}/{} principals online",
            event.change_type.as_str(),
            channel_deliveries,
            principal_deliveries,
            recipients.len()
        );

        RoutingOutcome {
            version,
            recipients,
            channel_deliveries,
            principal_deliveries,
        }
    }

    async fn resolve(&self, route: &EntityRoute, event: &ChangeEvent) -> Vec<String> {
        match route.resolver.resolve(&event.entity_id, &event.payload).await {
            Ok(principals) => principals
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            Err(e) => {
                tracing::error!(
                    entity_type = %event.entity_type,
                    entity_id = %event.entity_id,
                    "[Router] Resolver failed: {}",
                    e
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::realtime::connection::{outbound_channel, Outbound, OutboundReceiver};
    use crate::backend::realtime::ConnectionRegistry;
    use crate::backend::store::MemorySyncStore;
    use crate::shared::{ChangeType, Role};
    use pretty_assertions::assert_eq;

    struct Fixture {
        registry: ConnectionRegistry,
        router: SyncEventRouter,
    }

    fn fixture(resolvers: ResolverRegistry) -> Fixture {
        let registry = ConnectionRegistry::new();
        let tracker = ChangeTracker::from_store(Arc::new(MemorySyncStore::new()));
        let router = SyncEventRouter::new(tracker, FanoutDispatcher::new(registry.clone()), resolvers);
        Fixture { registry, router }
    }

    async fn connect(registry: &ConnectionRegistry, principal_id: &str) -> OutboundReceiver {
        let (tx, mut rx) = outbound_channel();
        registry.register(principal_id, Role::Student, tx).await;
        let _ = rx.recv().await;
        rx
    }

    async fn watch(registry: &ConnectionRegistry, principal_id: &str, channel: &str) {
        let connection = registry.connection(principal_id).await.unwrap();
        registry.subscribe(principal_id, connection.id, channel).await.unwrap();
    }

    #[tokio::test]
    async fn test_unregistered_type_publishes_channel_only() {
        let f = fixture(ResolverRegistry::new());
        let mut rx = connect(&f.registry, "watcher").await;
        watch(&f.registry, "watcher", "events:5").await;

        let outcome = f
            .router
            .handle(ChangeEvent::created("events", "5", json!({"title": "Fair"}), "admin"))
            .await;

        assert_eq!(outcome.version, Some(1));
        assert!(outcome.recipients.is_empty());
        assert_eq!(outcome.channel_deliveries, 1);
        match rx.recv().await {
            Some(Outbound::Message(ServerMessage::Channel { channel, data })) => {
                assert_eq!(channel, "events:5");
                assert_eq!(data["type"], "create");
                assert_eq!(data["version"], 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolver_failure_still_publishes_channel() {
        let mut resolvers = ResolverRegistry::new();
        resolvers.register(
            "grades",
            "grade",
            "Grade",
            FnResolver::new(|_id, _payload| async {
                Err(SyncError::resolution("grades", "connection refused"))
            }),
        );
        let f = fixture(resolvers);
        let _rx = connect(&f.registry, "watcher").await;
        watch(&f.registry, "watcher", "grades:1").await;

        let outcome = f
            .router
            .handle(ChangeEvent::updated("grades", "1", json!({}), "t1"))
            .await;
        assert_eq!(outcome.channel_deliveries, 1);
        assert_eq!(outcome.principal_deliveries, 0);
    }

    #[tokio::test]
    async fn test_recipients_are_deduplicated() {
        let mut resolvers = ResolverRegistry::new();
        resolvers.register(
            "assignments",
            "assignment",
            "Assignment",
            FnResolver::new(|_id, _payload| async {
                Ok(vec!["s1".to_string(), "t1".to_string(), "s1".to_string(), String::new()])
            }),
        );
        let f = fixture(resolvers);
        let mut s1 = connect(&f.registry, "s1").await;

        let outcome = f
            .router
            .handle(ChangeEvent::deleted("assignments", "77", "t1"))
            .await;
        assert_eq!(outcome.recipients, vec!["s1".to_string(), "t1".to_string()]);
        assert_eq!(outcome.principal_deliveries, 1);

        match s1.recv().await {
            Some(Outbound::Message(ServerMessage::Notification { payload })) => {
                assert_eq!(payload.action, ChangeType::Delete);
                assert_eq!(payload.message, "Assignment has been deleted");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(s1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_invalid_event_is_dropped() {
        let f = fixture(ResolverRegistry::new());
        let outcome = f
            .router
            .handle(ChangeEvent::updated("Bad Type", "1", json!({}), "t1"))
            .await;
        assert_eq!(outcome, RoutingOutcome::default());
    }
}
