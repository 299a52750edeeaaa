/**
 * Real-time Event System
 *
 * This module defines the messages that flow through the notification
 * layer:
 *
 * - `ChangeEvent` - the in-process event a CRUD collaborator reports after a
 *   domain write commits
 * - `ClientMessage` - control messages a WebSocket client may send
 * - `ServerMessage` - everything the server pushes to a WebSocket client
 * - `CloseReason` - why the server closed a socket, with its close code
 *
 * All wire messages are JSON objects discriminated by a `type` field.
 */
use serde::{Deserialize, Serialize};

use crate::shared::change::{channel_name, validate_entity_type, SYSTEM_ACTOR};
use crate::shared::error::SharedError;
use crate::shared::principal::Role;

/// Kind of domain mutation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

impl ChangeType {
    /// Wire name of the change type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Past participle used in human-readable notifications
    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Create => "created",
            Self::Update => "updated",
            Self::Delete => "deleted",
        }
    }
}

/// A domain change reported by a CRUD collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Create, update or delete
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// Entity type of the changed record (e.g. `grades`)
    pub entity_type: String,
    /// Domain identifier of the changed record
    pub entity_id: String,
    /// Mutated fields; sensitive keys are stripped before persisting
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Principal who caused the change
    #[serde(default = "system_actor")]
    pub actor_id: String,
}

fn system_actor() -> String {
    SYSTEM_ACTOR.to_string()
}

impl ChangeEvent {
    /// Create a new change event
    pub fn new(
        change_type: ChangeType,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            change_type,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            payload,
            actor_id: actor_id.into(),
        }
    }

    pub fn created(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
        actor_id: impl Into<String>,
    ) -> Self {
        Self::new(ChangeType::Create, entity_type, entity_id, payload, actor_id)
    }

    pub fn updated(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
        actor_id: impl Into<String>,
    ) -> Self {
        Self::new(ChangeType::Update, entity_type, entity_id, payload, actor_id)
    }

    pub fn deleted(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self::new(
            ChangeType::Delete,
            entity_type,
            entity_id,
            serde_json::Value::Null,
            actor_id,
        )
    }

    /// Channel that mirrors this entity: `"{entity_type}:{entity_id}"`
    pub fn channel(&self) -> String {
        channel_name(&self.entity_type, &self.entity_id)
    }

    /// Validate the event before it is routed
    pub fn validate(&self) -> Result<(), SharedError> {
        validate_entity_type(&self.entity_type)?;
        if self.entity_id.is_empty() {
            return Err(SharedError::validation("entity_id", "must not be empty"));
        }
        if self.actor_id.is_empty() {
            return Err(SharedError::validation("actor_id", "must not be empty"));
        }
        Ok(())
    }
}

/// Payload of a principal-targeted notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// Singular category of the entity (e.g. `grade`)
    pub category: String,
    /// What happened to the entity
    pub action: ChangeType,
    pub entity_id: String,
    /// Human-readable summary, e.g. "Grade has been updated"
    pub message: String,
    pub data: serde_json::Value,
}

/// Messages pushed from the server to a WebSocket client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Handshake acknowledgment
    Connected { user_id: String, role: Role },
    /// Reply to `ping`
    Pong,
    Subscribed { channel: String },
    Unsubscribed { channel: String },
    /// Channel fan-out
    Channel {
        channel: String,
        data: serde_json::Value,
    },
    /// Principal-targeted notification
    Notification { payload: NotificationPayload },
    /// Inline error acknowledgment; the socket stays open
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire name of the message, used for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Pong => "pong",
            Self::Subscribed { .. } => "subscribed",
            Self::Unsubscribed { .. } => "unsubscribed",
            Self::Channel { .. } => "channel",
            Self::Notification { .. } => "notification",
            Self::Error { .. } => "error",
        }
    }
}

/// Control messages accepted from a WebSocket client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping,
    Subscribe { channel: String },
    Unsubscribe { channel: String },
}

impl ClientMessage {
    /// Parse and validate a text frame
    pub fn parse(text: &str) -> Result<Self, SharedError> {
        let message: ClientMessage = serde_json::from_str(text)?;
        match &message {
            Self::Subscribe { channel } | Self::Unsubscribe { channel } if channel.trim().is_empty() => {
                Err(SharedError::validation("channel", "must not be empty"))
            }
            _ => Ok(message),
        }
    }
}

/// Why the server closed a WebSocket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// No `token` query parameter on the handshake
    MissingCredential,
    /// Token failed verification, expired or was revoked
    InvalidCredential,
    /// A newer connection for the same principal replaced this one
    Superseded,
    /// The principal logged out
    LoggedOut,
    ServerShutdown,
}

impl CloseReason {
    /// WebSocket close code sent with the close frame
    pub fn code(&self) -> u16 {
        match self {
            Self::MissingCredential => 4001,
            Self::InvalidCredential => 4002,
            Self::Superseded => 4003,
            Self::LoggedOut => 4004,
            Self::ServerShutdown => 1001,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing credential",
            Self::InvalidCredential => "invalid or expired credential",
            Self::Superseded => "superseded by a new connection",
            Self::LoggedOut => "logged out",
            Self::ServerShutdown => "server shutting down",
        }
    }
}
