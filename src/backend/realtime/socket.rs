/**
 * WebSocket Transport
 *
 * This module implements the `/ws` endpoint: handshake authentication,
 * control messages, and the per-socket writer task that drains the
 * connection's outbound queue.
 *
 * # Handshake
 *
 * The client passes its bearer token as `?token=`. Without one the socket is
 * closed with 4001; an invalid, expired or revoked token closes it with 4002.
 * On success the principal is registered (superseding any earlier socket,
 * which is closed with 4003) and receives `{type:"connected"}`.
 *
 * # Control Messages
 *
 * | client | server |
 * |---|---|
 * | `{type:"ping"}` | `{type:"pong"}` |
 * | `{type:"subscribe", channel}` | `{type:"subscribed", channel}` or `{type:"error"}` |
 * | `{type:"unsubscribe", channel}` | `{type:"unsubscribed", channel}` or `{type:"error"}` |
 *
 * Anything else, binary frames included, gets `{type:"error", message}` and
 * the socket stays open.
 *
 * # Connection Management
 *
 * Every frame the server sends goes through the connection's queue and is
 * written by exactly one task, so replies and notifications never interleave
 * out of order. When either half stops, the other is aborted and the
 * connection is released from the registry.
 */

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::backend::auth::PrincipalAuthenticator;
use crate::backend::realtime::connection::{outbound_channel, Connection, Outbound, OutboundReceiver};
use crate::backend::realtime::registry::ConnectionRegistry;
use crate::backend::server::state::AppState;
use crate::shared::{ClientMessage, CloseReason, Principal, ServerMessage};

/// Query parameters of the WebSocket handshake
#[derive(Debug, Default, Deserialize)]
pub struct SocketParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// Handle a WebSocket upgrade (GET /ws?token=...)
pub async fn handle_socket_upgrade(
    State(state): State<AppState>,
    Query(params): Query<SocketParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_socket(socket, state, params.token))
}

/// Verify the handshake credential
///
/// # Returns
///
/// The authenticated principal, or the close reason to send
pub async fn authenticate_handshake(
    authenticator: &dyn PrincipalAuthenticator,
    token: Option<&str>,
) -> Result<Principal, CloseReason> {
    let token = match token.map(str::trim) {
        Some(token) if !token.is_empty() => token,
        _ => return Err(CloseReason::MissingCredential),
    };

    authenticator.authenticate(token).await.map_err(|e| {
        tracing::warn!("[Socket] Handshake rejected: {}", e);
        CloseReason::InvalidCredential
    })
}

/// Answer one text frame read from `connection`
///
/// Subscription changes apply to that connection only; once it has been
/// superseded they are answered with an error.
pub async fn handle_client_message(
    registry: &ConnectionRegistry,
    connection: &Connection,
    text: &str,
) -> ServerMessage {
    let principal_id = connection.principal_id.as_str();
    let message = match ClientMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(principal_id, "[Socket] Malformed client message: {}", e);
            return ServerMessage::error(format!("Malformed message: {}", e));
        }
    };

    match message {
        ClientMessage::Ping => ServerMessage::Pong,
        ClientMessage::Subscribe { channel } => {
            match registry.subscribe(principal_id, connection.id, &channel).await {
                Ok(()) => ServerMessage::Subscribed { channel },
                Err(e) => ServerMessage::error(e.to_string()),
            }
        }
        ClientMessage::Unsubscribe { channel } => {
            match registry.unsubscribe(principal_id, connection.id, &channel).await {
                Ok(()) => ServerMessage::Unsubscribed { channel },
                Err(e) => ServerMessage::error(e.to_string()),
            }
        }
    }
}

fn close_frame(reason: CloseReason) -> Message {
    Message::Close(Some(CloseFrame {
        code: reason.code(),
        reason: reason.reason().into(),
    }))
}

async fn run_socket(mut socket: WebSocket, state: AppState, token: Option<String>) {
    let principal =
        match authenticate_handshake(state.authenticator.as_ref(), token.as_deref()).await {
            Ok(principal) => principal,
            Err(reason) => {
                tracing::info!(code = reason.code(), "[Socket] Closing unauthenticated socket");
                if let Err(e) = socket.send(close_frame(reason)).await {
                    tracing::debug!("[Socket] Could not send close frame: {}", e);
                }
                return;
            }
        };

    let registry = state.sync.registry().clone();
    let (tx, rx) = outbound_channel();
    let connection = registry.register(&principal.id, principal.role, tx).await;
    let (sink, stream) = socket.split();

    let mut writer = tokio::spawn(write_outbound(sink, rx, principal.id.clone()));
    let mut reader = tokio::spawn(read_inbound(stream, registry.clone(), connection.clone()));

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    registry.release(&principal.id, connection.id).await;
    tracing::info!(
        principal_id = %principal.id,
        connection_id = %connection.id,
        "[Socket] Socket closed"
    );
}

async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: OutboundReceiver,
    principal_id: String,
) {
    while let Some(item) = rx.recv().await {
        let frame = match item {
            Outbound::Message(message) => match serde_json::to_string(&message) {
                Ok(json) => Message::Text(json.into()),
                Err(e) => {
                    tracing::error!(
                        %principal_id,
                        kind = message.kind(),
                        "[Socket] Failed to serialize message: {}",
                        e
                    );
                    continue;
                }
            },
            Outbound::Close(reason) => {
                tracing::info!(%principal_id, code = reason.code(), "[Socket] Closing socket");
                if let Err(e) = sink.send(close_frame(reason)).await {
                    tracing::debug!(%principal_id, "[Socket] Could not send close frame: {}", e);
                }
                return;
            }
        };

        if let Err(e) = sink.send(frame).await {
            tracing::debug!(%principal_id, "[Socket] Write failed: {}", e);
            return;
        }
    }
}

async fn read_inbound(
    mut stream: SplitStream<WebSocket>,
    registry: ConnectionRegistry,
    connection: Connection,
) {
    while let Some(frame) = stream.next().await {
        let reply = match frame {
            Ok(Message::Text(text)) => {
                handle_client_message(&registry, &connection, text.as_str()).await
            }
            Ok(Message::Binary(_)) => ServerMessage::error("Binary frames are not supported"),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => return,
            Err(e) => {
                tracing::debug!(
                    principal_id = %connection.principal_id,
                    "[Socket] Read failed: {}",
                    e
                );
                return;
            }
        };

        if connection.send(reply).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::auth::JwtAuthenticator;
    use crate::backend::realtime::FanoutDispatcher;
    use crate::shared::Role;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_handshake_close_reasons() {
        let auth = JwtAuthenticator::new("socket-secret");
        assert_eq!(
            authenticate_handshake(&auth, None).await,
            Err(CloseReason::MissingCredential)
        );
        assert_eq!(
            authenticate_handshake(&auth, Some("  ")).await,
            Err(CloseReason::MissingCredential)
        );
        assert_eq!(
            authenticate_handshake(&auth, Some("not-a-jwt")).await,
            Err(CloseReason::InvalidCredential)
        );

        let token = auth.create_token("s1", Role::Student).unwrap();
        auth.revoke(&token).await.unwrap();
        assert_eq!(
            authenticate_handshake(&auth, Some(&token)).await,
            Err(CloseReason::InvalidCredential)
        );
    }

    #[tokio::test]
    async fn test_handshake_accepts_valid_token() {
        let auth = JwtAuthenticator::new("socket-secret");
        let token = auth.create_token("s1", Role::Student).unwrap();
        let principal = authenticate_handshake(&auth, Some(&token)).await.unwrap();
        assert_eq!(principal.id, "s1");
        assert_eq!(principal.role, Role::Student);
    }

    #[tokio::test]
    async fn test_control_messages() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = outbound_channel();
        let s1 = registry.register("s1", Role::Student, tx).await;

        assert_eq!(
            handle_client_message(&registry, &s1, r#"{"type":"ping"}"#).await,
            ServerMessage::Pong
        );
        assert_eq!(
            handle_client_message(&registry, &s1, r#"{"type":"subscribe","channel":"grades:42"}"#)
                .await,
            ServerMessage::Subscribed {
                channel: "grades:42".to_string()
            }
        );
        assert!(registry.subscribers_of("grades:42").await.contains("s1"));
        assert_eq!(
            handle_client_message(&registry, &s1, r#"{"type":"unsubscribe","channel":"grades:42"}"#)
                .await,
            ServerMessage::Unsubscribed {
                channel: "grades:42".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_messages_get_error_reply() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = outbound_channel();
        let s1 = registry.register("s1", Role::Student, tx).await;
        for text in ["not json", r#"{"type":"dance"}"#, r#"{"type":"subscribe","channel":""}"#] {
            assert_matches!(
                handle_client_message(&registry, &s1, text).await,
                ServerMessage::Error { .. }
            );
        }
    }

    #[tokio::test]
    async fn test_subscribe_without_connection_is_an_error() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = outbound_channel();
        let ghost = Connection::new("ghost", Role::Student, tx);
        assert_matches!(
            handle_client_message(&registry, &ghost, r#"{"type":"subscribe","channel":"a:1"}"#)
                .await,
            ServerMessage::Error { .. }
        );
    }

    #[tokio::test]
    async fn test_superseded_socket_cannot_subscribe_for_its_replacement() {
        let registry = ConnectionRegistry::new();
        let dispatcher = FanoutDispatcher::new(registry.clone());
        let (old_tx, _old_rx) = outbound_channel();
        let old = registry.register("u1", Role::Student, old_tx).await;
        let (new_tx, mut new_rx) = outbound_channel();
        registry.register("u1", Role::Student, new_tx).await;
        let _ack = new_rx.recv().await;

        assert_matches!(
            handle_client_message(&registry, &old, r#"{"type":"subscribe","channel":"grades:7"}"#)
                .await,
            ServerMessage::Error { .. }
        );
        assert!(registry.subscribers_of("grades:7").await.is_empty());
        assert_eq!(dispatcher.send_to_channel("grades:7", ServerMessage::Pong).await, 0);
        assert!(new_rx.try_recv().is_err());
    }
}
