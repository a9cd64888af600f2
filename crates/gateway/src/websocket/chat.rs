//! WebSocket transport for the messaging core.
//!
//! The session token is authenticated at upgrade time and the identity is
//! derived from it exclusively; a `join` carrying a different identity is a
//! protocol violation. Each connection runs a read loop in the upgrade task
//! plus a writer task draining the per-connection outbound channel.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
};
use futures_util::{Sink, SinkExt, StreamExt};
use lynk_messaging::{
    ClientEvent, Connection, MessagingError, MessagingResult, OutboundSender, RejectReason,
    SendRequest, ServerEvent,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    pub token: Option<String>,
}

/// Upgrade handler: authenticate, then hand the socket to the session loop.
pub async fn chat_websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    let token = query.token.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned)
    });

    let Some(token) = token else {
        return GatewayError::AuthenticationFailed(
            "WebSocket connection requires a session token".to_string(),
        )
        .into_response();
    };

    match state.authenticator().authenticate_token(&token).await {
        Ok((user, _session)) => {
            let identity = user.public_id;
            ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
        }
        Err(err) => GatewayError::from(err).into_response(),
    }
}

/// One session: read loop here, writer task draining the outbound channel.
async fn handle_socket(socket: WebSocket, state: Arc<GatewayState>, identity: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerEvent>();
    let mut connection = Connection::new();

    info!(identity = %identity, connection = %connection.id(), "websocket connected");

    let write_task = tokio::spawn(forward_outbound(ws_tx, outbound_rx));

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => {
                let event = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        debug!(identity = %identity, error = %err, "unparseable event");
                        let _ = outbound_tx.send(ServerEvent::SendRejected {
                            reason: RejectReason::ValidationFailure,
                            detail: "malformed event payload".to_string(),
                        });
                        continue;
                    }
                };

                match dispatch(&state, &mut connection, &identity, &outbound_tx, event).await {
                    Ok(()) => {}
                    Err(err) if err.is_fatal() => {
                        warn!(
                            identity = %identity,
                            connection = %connection.id(),
                            error = %err,
                            "protocol violation, closing connection"
                        );
                        let _ = outbound_tx.send(ServerEvent::Error {
                            reason: err.reason(),
                            detail: err.detail().to_string(),
                        });
                        break;
                    }
                    Err(err) => {
                        let _ = outbound_tx.send(ServerEvent::SendRejected {
                            reason: err.reason(),
                            detail: err.detail().to_string(),
                        });
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    connection.close();
    state.registry.leave(connection.id()).await;
    // Dropping the last sender closes the channel; the writer flushes any
    // queued frames (including a final error event) before exiting.
    drop(outbound_tx);
    let _ = write_task.await;

    info!(identity = %identity, connection = %connection.id(), "websocket disconnected");
}

/// Drains the outbound channel into the socket until every sender is gone
/// and the queue is empty.
async fn forward_outbound<S>(mut ws_tx: S, mut outbound_rx: mpsc::UnboundedReceiver<ServerEvent>)
where
    S: Sink<Message> + Unpin,
{
    while let Some(event) = outbound_rx.recv().await {
        let Ok(text) = serde_json::to_string(&event) else {
            continue;
        };
        if ws_tx.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

async fn dispatch(
    state: &GatewayState,
    connection: &mut Connection,
    identity: &str,
    outbound: &OutboundSender,
    event: ClientEvent,
) -> MessagingResult<()> {
    match event {
        ClientEvent::Join { identity: claimed } => {
            if let Some(claimed) = claimed {
                if claimed != identity {
                    return Err(MessagingError::ProtocolViolation(format!(
                        "claimed identity '{claimed}' does not match session"
                    )));
                }
            }

            connection.bind(identity.to_string())?;
            let joined = connection.join()?;
            state
                .registry
                .join(&joined, connection.id(), outbound.clone())
                .await;
            Ok(())
        }
        ClientEvent::SendMessage {
            from_user,
            to_user,
            kind,
            body,
            attachment_url,
        } => {
            let sender = connection.joined_identity()?.to_string();
            state
                .router
                .send(
                    &sender,
                    SendRequest {
                        from_user,
                        to_user,
                        kind,
                        body,
                        attachment_url,
                    },
                )
                .await?;
            Ok(())
        }
        ClientEvent::Typing { from, to } => {
            let sender = connection.joined_identity()?;
            state.presence.typing(sender, &from, &to).await?;
            Ok(())
        }
        ClientEvent::StopTyping { from, to } => {
            let sender = connection.joined_identity()?;
            state.presence.stop_typing(sender, &from, &to).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lynk_config::AppConfig;
    use lynk_database::MessageKind;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn test_state() -> Arc<GatewayState> {
        let mut config = AppConfig::default();
        config.database.url = "sqlite://:memory:".to_string();
        config.database.max_connections = 1;
        Arc::new(GatewayState::from_config(&config).await.unwrap())
    }

    fn channel() -> (OutboundSender, UnboundedReceiver<ServerEvent>) {
        mpsc::unbounded_channel()
    }

    async fn joined_connection(
        state: &GatewayState,
        identity: &str,
    ) -> (Connection, UnboundedReceiver<ServerEvent>) {
        let mut connection = Connection::new();
        let (tx, rx) = channel();
        dispatch(
            state,
            &mut connection,
            identity,
            &tx,
            ClientEvent::Join { identity: None },
        )
        .await
        .unwrap();
        (connection, rx)
    }

    #[tokio::test]
    async fn join_binds_and_registers() {
        let state = test_state().await;
        let (connection, _rx) = joined_connection(&state, "u1").await;

        assert!(connection.is_joined());
        assert_eq!(state.registry.connection_count("u1").await, 1);
    }

    #[tokio::test]
    async fn join_with_mismatched_identity_is_fatal() {
        let state = test_state().await;
        let mut connection = Connection::new();
        let (tx, _rx) = channel();

        let err = dispatch(
            &state,
            &mut connection,
            "u1",
            &tx,
            ClientEvent::Join {
                identity: Some("u2".to_string()),
            },
        )
        .await
        .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(state.registry.connection_count("u1").await, 0);
    }

    #[tokio::test]
    async fn second_join_is_a_protocol_violation() {
        let state = test_state().await;
        let (mut connection, _rx) = joined_connection(&state, "u1").await;
        let (tx, _rx2) = channel();

        let err = dispatch(
            &state,
            &mut connection,
            "u1",
            &tx,
            ClientEvent::Join { identity: None },
        )
        .await
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn send_before_join_is_rejected() {
        let state = test_state().await;
        let mut connection = Connection::new();
        let (tx, _rx) = channel();

        let err = dispatch(
            &state,
            &mut connection,
            "u1",
            &tx,
            ClientEvent::SendMessage {
                from_user: None,
                to_user: "u2".to_string(),
                kind: MessageKind::Text,
                body: "hi".to_string(),
                attachment_url: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MessagingError::ProtocolViolation(_)));
    }

    #[tokio::test]
    async fn send_after_join_reaches_recipient() {
        let state = test_state().await;
        let (mut sender_conn, mut sender_rx) = joined_connection(&state, "u1").await;
        let (_recipient_conn, mut recipient_rx) = joined_connection(&state, "u2").await;
        let (tx, _rx) = channel();

        dispatch(
            &state,
            &mut sender_conn,
            "u1",
            &tx,
            ClientEvent::SendMessage {
                from_user: None,
                to_user: "u2".to_string(),
                kind: MessageKind::Text,
                body: "hi".to_string(),
                attachment_url: None,
            },
        )
        .await
        .unwrap();

        match recipient_rx.try_recv().unwrap() {
            ServerEvent::ReceiveMessage { message } => {
                assert_eq!(message.body, "hi");
                assert_eq!(message.from_user, "u1");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // The sender's registered channel sees the echo and the ack.
        assert!(matches!(
            sender_rx.try_recv().unwrap(),
            ServerEvent::ReceiveMessage { .. }
        ));
        assert!(matches!(
            sender_rx.try_recv().unwrap(),
            ServerEvent::MessageDelivered { .. }
        ));
    }

    #[tokio::test]
    async fn writer_flushes_queued_error_frame_before_exiting() {
        let (sink_tx, mut sink_rx) = futures_channel::mpsc::unbounded::<Message>();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(forward_outbound(sink_tx, outbound_rx));

        // Teardown order on a protocol violation: enqueue the error frame,
        // then close the channel by dropping the sender, then await.
        outbound_tx
            .send(ServerEvent::Error {
                reason: RejectReason::ProtocolViolation,
                detail: "claimed identity 'u2' does not match session".to_string(),
            })
            .unwrap();
        drop(outbound_tx);
        writer.await.unwrap();

        let Some(Message::Text(text)) = sink_rx.next().await else {
            panic!("expected the error frame to reach the socket");
        };
        assert!(text.contains("\"type\":\"error\""));
        assert!(text.contains("protocolViolation"));
        assert!(sink_rx.next().await.is_none());
    }

    #[tokio::test]
    async fn typing_requires_joined_state() {
        let state = test_state().await;
        let mut connection = Connection::new();
        let (tx, _rx) = channel();

        let err = dispatch(
            &state,
            &mut connection,
            "u1",
            &tx,
            ClientEvent::Typing {
                from: "u1".to_string(),
                to: "u2".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MessagingError::ProtocolViolation(_)));
    }
}
