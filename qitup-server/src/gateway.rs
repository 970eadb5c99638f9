//! The live connection of a party member.
//!
//! A member opens it with the connect url from joining or creating a party.
//! The token is redeemed before upgrading, so an expired url is answered
//! with a regular error response.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use log::debug;
use qitup_collab::{ClientTransport, ConnectedClient, SessionMessage, TransportError};
use qitup_core::Item;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{context::ServerContext, errors::ServerResult};

/// Messages a client can send
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "queue.push")]
    QueuePush { item: Item },
    #[serde(rename = "player.play")]
    PlayerPlay,
    #[serde(rename = "player.pause")]
    PlayerPause,
    #[serde(rename = "player.next")]
    PlayerNext,
}

enum Outgoing {
    Text(String),
    Close,
}

/// Hands session messages to the task writing to the socket
struct SocketTransport {
    outgoing: UnboundedSender<Outgoing>,
}

impl ClientTransport for SocketTransport {
    fn send(&self, payload: String) -> Result<(), TransportError> {
        self.outgoing
            .send(Outgoing::Text(payload))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self) {
        let _ = self.outgoing.send(Outgoing::Close);
    }
}

/// A client attached to its session. Dropping it detaches the client, so a
/// connection whose upgrade never completes is not left behind.
struct Attached(ConnectedClient);

impl Drop for Attached {
    fn drop(&mut self) {
        let client = &self.0;
        client.session.client_disconnected(client.connection_id);

        debug!(
            "Socket of {} closed for party {}",
            client.user_id,
            client.session.party_id()
        );
    }
}

pub async fn connect(
    ws: WebSocketUpgrade,
    State(context): State<ServerContext>,
    Path(token): Path<String>,
) -> ServerResult<Response> {
    let (sender, outgoing) = unbounded_channel();
    let transport = Arc::new(SocketTransport { outgoing: sender });

    let client = context
        .collab
        .parties
        .connect(&token, transport.clone())
        .await?;

    let attached = Attached(client);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, attached, transport, outgoing)))
}

async fn handle_socket(
    socket: WebSocket,
    attached: Attached,
    transport: Arc<SocketTransport>,
    outgoing: UnboundedReceiver<Outgoing>,
) {
    let client = &attached.0;

    debug!(
        "Socket of {} opened for party {}",
        client.user_id,
        client.session.party_id()
    );

    let (sink, stream) = socket.split();
    let forwarding = tokio::spawn(forward_outgoing(sink, outgoing));

    process_incoming(stream, client, &transport).await;

    forwarding.abort();
}

async fn forward_outgoing(
    mut sink: SplitSink<WebSocket, Message>,
    mut outgoing: UnboundedReceiver<Outgoing>,
) {
    while let Some(message) = outgoing.recv().await {
        match message {
            Outgoing::Text(payload) => {
                if sink.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            Outgoing::Close => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

async fn process_incoming(
    mut stream: SplitStream<WebSocket>,
    client: &ConnectedClient,
    transport: &SocketTransport,
) {
    while let Some(result) = stream.next().await {
        let text = match result {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Socket error from {}: {}", client.user_id, e);
                break;
            }
        };

        let reply = match parse(&text) {
            Ok(message) => handle_message(message, client).await,
            Err(error) => Some(error),
        };

        if let Some(reply) = reply {
            if transport.send(reply.to_json()).is_err() {
                break;
            }
        }
    }
}

/// Tells malformed JSON apart from well-formed messages that mean nothing
fn parse(text: &str) -> Result<ClientMessage, SessionMessage> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| SessionMessage::error("invalid_json", e.to_string()))?;

    serde_json::from_value(value).map_err(|e| SessionMessage::error("invalid_message", e.to_string()))
}

async fn handle_message(message: ClientMessage, client: &ConnectedClient) -> Option<SessionMessage> {
    let session = &client.session;

    let result = match message {
        ClientMessage::Ping => {
            return Some(SessionMessage::Pong {
                time: Utc::now().timestamp_millis(),
            })
        }
        ClientMessage::QueuePush { item } => session.push(item, client.user_id.clone()).await,
        ClientMessage::PlayerPlay => session.play().await,
        ClientMessage::PlayerPause => session.pause().await,
        ClientMessage::PlayerNext => session.next().await,
    };

    result
        .err()
        .map(|e| SessionMessage::error(e.code(), e.to_string()))
}

#[cfg(test)]
mod test {
    use qitup_collab::{Collab, MemoryDatabase, MemoryStore, NewUser, Players};
    use qitup_core::Config;

    use super::*;

    fn error_code(text: &str) -> Option<String> {
        match parse(text) {
            Err(SessionMessage::Error { error }) => Some(error.code.to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_parse_client_messages() {
        assert!(matches!(parse(r#"{"type": "ping"}"#), Ok(ClientMessage::Ping)));
        assert!(matches!(
            parse(r#"{"type": "player.next"}"#),
            Ok(ClientMessage::PlayerNext)
        ));

        let Ok(ClientMessage::QueuePush { item }) = parse(
            r#"{"type": "queue.push", "item": {"type": "spotify_episode", "uri": "spotify:episode:9"}}"#,
        ) else {
            panic!("expected a push");
        };
        assert_eq!(item.source_key(), "spotify:episode:9");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(error_code("{not json").as_deref(), Some("invalid_json"));
        assert_eq!(
            error_code(r#"{"type": "player.rewind"}"#).as_deref(),
            Some("invalid_message")
        );
        assert_eq!(
            error_code(r#"{"type": "queue.push"}"#).as_deref(),
            Some("invalid_message")
        );
    }

    #[tokio::test]
    async fn test_dropped_upgrade_detaches_client() {
        let collab = Collab::new(
            Config::default(),
            Arc::new(MemoryDatabase::new()),
            Arc::new(MemoryStore::new()),
            Players::new(),
        );

        let host = collab
            .database()
            .create_user(NewUser {
                display_name: "host".into(),
            })
            .await
            .unwrap();

        let connect = collab
            .parties
            .create_party(&host, "Party".into(), "CODE".into(), Default::default())
            .await
            .unwrap();

        let (sender, _outgoing) = unbounded_channel();
        let transport = Arc::new(SocketTransport { outgoing: sender });

        let client = collab
            .parties
            .connect(&connect.token, transport)
            .await
            .unwrap();
        let session = client.session.clone();

        let attached = Attached(client);
        assert_eq!(session.status().await.unwrap().clients, vec![host.id.clone()]);

        // As when the upgrade callback is discarded without running
        drop(attached);
        assert!(session.status().await.unwrap().clients.is_empty());
    }
}
