//! WebSocket upgrade handler and per-connection event loop.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;

use crate::gateway::AppState;

use super::hub::{ConnectionId, EventHub, DEFAULT_ROOM, SHARED_CHAT_ROOM};
use super::types::{ClientFrame, ServerFrame};

/// WebSocket upgrade handler.
///
/// GET /ws
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, hub))
}

/// Drive one connection from handshake to disconnect.
async fn handle_connection(socket: WebSocket, hub: Arc<EventHub>) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut event_rx) = hub.register_connection();

    // Every connection starts in the default room and the shared chat room.
    hub.join(conn_id, DEFAULT_ROOM);
    hub.join(conn_id, SHARED_CHAT_ROOM);

    let connected = ServerFrame::new("connected", json!({"data": "Connected to server"}));
    let connected_json = match serde_json::to_string(&connected) {
        Ok(j) => j,
        Err(e) => {
            tracing::error!(connection = %conn_id, error = %e, "Failed to serialize handshake");
            hub.on_disconnect(conn_id);
            return;
        }
    };
    if sender.send(Message::Text(connected_json)).await.is_err() {
        tracing::warn!(connection = %conn_id, "Connection closed during handshake");
        hub.on_disconnect(conn_id);
        return;
    }

    tracing::info!(connection = %conn_id, "Client connected");

    // Pump hub events onto the socket.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = event_rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(j) => j,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to serialize event frame");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    // Read client frames until the transport drops.
    while let Some(msg_result) = receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => handle_frame(&hub, conn_id, frame),
                Err(e) => {
                    tracing::warn!(connection = %conn_id, error = %e, "Unparseable client frame");
                }
            },
            Ok(Message::Binary(_)) => {
                tracing::debug!(connection = %conn_id, "Ignoring binary message");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                tracing::info!(connection = %conn_id, "Client closed connection");
                break;
            }
            Err(e) => {
                tracing::warn!(connection = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    send_task.abort();
    hub.on_disconnect(conn_id);
    tracing::info!(connection = %conn_id, "Client disconnected");
}

/// Apply one client frame to the hub.
fn handle_frame(hub: &EventHub, conn_id: ConnectionId, frame: ClientFrame) {
    match frame {
        ClientFrame::Join { room } => {
            hub.join(conn_id, &room);
        }

        ClientFrame::Leave { room } => {
            hub.leave(conn_id, &room);
        }

        ClientFrame::ChatMessage(data) => {
            let room = data
                .get("room")
                .and_then(|r| r.as_str())
                .unwrap_or(SHARED_CHAT_ROOM)
                .to_string();
            hub.publish_except(&room, "chat_message", data, Some(conn_id));
        }

        ClientFrame::UserJoin { token, name } => {
            // Presence is only announced for authenticated clients.
            if token.is_some() {
                hub.join(conn_id, SHARED_CHAT_ROOM);
                hub.publish(
                    SHARED_CHAT_ROOM,
                    "user_joined",
                    json!({"name": name, "connection": conn_id.to_string()}),
                );
            } else {
                tracing::debug!(connection = %conn_id, "user_join without token ignored");
            }
        }

        ClientFrame::ChatEvents(_) => {
            // Client-side echo of completion events carries no server action.
        }
    }
}
