//! Wire protocol for the WebSocket relay.
//!
//! Every frame is a JSON text message of the shape
//! `{"event": <name>, "data": <payload>}` in both directions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent from client to server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Request membership in a room.
    Join { room: String },

    /// Drop membership in a room.
    Leave { room: String },

    /// Free-form chat message, relayed to the other members of its room.
    /// The payload may carry a `room` field; defaults to the shared chat room.
    ChatMessage(Value),

    /// Presence announcement. When an auth token is present the connection
    /// joins the shared chat room and a `user_joined` event is broadcast.
    UserJoin {
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },

    /// Completion-event echo from the client; accepted and ignored.
    #[serde(alias = "chat-events")]
    ChatEvents(Value),
}

/// A frame sent from server to client.
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    pub event: String,
    pub data: Value,
}

impl ServerFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Server-originated completion notification, published to the shared chat
/// room under the `chat-events` event name.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionEvent {
    pub chat_id: String,
    pub message_id: String,
    pub data: ChatEventEnvelope,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatEventEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: CompletionPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionPayload {
    pub done: bool,
    pub content: String,
    pub title: String,
}

impl ChatCompletionEvent {
    /// Build a completed-chat notification.
    ///
    /// Correlation ids default to "default" when the originating request did
    /// not carry them, matching what web clients expect.
    pub fn completed(
        chat_id: Option<&str>,
        message_id: Option<&str>,
        content: String,
        title: String,
    ) -> Self {
        Self {
            chat_id: chat_id.unwrap_or("default").to_string(),
            message_id: message_id.unwrap_or("default").to_string(),
            data: ChatEventEnvelope {
                kind: "chat:completion".to_string(),
                data: CompletionPayload {
                    done: true,
                    content,
                    title,
                },
            },
        }
    }
}
