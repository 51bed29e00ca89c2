//! Real-time event relay over WebSocket.
//!
//! Clients hold one persistent connection, join named rooms, and receive
//! both relayed client messages and server-originated completion events.

mod handler;
mod hub;
pub mod types;

pub use handler::ws_handler;
pub use hub::{ConnectionId, EventHub, DEFAULT_ROOM, SHARED_CHAT_ROOM};
pub use types::{ChatCompletionEvent, ClientFrame, ServerFrame};
