//! Room-based publish/subscribe over live WebSocket connections.

use std::collections::HashSet;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::ServerFrame;

/// Room every connection is placed in on handshake.
pub const DEFAULT_ROOM: &str = "default";

/// Shared broadcast room used for chat relay and completion events.
pub const SHARED_CHAT_ROOM: &str = "chat";

/// Size of the per-connection send buffer. A connection whose buffer is full
/// simply misses events; delivery is best-effort.
const CONNECTION_BUFFER_SIZE: usize = 64;

/// Identity of one live connection. A reconnect gets a fresh id; identities
/// are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event hub owning all connections and their room memberships.
///
/// Rooms are created lazily on first join and destroyed when their member set
/// becomes empty. A publish observes a consistent membership snapshot: the
/// room's shard lock is held while the snapshot is taken, so a concurrent
/// join or leave is either fully visible or not at all.
pub struct EventHub {
    /// Connection id -> transport sender
    connections: DashMap<ConnectionId, mpsc::Sender<ServerFrame>>,

    /// Room name -> member set
    rooms: DashMap<String, HashSet<ConnectionId>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the connection's id and the receiver end of its send buffer;
    /// the transport task drains the receiver onto the socket.
    pub fn register_connection(&self) -> (ConnectionId, mpsc::Receiver<ServerFrame>) {
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER_SIZE);
        let id = ConnectionId::new();
        self.connections.insert(id, tx);
        tracing::debug!(connection = %id, "Registered connection");
        (id, rx)
    }

    /// Add a connection to a room. Joining twice is a no-op.
    pub fn join(&self, connection: ConnectionId, room: &str) {
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection);
        tracing::debug!(connection = %connection, room = %room, "Joined room");
    }

    /// Remove a connection from a room. Leaving a room the connection is not
    /// in is a no-op. An emptied room is dropped.
    pub fn leave(&self, connection: ConnectionId, room: &str) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&connection);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
        tracing::debug!(connection = %connection, room = %room, "Left room");
    }

    /// Remove a connection from every room it belongs to and drop its sender.
    pub fn on_disconnect(&self, connection: ConnectionId) {
        self.connections.remove(&connection);
        for mut entry in self.rooms.iter_mut() {
            entry.value_mut().remove(&connection);
        }
        self.rooms.retain(|_, members| !members.is_empty());
        tracing::debug!(connection = %connection, "Disconnected");
    }

    /// Deliver an event to every connection currently in a room.
    ///
    /// Connections joining after the membership snapshot is taken are not
    /// guaranteed delivery; there is no buffering or replay. An empty or
    /// missing room is a successful no-op. Returns the number of connections
    /// the event was handed to.
    pub fn publish(&self, room: &str, event: &str, payload: Value) -> usize {
        self.publish_except(room, event, payload, None)
    }

    /// Like [`publish`](Self::publish), but skips one connection (used to
    /// relay a client's own message to everyone else in the room).
    ///
    /// One connection's full or closed buffer does not abort delivery to the
    /// remaining members; such failures are logged and dropped.
    pub fn publish_except(
        &self,
        room: &str,
        event: &str,
        payload: Value,
        except: Option<ConnectionId>,
    ) -> usize {
        let members: Vec<ConnectionId> = match self.rooms.get(room) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for member in members {
            if Some(member) == except {
                continue;
            }
            let Some(tx) = self.connections.get(&member) else {
                continue;
            };
            let frame = ServerFrame::new(event, payload.clone());
            match tx.try_send(frame) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        connection = %member,
                        room = %room,
                        event = %event,
                        error = %e,
                        "Dropped event for connection"
                    );
                }
            }
        }

        tracing::debug!(room = %room, event = %event, delivered, "Published event");
        delivered
    }

    /// Send a frame to one specific connection.
    pub fn send_to(&self, connection: ConnectionId, frame: ServerFrame) -> bool {
        match self.connections.get(&connection) {
            Some(tx) => tx.try_send(frame).is_ok(),
            None => false,
        }
    }

    /// Snapshot of a room's membership. Empty when the room does not exist.
    pub fn room_members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// All rooms a connection currently belongs to.
    pub fn rooms_of(&self, connection: ConnectionId) -> Vec<String> {
        self.rooms
            .iter()
            .filter_map(|entry| {
                if entry.value().contains(&connection) {
                    Some(entry.key().clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
