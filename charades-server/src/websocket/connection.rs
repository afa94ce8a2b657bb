use charades_core::RoomCode;
use charades_types::{PlayerId, ServerMessage};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Connection not found")]
    NotFound,
    #[error("Connection closed")]
    Closed,
    #[error("Player {0} is not connected")]
    PlayerNotConnected(PlayerId),
}

/// The (room, player) a socket speaks for, set by its `join-game`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_code: RoomCode,
    pub user_id: PlayerId,
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub binding: Option<Binding>,
    pub last_activity: Instant,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            id,
            binding: None,
            last_activity: Instant::now(),
            sender,
        };

        (connection, receiver)
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), ConnectionError> {
        self.sender
            .send(message)
            .map_err(|_| ConnectionError::Closed)
    }

    pub fn is_inactive(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

/// Live sockets and which room member each one speaks for. A player id maps to
/// at most one socket per room; binding a new socket displaces the old one.
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    members: RwLock<HashMap<RoomCode, HashMap<PlayerId, ConnectionId>>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            members: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_connection(
        &self,
        id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (conn, receiver) = Connection::new(id);

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, conn);
        }

        receiver
    }

    /// Drops the socket. Returns its binding if the socket still owned it, so
    /// the caller can run the leave flow for that player.
    pub async fn remove_connection(&self, id: ConnectionId) -> Option<Binding> {
        let binding = {
            let mut connections = self.connections.write().await;
            connections.remove(&id).and_then(|conn| conn.binding)
        }?;

        let mut members = self.members.write().await;
        release_slot(&mut members, &binding, id).then_some(binding)
    }

    pub async fn binding_of(&self, id: ConnectionId) -> Option<Binding> {
        let connections = self.connections.read().await;
        connections.get(&id).and_then(|conn| conn.binding.clone())
    }

    pub async fn connection_for(
        &self,
        room_code: &RoomCode,
        user_id: &str,
    ) -> Option<ConnectionId> {
        let members = self.members.read().await;
        members.get(room_code)?.get(user_id).copied()
    }

    /// Bind `id` to (room, player). Any previous binding of this socket is
    /// released and any other socket for the same player loses its binding.
    /// Returns the displaced socket.
    pub async fn bind(
        &self,
        id: ConnectionId,
        room_code: &RoomCode,
        user_id: &str,
    ) -> Result<Option<ConnectionId>, ConnectionError> {
        let binding = Binding {
            room_code: room_code.clone(),
            user_id: user_id.to_string(),
        };

        let mut connections = self.connections.write().await;
        let previous = connections
            .get_mut(&id)
            .ok_or(ConnectionError::NotFound)?
            .binding
            .replace(binding.clone());

        let mut members = self.members.write().await;
        if let Some(previous) = previous {
            release_slot(&mut members, &previous, id);
        }
        let displaced = members
            .entry(room_code.clone())
            .or_default()
            .insert(user_id.to_string(), id)
            .filter(|other| *other != id);

        if let Some(other) = displaced {
            if let Some(conn) = connections.get_mut(&other) {
                conn.binding = None;
            }
        }
        Ok(displaced)
    }

    /// Release the socket bound to (room, player), if any.
    pub async fn unbind(&self, room_code: &RoomCode, user_id: &str) -> Option<ConnectionId> {
        let mut connections = self.connections.write().await;
        let mut members = self.members.write().await;

        let room = members.get_mut(room_code)?;
        let id = room.remove(user_id)?;
        if room.is_empty() {
            members.remove(room_code);
        }
        if let Some(conn) = connections.get_mut(&id) {
            conn.binding = None;
        }
        Some(id)
    }

    pub async fn update_activity(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&id) {
            connection.update_activity();
        }
    }

    pub async fn send_to_connection(
        &self,
        id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), ConnectionError> {
        let connections = self.connections.read().await;
        match connections.get(&id) {
            Some(connection) => connection.send_message(message),
            None => Err(ConnectionError::NotFound),
        }
    }

    pub async fn send_to_player(
        &self,
        room_code: &RoomCode,
        user_id: &str,
        message: ServerMessage,
    ) -> Result<(), ConnectionError> {
        let id = self
            .connection_for(room_code, user_id)
            .await
            .ok_or_else(|| ConnectionError::PlayerNotConnected(user_id.to_string()))?;
        self.send_to_connection(id, message).await
    }

    /// Removes sockets idle longer than `timeout` and returns the bindings
    /// they still owned.
    pub async fn cleanup_inactive_connections(&self, timeout: Duration) -> Vec<Binding> {
        let inactive_connections: Vec<ConnectionId> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .filter(|conn| conn.is_inactive(timeout))
                .map(|conn| conn.id)
                .collect()
        };

        let mut released = Vec::new();
        for connection_id in inactive_connections {
            tracing::info!("Removing inactive connection: {}", connection_id);
            released.extend(self.remove_connection(connection_id).await);
        }
        released
    }

    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    pub async fn room_connection_count(&self, room_code: &RoomCode) -> usize {
        let members = self.members.read().await;
        members.get(room_code).map_or(0, HashMap::len)
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Frees the member slot if `id` still holds it.
fn release_slot(
    members: &mut HashMap<RoomCode, HashMap<PlayerId, ConnectionId>>,
    binding: &Binding,
    id: ConnectionId,
) -> bool {
    let Some(room) = members.get_mut(&binding.room_code) else {
        return false;
    };
    if room.get(&binding.user_id) != Some(&id) {
        return false;
    }
    room.remove(&binding.user_id);
    if room.is_empty() {
        members.remove(&binding.room_code);
    }
    true
}
