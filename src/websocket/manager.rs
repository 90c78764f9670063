use super::connection::{Connection, ConnectionId, ConnectionState, Transport};
use super::error::{WebSocketError, WebSocketResult};
use super::message::WsMessage;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Connections whose delivery failed; they have been disconnected.
    pub failed: Vec<ConnectionId>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, BTreeSet<String>>,
}

/// Tracks live connections and their rooms.
///
/// Membership lives behind one lock, so removing a connection from every
/// room and from the registry is a single step, and a broadcast works on
/// a consistent snapshot of a room. Frames are queued outside the lock.
#[derive(Clone, Default)]
pub struct ConnectionManager {
    registry: Arc<RwLock<Registry>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an accepted socket and return its id.
    pub fn connect(&self, transport: Transport) -> WebSocketResult<ConnectionId> {
        if transport.is_closed() {
            return Err(WebSocketError::AcceptFailed(
                "transport closed before registration".to_string(),
            ));
        }
        let id = Uuid::new_v4().to_string();
        let connection = Connection::new(id.clone(), transport);
        {
            let mut registry = self.write();
            registry.memberships.insert(id.clone(), BTreeSet::new());
            registry.connections.insert(id.clone(), connection.clone());
        }
        connection.set_state(ConnectionState::Open);
        tracing::debug!("WebSocket {} connected", id);
        Ok(id)
    }

    pub fn connection(&self, id: &str) -> Option<Connection> {
        self.read().connections.get(id).cloned()
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.read().connections.contains_key(id)
    }

    /// Ids of every live connection, sorted.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.read().connections.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn connection_count(&self) -> usize {
        self.read().connections.len()
    }

    pub fn join_room(&self, id: &str, room: &str) -> WebSocketResult<()> {
        let mut registry = self.write();
        let Some(memberships) = registry.memberships.get_mut(id) else {
            return Err(WebSocketError::ConnectionNotFound(id.to_string()));
        };
        memberships.insert(room.to_string());
        registry
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(id.to_string());
        Ok(())
    }

    /// Returns whether the connection was a member.
    pub fn leave_room(&self, id: &str, room: &str) -> bool {
        let mut registry = self.write();
        if let Some(memberships) = registry.memberships.get_mut(id) {
            memberships.remove(room);
        }
        remove_member(&mut registry.rooms, room, id)
    }

    /// Remove the connection from every room and release its transport.
    /// Returns `false` when it was already gone.
    pub fn disconnect(&self, id: &str) -> bool {
        let connection = {
            let mut registry = self.write();
            let Some(connection) = registry.connections.remove(id) else {
                return false;
            };
            connection.set_state(ConnectionState::Closing);
            for room in registry.memberships.remove(id).unwrap_or_default() {
                remove_member(&mut registry.rooms, &room, id);
            }
            connection
        };

        // Best effort: the writer may already be gone.
        let _ = connection.transport().send(WsMessage::Close);
        connection.set_state(ConnectionState::Closed);
        tracing::debug!("WebSocket {} disconnected", id);
        true
    }

    pub fn send(&self, id: &str, message: WsMessage) -> WebSocketResult<()> {
        let connection = self
            .connection(id)
            .ok_or_else(|| WebSocketError::ConnectionNotFound(id.to_string()))?;
        connection.send(message).inspect_err(|e| {
            tracing::debug!("Send to {} failed: {}", id, e);
            self.disconnect(id);
        })
    }

    pub fn send_json<T: Serialize + ?Sized>(&self, id: &str, value: &T) -> WebSocketResult<()> {
        self.send(id, WsMessage::json(value)?)
    }

    /// Deliver to every member of `room`.
    pub fn broadcast(&self, room: &str, message: WsMessage) -> BroadcastReport {
        self.fan_out(self.members_of(room, None), message)
    }

    /// Deliver to every member of `room` except `exclude`.
    pub fn broadcast_except(&self, room: &str, message: WsMessage, exclude: &str) -> BroadcastReport {
        self.fan_out(self.members_of(room, Some(exclude)), message)
    }

    /// Deliver to every live connection.
    pub fn broadcast_all(&self, message: WsMessage) -> BroadcastReport {
        let targets = self.read().connections.values().cloned().collect();
        self.fan_out(targets, message)
    }

    pub fn broadcast_json<T: Serialize + ?Sized>(
        &self,
        room: &str,
        value: &T,
        exclude: Option<&str>,
    ) -> WebSocketResult<BroadcastReport> {
        let message = WsMessage::json(value)?;
        Ok(self.fan_out(self.members_of(room, exclude), message))
    }

    fn members_of(&self, room: &str, exclude: Option<&str>) -> Vec<Connection> {
        let registry = self.read();
        let Some(members) = registry.rooms.get(room) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|id| Some(id.as_str()) != exclude)
            .filter_map(|id| registry.connections.get(id).cloned())
            .collect()
    }

    fn fan_out(&self, targets: Vec<Connection>, message: WsMessage) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        for connection in targets {
            match connection.send(message.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::debug!("Dropping {} after failed delivery: {}", connection.id(), e);
                    report.failed.push(connection.id().to_string());
                }
            }
        }
        for id in &report.failed {
            self.disconnect(id);
        }
        report
    }

    pub fn set_label(&self, id: &str, label: impl Into<String>) -> WebSocketResult<()> {
        let connection = self
            .connection(id)
            .ok_or_else(|| WebSocketError::ConnectionNotFound(id.to_string()))?;
        connection.set_label(label.into());
        Ok(())
    }

    pub fn label(&self, id: &str) -> Option<String> {
        self.connection(id).map(|c| c.label())
    }

    /// Member ids of `room`, sorted.
    pub fn room_members(&self, room: &str) -> Vec<ConnectionId> {
        let mut members: Vec<_> = self
            .read()
            .rooms
            .get(room)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    pub fn rooms_of(&self, id: &str) -> Vec<String> {
        self.read()
            .memberships
            .get(id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every non-empty room, sorted.
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<_> = self.read().rooms.keys().cloned().collect();
        rooms.sort();
        rooms
    }
}

/// Drop `id` from `room`, deleting the room once empty.
fn remove_member(rooms: &mut HashMap<String, HashSet<ConnectionId>>, room: &str, id: &str) -> bool {
    let Some(members) = rooms.get_mut(room) else {
        return false;
    };
    let removed = members.remove(id);
    if members.is_empty() {
        rooms.remove(room);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn open(manager: &ConnectionManager) -> (ConnectionId, UnboundedReceiver<WsMessage>) {
        let (transport, rx) = Transport::channel();
        (manager.connect(transport).unwrap(), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<WsMessage>) -> Vec<WsMessage> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn test_membership_is_idempotent() {
        let manager = ConnectionManager::new();
        let (id, _rx) = open(&manager);

        manager.join_room(&id, "lobby").unwrap();
        manager.join_room(&id, "lobby").unwrap();
        assert_eq!(manager.room_members("lobby"), vec![id.clone()]);

        assert!(manager.leave_room(&id, "lobby"));
        assert!(!manager.leave_room(&id, "lobby"));
        assert!(manager.rooms().is_empty());

        assert!(matches!(
            manager.join_room("ghost", "lobby"),
            Err(WebSocketError::ConnectionNotFound(_))
        ));
    }

    #[test]
    fn test_broadcast_isolates_dead_connection() {
        let manager = ConnectionManager::new();
        let (first, mut rx1) = open(&manager);
        let (second, rx2) = open(&manager);
        let (third, mut rx3) = open(&manager);
        for id in [&first, &second, &third] {
            manager.join_room(id, "room").unwrap();
        }
        drop(rx2);

        let report = manager.broadcast("room", WsMessage::text("hello"));
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, vec![second.clone()]);

        assert_eq!(drain(&mut rx1), vec![WsMessage::text("hello")]);
        assert_eq!(drain(&mut rx3), vec![WsMessage::text("hello")]);
        assert!(!manager.room_members("room").contains(&second));
        assert!(!manager.is_connected(&second));
    }

    #[test]
    fn test_disconnect_leaves_every_room() {
        let manager = ConnectionManager::new();
        let (id, mut rx) = open(&manager);
        let (other, _other_rx) = open(&manager);
        manager.join_room(&id, "a").unwrap();
        manager.join_room(&id, "b").unwrap();
        manager.join_room(&other, "b").unwrap();

        assert!(manager.disconnect(&id));
        assert!(!manager.disconnect(&id));
        assert_eq!(drain(&mut rx), vec![WsMessage::Close]);

        assert_eq!(manager.broadcast("a", WsMessage::text("x")).delivered, 0);
        assert_eq!(manager.broadcast("b", WsMessage::text("x")).delivered, 1);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(manager.rooms(), vec!["b".to_string()]);
        assert!(manager.rooms_of(&id).is_empty());
    }

    #[test]
    fn test_send_to_stale_id() {
        let manager = ConnectionManager::new();
        let (id, _rx) = open(&manager);
        let connection = manager.connection(&id).unwrap();
        manager.disconnect(&id);

        assert!(matches!(
            manager.send(&id, WsMessage::text("x")),
            Err(WebSocketError::ConnectionNotFound(_))
        ));
        assert!(matches!(
            connection.send(WsMessage::text("x")),
            Err(WebSocketError::ConnectionClosed(_))
        ));
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_broadcast_except_and_all() {
        let manager = ConnectionManager::new();
        let (a, mut rx_a) = open(&manager);
        let (b, mut rx_b) = open(&manager);
        manager.join_room(&a, "room").unwrap();
        manager.join_room(&b, "room").unwrap();

        let report = manager.broadcast_except("room", WsMessage::text("typing"), &a);
        assert_eq!(report.delivered, 1);
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b).len(), 1);

        assert_eq!(manager.broadcast_all(WsMessage::text("all")).delivered, 2);
    }

    #[test]
    fn test_closed_transport_is_rejected() {
        let manager = ConnectionManager::new();
        let (transport, rx) = Transport::channel();
        drop(rx);
        assert!(matches!(
            manager.connect(transport),
            Err(WebSocketError::AcceptFailed(_))
        ));
        assert_eq!(manager.connection_count(), 0);
    }
}
