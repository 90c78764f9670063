use super::error::{WebSocketError, WebSocketResult};
use super::message::WsMessage;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use strum_macros::Display;
use tokio::sync::{Notify, mpsc};

/// Unique identifier for a connection.
pub type ConnectionId = String;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Write half of a socket. Frames pushed here are drained in order by the
/// connection's writer task.
#[derive(Debug, Clone)]
pub struct Transport {
    tx: mpsc::UnboundedSender<WsMessage>,
}

impl Transport {
    pub fn new(tx: mpsc::UnboundedSender<WsMessage>) -> Self {
        Self { tx }
    }

    /// A transport plus the receiving end a writer task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WsMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn send(&self, message: WsMessage) -> WebSocketResult<()> {
        self.tx
            .send(message)
            .map_err(|_| WebSocketError::Send("transport is gone".to_string()))
    }
}

/// A live WebSocket connection.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    label: Arc<RwLock<String>>,
    state: Arc<RwLock<ConnectionState>>,
    closed: Arc<Notify>,
    transport: Transport,
    connected_at: DateTime<Utc>,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, transport: Transport) -> Self {
        let label = format!("User-{}", id.chars().take(8).collect::<String>());
        Self {
            id,
            label: Arc::new(RwLock::new(label)),
            state: Arc::new(RwLock::new(ConnectionState::Connecting)),
            closed: Arc::new(Notify::new()),
            transport,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn label(&self) -> String {
        self.label.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Queue a frame. Only open connections accept frames.
    pub fn send(&self, message: WsMessage) -> WebSocketResult<()> {
        if !self.is_open() {
            return Err(WebSocketError::ConnectionClosed(self.id.clone()));
        }
        self.transport.send(message)
    }

    pub(crate) fn set_label(&self, label: String) {
        *self.label.write().unwrap_or_else(PoisonError::into_inner) = label;
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
        if state == ConnectionState::Closed {
            self.closed.notify_waiters();
        }
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Resolves once the connection reaches `Closed`.
    pub(crate) async fn closed(&self) {
        let notified = self.closed.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.state() == ConnectionState::Closed {
            return;
        }
        notified.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_open_connections_send() {
        let (transport, mut rx) = Transport::channel();
        let connection = Connection::new("abcdef123456".into(), transport);
        assert_eq!(connection.label(), "User-abcdef12");

        assert!(matches!(
            connection.send(WsMessage::text("early")),
            Err(WebSocketError::ConnectionClosed(_))
        ));

        connection.set_state(ConnectionState::Open);
        connection.send(WsMessage::text("hi")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), WsMessage::text("hi"));

        connection.set_state(ConnectionState::Closed);
        assert!(connection.send(WsMessage::text("late")).is_err());
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        let (transport, _rx) = Transport::channel();
        let connection = Connection::new("c1".into(), transport);
        connection.set_state(ConnectionState::Open);

        let waiter = connection.clone();
        let handle = tokio::spawn(async move { waiter.closed().await });
        tokio::task::yield_now().await;
        connection.set_state(ConnectionState::Closed);
        handle.await.unwrap();

        connection.closed().await;
    }
}
