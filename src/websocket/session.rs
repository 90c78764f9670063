use super::connection::{ConnectionId, Transport};
use super::error::{WebSocketError, WebSocketResult};
use super::manager::{BroadcastReport, ConnectionManager};
use super::message::WsMessage;
use crate::http::Method;
use crate::routing::{PathPattern, RouteEntry, RouteInfo, join_paths};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Read half of a socket.
#[async_trait]
pub trait Inbound: Send + 'static {
    /// The next frame, `None` once the peer is gone.
    async fn recv(&mut self) -> Option<WebSocketResult<WsMessage>>;
}

#[async_trait]
impl Inbound for mpsc::UnboundedReceiver<WsMessage> {
    async fn recv(&mut self) -> Option<WebSocketResult<WsMessage>> {
        mpsc::UnboundedReceiver::recv(self).await.map(Ok)
    }
}

/// One accepted connection as seen by its handler task.
///
/// Dropping the session disconnects it, so the connection leaves every
/// room however the handler task ends.
pub struct WebSocketSession {
    id: ConnectionId,
    path: String,
    params: HashMap<String, String>,
    manager: ConnectionManager,
    inbound: Box<dyn Inbound>,
}

impl WebSocketSession {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn label(&self) -> String {
        self.manager.label(&self.id).unwrap_or_default()
    }

    pub fn set_label(&self, label: impl Into<String>) -> WebSocketResult<()> {
        self.manager.set_label(&self.id, label)
    }

    /// Wait for the next frame. Returns `None` on a close frame, a
    /// transport error, or when the connection was disconnected from
    /// elsewhere.
    pub async fn recv(&mut self) -> Option<WsMessage> {
        let connection = self.manager.connection(&self.id)?;
        tokio::select! {
            frame = self.inbound.recv() => match frame {
                Some(Ok(WsMessage::Close)) | None => None,
                Some(Ok(message)) => Some(message),
                Some(Err(e)) => {
                    tracing::debug!("WebSocket {} receive failed: {}", self.id, e);
                    None
                }
            },
            _ = connection.closed() => None,
        }
    }

    pub fn send(&self, message: WsMessage) -> WebSocketResult<()> {
        self.manager.send(&self.id, message)
    }

    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> WebSocketResult<()> {
        self.manager.send_json(&self.id, value)
    }

    pub fn join(&self, room: &str) -> WebSocketResult<()> {
        self.manager.join_room(&self.id, room)
    }

    pub fn leave(&self, room: &str) -> bool {
        self.manager.leave_room(&self.id, room)
    }

    /// Broadcast JSON to `room`, optionally skipping this connection.
    pub fn broadcast_json<T: Serialize + ?Sized>(
        &self,
        room: &str,
        value: &T,
        include_self: bool,
    ) -> WebSocketResult<BroadcastReport> {
        let exclude = (!include_self).then_some(self.id.as_str());
        self.manager.broadcast_json(room, value, exclude)
    }

    /// Receive the next frame decoded as JSON.
    pub async fn recv_json<T: DeserializeOwned>(&mut self) -> Option<WebSocketResult<T>> {
        let message = self.recv().await?;
        Some(message.parse_json())
    }

    pub fn close(&self) {
        self.manager.disconnect(&self.id);
    }
}

impl Drop for WebSocketSession {
    fn drop(&mut self) {
        self.manager.disconnect(&self.id);
    }
}

/// A WebSocket endpoint.
pub trait WsHandler: Send + Sync + 'static {
    fn call(&self, session: WebSocketSession) -> BoxFuture<'static, WebSocketResult<()>>;
}

impl<F, Fut> WsHandler for F
where
    F: Fn(WebSocketSession) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WebSocketResult<()>> + Send + 'static,
{
    fn call(&self, session: WebSocketSession) -> BoxFuture<'static, WebSocketResult<()>> {
        Box::pin((self)(session))
    }
}

#[derive(Clone)]
pub struct WebSocketRoute {
    method: Method,
    path: String,
    handler: Arc<dyn WsHandler>,
}

impl fmt::Debug for WebSocketRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketRoute").field("path", &self.path).finish()
    }
}

impl WebSocketRoute {
    pub fn new(path: impl Into<String>, handler: impl WsHandler) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn handler(&self) -> &Arc<dyn WsHandler> {
        &self.handler
    }

    pub(crate) fn with_prefix(mut self, prefix: &str) -> Self {
        self.path = join_paths(prefix, &self.path);
        self
    }

    pub(crate) fn info(&self, pattern: &PathPattern) -> RouteInfo {
        RouteInfo {
            method: "GET".to_string(),
            path: pattern.as_str().to_string(),
            name: None,
            params: pattern.param_names().into_iter().map(str::to_string).collect(),
            dependencies: Vec::new(),
            model: None,
            websocket: true,
        }
    }

    /// Register the connection and run the handler on its own task.
    pub(crate) fn start(
        &self,
        manager: &ConnectionManager,
        path: String,
        params: HashMap<String, String>,
        transport: Transport,
        inbound: impl Inbound,
    ) -> WebSocketResult<JoinHandle<()>> {
        let id = manager.connect(transport)?;
        let session = WebSocketSession {
            id: id.clone(),
            path,
            params,
            manager: manager.clone(),
            inbound: Box::new(inbound),
        };
        let handler = Arc::clone(&self.handler);
        Ok(tokio::spawn(async move {
            match handler.call(session).await {
                Ok(()) => tracing::debug!("WebSocket {} handler finished", id),
                Err(WebSocketError::ConnectionClosed(_)) | Err(WebSocketError::ConnectionNotFound(_)) => {
                    tracing::debug!("WebSocket {} closed during handling", id)
                }
                Err(e) => tracing::warn!("WebSocket {} handler failed: {}", id, e),
            }
        }))
    }
}

impl RouteEntry for WebSocketRoute {
    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn echo(mut session: WebSocketSession) -> WebSocketResult<()> {
        while let Some(message) = session.recv().await {
            session.send(message)?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let manager = ConnectionManager::new();
        let route = WebSocketRoute::new("/echo", echo);
        let (transport, mut outbound) = Transport::channel();
        let (client, inbound) = mpsc::unbounded_channel();

        let task = route
            .start(&manager, "/echo".into(), HashMap::new(), transport, inbound)
            .unwrap();
        client.send(WsMessage::text("ping")).unwrap();
        assert_eq!(outbound.recv().await, Some(WsMessage::text("ping")));
        assert_eq!(manager.connection_count(), 1);

        drop(client);
        task.await.unwrap();
        assert_eq!(manager.connection_count(), 0);
        assert_eq!(outbound.recv().await, Some(WsMessage::Close));
    }

    #[tokio::test]
    async fn test_external_disconnect_ends_the_session() {
        let manager = ConnectionManager::new();
        let route = WebSocketRoute::new("/echo", echo);
        let (transport, _outbound) = Transport::channel();
        let (_client, inbound) = mpsc::unbounded_channel::<WsMessage>();

        let task = route
            .start(&manager, "/echo".into(), HashMap::new(), transport, inbound)
            .unwrap();
        let ids = manager.connection_ids();
        assert_eq!(ids.len(), 1);

        assert!(manager.disconnect(&ids[0]));
        task.await.unwrap();
        assert_eq!(manager.connection_count(), 0);
    }
}
