//! In-process test client.
//!
//! Requests go straight to [`Application::handle`]; no socket is opened.
//!
//! ```rust,ignore
//! let client = TestClient::new(app);
//! let response = client.post("/users").json(&json!({"name": "Jo"})).send().await;
//! assert_eq!(response.status(), StatusCode::CREATED);
//! assert_eq!(response.json()["data"]["name"], "Jo");
//! ```

use crate::application::Application;
use crate::http::{HeaderMap, Method, Request, Response, StatusCode};
use crate::websocket::{Transport, WebSocketResult, WsMessage};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const WS_RECV_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct TestClient {
    app: Application,
}

impl TestClient {
    pub fn new(app: Application) -> Self {
        Self { app }
    }

    pub fn app(&self) -> &Application {
        &self.app
    }

    pub fn request(&self, method: Method, target: &str) -> TestRequest<'_> {
        TestRequest {
            client: self,
            request: Request::new(method, target),
        }
    }

    pub fn get(&self, target: &str) -> TestRequest<'_> {
        self.request(Method::GET, target)
    }

    pub fn post(&self, target: &str) -> TestRequest<'_> {
        self.request(Method::POST, target)
    }

    pub fn put(&self, target: &str) -> TestRequest<'_> {
        self.request(Method::PUT, target)
    }

    pub fn patch(&self, target: &str) -> TestRequest<'_> {
        self.request(Method::PATCH, target)
    }

    pub fn delete(&self, target: &str) -> TestRequest<'_> {
        self.request(Method::DELETE, target)
    }

    /// Open a WebSocket on `path` backed by in-memory channels.
    pub fn websocket(&self, path: &str) -> WebSocketResult<TestWebSocket> {
        let (transport, outbound) = Transport::channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let task = self.app.open_websocket(path, transport, inbound_rx)?;
        Ok(TestWebSocket {
            inbound: Some(inbound_tx),
            outbound,
            task,
        })
    }
}

pub struct TestRequest<'a> {
    client: &'a TestClient,
    request: Request,
}

impl TestRequest<'_> {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.request = self.request.with_header(name, value);
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("authorization", &format!("Bearer {token}"))
    }

    pub fn body(mut self, body: impl Into<axum::body::Bytes>) -> Self {
        self.request = self.request.with_body(body);
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.request = self.request.with_json(&value);
        self
    }

    pub async fn send(self) -> TestResponse {
        TestResponse::from(self.client.app.handle(self.request).await)
    }
}

#[derive(Debug, Clone)]
pub struct TestResponse {
    response: Response,
}

impl From<Response> for TestResponse {
    fn from(response: Response) -> Self {
        Self { response }
    }
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.response.body()).into_owned()
    }

    /// The body as JSON, `Value::Null` when it is not JSON.
    pub fn json(&self) -> Value {
        self.response.json_body().unwrap_or(Value::Null)
    }

    pub fn into_inner(self) -> Response {
        self.response
    }
}

/// Client side of an in-memory WebSocket.
pub struct TestWebSocket {
    inbound: Option<mpsc::UnboundedSender<WsMessage>>,
    outbound: mpsc::UnboundedReceiver<WsMessage>,
    task: JoinHandle<()>,
}

impl TestWebSocket {
    pub fn send(&self, message: WsMessage) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|tx| tx.send(message).is_ok())
    }

    pub fn send_json<T: Serialize + ?Sized>(&self, value: &T) -> bool {
        match WsMessage::json(value) {
            Ok(message) => self.send(message),
            Err(_) => false,
        }
    }

    /// Next frame from the server, `None` after a short timeout or once
    /// the server side is gone.
    pub async fn recv(&mut self) -> Option<WsMessage> {
        tokio::time::timeout(WS_RECV_TIMEOUT, self.outbound.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next text frame decoded as JSON.
    pub async fn recv_json(&mut self) -> Option<Value> {
        match self.recv().await? {
            WsMessage::Text(text) => serde_json::from_str(&text).ok(),
            WsMessage::Binary(data) => serde_json::from_slice(&data).ok(),
            WsMessage::Close => None,
        }
    }

    /// Hang up and wait for the server's handler to finish.
    pub async fn close(mut self) {
        self.inbound.take();
        if let Err(e) = self.task.await {
            tracing::error!("WebSocket handler task failed: {}", e);
        }
    }
}
