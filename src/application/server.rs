use super::Application;
use crate::error::FennecError;
use crate::http::{Request, Response, StatusCode};
use crate::lifecycle::shutdown_signal;
use crate::websocket::{Inbound, Transport, WebSocketError, WebSocketResult, WsMessage};
use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::header;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpListener;

impl axum::response::IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let (status, headers, body) = self.into_parts();
        let mut response = axum::response::Response::new(Body::from(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl Application {
    /// An axum router that sends every request through this application.
    pub fn into_router(self) -> axum::Router {
        axum::Router::new().fallback(bridge).with_state(self)
    }

    /// Bind to the configured host and port and serve until a shutdown
    /// signal arrives.
    pub async fn serve(self) -> anyhow::Result<()> {
        let address = self.settings().bind_address();
        let listener = TcpListener::bind(&address).await?;
        self.serve_on(listener).await
    }

    pub async fn serve_on(self, listener: TcpListener) -> anyhow::Result<()> {
        self.startup().await?;
        tracing::info!("{} listening on {}", self.title(), listener.local_addr()?);

        let router = self.clone().into_router();
        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;

        self.shutdown().await;
        served?;
        Ok(())
    }
}

fn is_upgrade(request: &axum::extract::Request) -> bool {
    request
        .headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

async fn bridge(State(app): State<Application>, request: axum::extract::Request) -> axum::response::Response {
    use axum::response::IntoResponse;

    if is_upgrade(&request) {
        return upgrade(app, request).await;
    }

    let (parts, body) = request.into_parts();
    let limit = app.settings().max_request_size;
    let body = match axum::body::to_bytes(body, limit).await {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!("Rejected request body: {}", e);
            return FennecError::http(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Request too large. Maximum size: {limit} bytes"),
            )
            .to_response()
            .into_response();
        }
    };

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let mut request = Request::new(parts.method, target)
        .with_headers(parts.headers)
        .with_body(body);
    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        request = request.with_remote_addr(*addr);
    }

    app.handle(request).await.into_response()
}

async fn upgrade(app: Application, request: axum::extract::Request) -> axum::response::Response {
    use axum::response::IntoResponse;

    let path = request.uri().path().to_string();
    if !app.has_websocket_route(&path) {
        return FennecError::not_found("Not Found").to_response().into_response();
    }

    let (mut parts, _body) = request.into_parts();
    let ws = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    ws.on_upgrade(move |socket| async move {
        if let Err(e) = run_socket(app, path, socket).await {
            tracing::warn!("WebSocket session failed: {}", e);
        }
    })
}

/// Wire a socket to a session: a writer task drains the connection's
/// channel into the sink while the handler task reads the stream.
async fn run_socket(app: Application, path: String, socket: WebSocket) -> WebSocketResult<()> {
    let (mut sink, stream) = socket.split();
    let (transport, mut outbound) = Transport::channel();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let is_close = message.is_close();
            if let Err(e) = sink.send(into_axum(message)).await {
                tracing::debug!("WebSocket write failed: {}", e);
                break;
            }
            if is_close {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let session = app.open_websocket(&path, transport, AxumInbound(stream))?;
    if let Err(e) = session.await {
        tracing::error!("WebSocket handler task failed: {}", e);
    }
    writer
        .await
        .map_err(|e| WebSocketError::Send(e.to_string()))
}

fn into_axum(message: WsMessage) -> Message {
    match message {
        WsMessage::Text(text) => Message::Text(text.into()),
        WsMessage::Binary(data) => Message::Binary(data),
        WsMessage::Close => Message::Close(None),
    }
}

struct AxumInbound(SplitStream<WebSocket>);

#[async_trait]
impl Inbound for AxumInbound {
    async fn recv(&mut self) -> Option<WebSocketResult<WsMessage>> {
        loop {
            let frame = match self.0.next().await? {
                Ok(Message::Text(text)) => WsMessage::Text(text.as_str().to_owned()),
                Ok(Message::Binary(data)) => WsMessage::Binary(data),
                Ok(Message::Close(_)) => WsMessage::Close,
                Ok(Message::Ping(_) | Message::Pong(_)) => continue,
                Err(e) => return Some(Err(WebSocketError::Receive(e.to_string()))),
            };
            return Some(Ok(frame));
        }
    }
}
