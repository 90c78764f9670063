//! The application: route tables, middleware, dependencies and hooks
//! frozen at build time, plus the entry points the transport calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use fennec::prelude::*;
//!
//! async fn hello(_cx: RequestContext) -> fennec::Result<Value> {
//!     Ok(json!({ "message": "Hello, World!" }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     fennec::logging::init();
//!     let app = Application::builder()
//!         .get("/", hello)
//!         .middleware(CorsMiddleware::new())
//!         .build()?;
//!     app.serve().await
//! }
//! ```

mod builder;
mod server;

pub use builder::ApplicationBuilder;

use crate::config::Settings;
use crate::di::Container;
use crate::dispatch::Dispatcher;
use crate::http::{Method, Request, Response};
use crate::lifecycle::{LifecycleError, LifecycleManager};
use crate::routing::{Lookup, RouteInfo, RouteTable};
use crate::websocket::{
    ConnectionManager, Inbound, Transport, WebSocketError, WebSocketResult, WebSocketRoute,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct Application {
    inner: Arc<Inner>,
}

struct Inner {
    title: String,
    settings: Settings,
    dispatcher: Dispatcher,
    websockets: RouteTable<WebSocketRoute>,
    connections: ConnectionManager,
    lifecycle: LifecycleManager,
    started: AtomicBool,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn container(&self) -> &Arc<Container> {
        self.inner.dispatcher.container()
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.inner.connections
    }

    /// Handle one HTTP request.
    pub async fn handle(&self, request: Request) -> Response {
        self.inner.dispatcher.dispatch(request).await
    }

    /// Metadata for every HTTP route followed by every WebSocket route,
    /// each in registration order.
    pub fn routes(&self) -> Vec<RouteInfo> {
        let http = self
            .inner
            .dispatcher
            .routes()
            .iter()
            .map(|(pattern, route)| route.info(pattern));
        let websockets = self
            .inner
            .websockets
            .iter()
            .map(|(pattern, route)| route.info(pattern));
        http.chain(websockets).collect()
    }

    pub fn has_websocket_route(&self, path: &str) -> bool {
        matches!(
            self.inner.websockets.lookup(&Method::GET, path),
            Lookup::Found { .. }
        )
    }

    /// Accept a WebSocket on `path` over an already-established transport
    /// and run its handler. The axum bridge calls this for real sockets;
    /// tests can pass channels.
    pub fn open_websocket(
        &self,
        path: &str,
        transport: Transport,
        inbound: impl Inbound,
    ) -> WebSocketResult<JoinHandle<()>> {
        match self.inner.websockets.lookup(&Method::GET, path) {
            Lookup::Found { route, params } => {
                route.start(&self.inner.connections, path.to_string(), params, transport, inbound)
            }
            _ => Err(WebSocketError::AcceptFailed(format!(
                "No WebSocket route matches {path}"
            ))),
        }
    }

    /// Run startup hooks once. A failing hook aborts startup and leaves
    /// the application unstarted.
    pub async fn startup(&self) -> Result<(), LifecycleError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Starting {}", self.inner.title);
        if let Err(e) = self.inner.lifecycle.call_startup_with_timeout().await {
            self.inner.started.store(false, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    /// Close every WebSocket and run shutdown hooks. Does nothing unless
    /// the application was started.
    pub async fn shutdown(&self) {
        if !self.inner.started.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Shutting down {}", self.inner.title);
        for id in self.inner.connections.connection_ids() {
            self.inner.connections.disconnect(&id);
        }
        if let Err(e) = self.inner.lifecycle.call_shutdown_with_timeout().await {
            tracing::error!("Shutdown hooks did not finish: {}", e);
        }
        tracing::info!("Graceful shutdown complete");
    }
}
