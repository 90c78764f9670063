//! # Fennec
//!
//! An async web framework core: a static-first route trie, named
//! dependencies with request-scoped cleanup, schema validation that
//! reports every violation at once, onion middleware and WebSocket rooms.
//!
//! Requests flow through a single [`dispatch::Dispatcher`]:
//!
//! ```text
//! received -> routed -> dependencies resolved -> validated -> handled -> response ready -> sent
//! ```
//!
//! Every request produces exactly one access log entry, and every scoped
//! dependency acquired for it is released exactly once, whether the
//! handler succeeded, failed or the client went away.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fennec::prelude::*;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, Model)]
//! struct CreateUser {
//!     #[field(min_length = 2)]
//!     name: String,
//! }
//!
//! async fn create_user(cx: RequestContext) -> Result<ApiResponse<String>> {
//!     let user: CreateUser = cx.body()?;
//!     Ok(ApiResponse::success(user.name).with_status(StatusCode::CREATED))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     fennec::logging::init();
//!
//!     let app = Application::builder()
//!         .title("Users")
//!         .route(Route::post("/users", create_user).model::<CreateUser>())
//!         .websocket("/ws/chat/{room}", ChatSession::new())
//!         .middleware(CorsMiddleware::new())
//!         .build()?;
//!
//!     app.serve().await?;
//!     Ok(())
//! }
//! ```

extern crate self as fennec;

pub mod application;
pub mod background;
pub mod common;
pub mod config;
pub mod di;
pub mod dispatch;
pub mod error;
pub mod exception;
pub mod guard;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod middleware;
pub mod routing;
pub mod testing;
pub mod validation;
pub mod websocket;

// Re-export core types
pub use application::{Application, ApplicationBuilder};
pub use background::BackgroundTasks;
pub use common::ApiResponse;
pub use config::{ConfigService, Settings};
pub use di::{Container, DependencyRegistry, DependencyScope, Provider, provider_fn, scoped};
pub use error::{ErrorKind, FennecError, Result};
pub use handler::{Handler, RequestContext};
pub use http::{Request, Response};
pub use routing::{Route, RouteInfo, Router};

// Re-export macros
pub use fennec_macro::Model;

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;
pub use serde_json;

/// Prelude module for convenient imports
///
/// ```
/// use fennec::prelude::*;
/// ```
pub mod prelude {
    pub use crate::Model;
    pub use crate::application::{Application, ApplicationBuilder};
    pub use crate::background::BackgroundTasks;
    pub use crate::common::ApiResponse;
    pub use crate::config::{ConfigService, Settings};
    pub use crate::di::{Container, DependencyContext, Provision, provider_fn, scoped};
    pub use crate::error::{ErrorKind, FennecError, Result};
    pub use crate::exception::ExceptionFilter;
    pub use crate::guard::{Authenticated, Guard, GuardError, GuardResult, Principal, RoleGuard};
    pub use crate::handler::RequestContext;
    pub use crate::http::{IntoResponse, Method, Request, Response, StatusCode};
    pub use crate::lifecycle::{OnShutdown, OnStartup};
    pub use crate::middleware::{
        BearerAuthMiddleware, Claims, CorsMiddleware, Flow, JwtHandler, Middleware,
        RateLimitMiddleware, SecurityHeadersMiddleware,
    };
    pub use crate::routing::{Route, Router};
    pub use crate::validation::{FieldSpec, ModelSchema, ValidatedModel};
    pub use crate::websocket::{ChatSession, Lobby, WebSocketSession, WsMessage};
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
