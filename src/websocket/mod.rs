//! WebSocket connections, rooms and broadcast.
//!
//! Each accepted socket gets a [`Connection`] in the [`ConnectionManager`]
//! and one task running its route's [`WsHandler`]. Outbound frames go
//! through an unbounded channel that a writer task drains into the socket,
//! so sends never block and per-connection order is preserved.

mod chat;
mod connection;
mod error;
mod manager;
mod message;
mod session;

pub use chat::{ChatSession, Lobby};
pub use connection::{Connection, ConnectionId, ConnectionState, Transport};
pub use error::{WebSocketError, WebSocketResult};
pub use manager::{BroadcastReport, ConnectionManager};
pub use message::WsMessage;
pub use session::{Inbound, WebSocketRoute, WebSocketSession, WsHandler};
