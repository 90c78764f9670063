use super::error::WebSocketResult;
use axum::body::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A WebSocket frame as seen by handlers. Ping and pong frames are
/// handled by the transport and never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Bytes),
    Close,
}

impl WsMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Binary(data.into())
    }

    pub fn json<T: Serialize + ?Sized>(value: &T) -> WebSocketResult<Self> {
        Ok(Self::Text(serde_json::to_string(value)?))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Self::Close)
    }

    /// Decode a text frame as JSON.
    pub fn parse_json<T: DeserializeOwned>(&self) -> WebSocketResult<T> {
        match self {
            Self::Text(text) => Ok(serde_json::from_str(text)?),
            Self::Binary(data) => Ok(serde_json::from_slice(data)?),
            Self::Close => Err(super::WebSocketError::Receive(
                "close frame carries no payload".to_string(),
            )),
        }
    }
}
