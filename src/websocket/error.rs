use thiserror::Error;

/// WebSocket error type.
#[derive(Error, Debug)]
pub enum WebSocketError {
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    #[error("Failed to accept connection: {0}")]
    AcceptFailed(String),

    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Failed to receive message: {0}")]
    Receive(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type WebSocketResult<T> = Result<T, WebSocketError>;
