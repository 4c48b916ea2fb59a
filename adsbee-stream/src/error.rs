//! Error types for the stream transport.

use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that end a connection attempt or an established session.
///
/// None of these are fatal: the supervisor logs them and reconnects.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The handshake did not complete within the connect timeout.
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The peer violated the WebSocket protocol or the socket errored.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The connection is already closed.
    #[error("Connection closed")]
    Closed,
}

impl From<tungstenite::Error> for StreamError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                StreamError::Closed
            }
            tungstenite::Error::Io(e) => StreamError::Connection(e.to_string()),
            other => StreamError::Protocol(other.to_string()),
        }
    }
}
