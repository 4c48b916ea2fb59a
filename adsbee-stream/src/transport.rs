//! Transport abstraction and the WebSocket implementation.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::StreamError;

/// Opens sessions to the metrics stream.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform the handshake. Timeouts are applied by the caller.
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, StreamError>;
}

/// What a session delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A data message (text or binary payload).
    Data(Vec<u8>),
    /// The peer answered a ping.
    Pong,
}

/// One established session.
#[async_trait]
pub trait Connection: Send {
    /// Wait for the next data message or pong.
    ///
    /// Pings from the peer are answered internally and never returned.
    /// `None` means the peer closed the session.
    async fn recv(&mut self) -> Option<Result<Inbound, StreamError>>;

    /// Send a liveness probe. Succeeds once the probe has been written; the
    /// answer arrives through [`recv`](Connection::recv) as [`Inbound::Pong`].
    async fn ping(&mut self) -> Result<(), StreamError>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>, StreamError> {
        let (stream, response) = connect_async(url).await?;
        debug!(status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WsConnection { stream }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<Inbound, StreamError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Text(text) => {
                    return Some(Ok(Inbound::Data(text.as_str().as_bytes().to_vec())))
                }
                Message::Binary(bytes) => return Some(Ok(Inbound::Data(bytes.to_vec()))),
                Message::Pong(_) => return Some(Ok(Inbound::Pong)),
                Message::Close(frame) => {
                    debug!(?frame, "WebSocket close frame received");
                    return None;
                }
                // tungstenite answers pings on its own.
                Message::Ping(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn ping(&mut self) -> Result<(), StreamError> {
        self.stream.send(Message::Ping(Default::default())).await?;
        Ok(())
    }
}
