//! Connection supervisor: connect, receive, probe, reconnect.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{Backoff, Connection, Connector, Inbound, StreamError};

/// Settings for a [`ConnectionSupervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Stream endpoint (e.g., "ws://localhost:8080/metrics")
    pub url: String,
    /// Upper bound on a single connection handshake
    pub connect_timeout: Duration,
    /// Idle time before a liveness probe; `None` waits indefinitely
    pub receive_timeout: Option<Duration>,
    /// Backoff floor
    pub reconnect_min: Duration,
    /// Backoff ceiling
    pub reconnect_max: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8080/metrics".to_string(),
            connect_timeout: Duration::from_secs(10),
            receive_timeout: Some(Duration::from_secs(30)),
            reconnect_min: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(30),
        }
    }
}

/// Consumer of received messages.
///
/// Called once per data message, in arrival order, and always finishes
/// before the next message is read.
pub trait FrameHandler: Send {
    fn handle(&mut self, frame: &[u8]);
}

impl<F> FrameHandler for F
where
    F: FnMut(&[u8]) + Send,
{
    fn handle(&mut self, frame: &[u8]) {
        self(frame)
    }
}

enum ConnectionState {
    /// Waiting to connect; `retry_in` is the backoff sleep, if any.
    Disconnected { retry_in: Option<Duration> },
    Connecting,
    Connected(Box<dyn Connection>),
    ReceivingIdle(Box<dyn Connection>),
}

/// Outcome of one wait on an established session.
enum Received {
    Frame(Vec<u8>),
    Pong,
    Idle,
    Ended(SessionEnd),
}

#[derive(Debug)]
enum SessionEnd {
    Closed,
    Failed(StreamError),
}

/// Keeps a session to the stream alive and feeds every message to a handler.
///
/// The supervisor never gives up: failed handshakes and broken sessions are
/// retried after an exponential backoff, which resets on each successful
/// handshake. If no message arrives within the receive timeout, a ping is
/// sent and the peer gets one more receive timeout to answer. Any pong or
/// message keeps the session; silence or a failed ping reconnects.
///
/// [`run`](ConnectionSupervisor::run) returns only when the cancellation
/// token fires. Every wait (handshake, receive, ping, backoff sleep) observes
/// the token.
///
/// # Example
///
/// ```rust,no_run
/// use adsbee_stream::{ConnectionSupervisor, SupervisorConfig, WsConnector};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let handler = |frame: &[u8]| println!("{} bytes", frame.len());
///     let supervisor = ConnectionSupervisor::new(SupervisorConfig::default(), WsConnector, handler);
///
///     let cancel = CancellationToken::new();
///     tokio::spawn(supervisor.run(cancel.clone()));
///
///     tokio::signal::ctrl_c().await.ok();
///     cancel.cancel();
/// }
/// ```
pub struct ConnectionSupervisor<C, H> {
    config: SupervisorConfig,
    connector: C,
    handler: H,
    backoff: Backoff,
}

impl<C, H> ConnectionSupervisor<C, H>
where
    C: Connector,
    H: FrameHandler,
{
    pub fn new(config: SupervisorConfig, connector: C, handler: H) -> Self {
        let backoff = Backoff::new(config.reconnect_min, config.reconnect_max);
        Self {
            config,
            connector,
            handler,
            backoff,
        }
    }

    /// Run until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut state = ConnectionState::Disconnected { retry_in: None };

        loop {
            state = match state {
                ConnectionState::Disconnected { retry_in } => {
                    if let Some(delay) = retry_in {
                        info!("Reconnecting in {:.1} seconds", delay.as_secs_f64());
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    ConnectionState::Connecting
                }

                ConnectionState::Connecting => {
                    info!(url = %self.config.url, "Connecting to WebSocket");
                    let attempt = tokio::select! {
                        _ = cancel.cancelled() => break,
                        attempt = connect(&self.connector, &self.config) => attempt,
                    };
                    match attempt {
                        Ok(conn) => {
                            info!("WebSocket connected");
                            self.backoff.reset();
                            ConnectionState::Connected(conn)
                        }
                        Err(e) => {
                            error!("WebSocket connection error: {}", e);
                            self.disconnected()
                        }
                    }
                }

                ConnectionState::Connected(mut conn) => {
                    let received = tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = next_message(conn.as_mut(), self.config.receive_timeout) => received,
                    };
                    self.on_received(conn, received)
                }

                ConnectionState::ReceivingIdle(mut conn) => {
                    warn!("Receive timeout; attempting to ping and continue");
                    let probe = tokio::select! {
                        _ = cancel.cancelled() => break,
                        probe = conn.ping() => probe,
                    };
                    if let Err(e) = probe {
                        warn!("Ping failed; breaking to reconnect: {}", e);
                        self.disconnected()
                    } else {
                        debug!("Ping sent; waiting for the peer");
                        let answer = tokio::select! {
                            _ = cancel.cancelled() => break,
                            answer = next_message(conn.as_mut(), self.config.receive_timeout) => answer,
                        };
                        match answer {
                            Received::Idle => {
                                warn!("No answer to ping; breaking to reconnect");
                                self.disconnected()
                            }
                            answer => self.on_received(conn, answer),
                        }
                    }
                }
            };
        }

        info!("Connection supervisor stopped");
    }

    fn on_received(&mut self, conn: Box<dyn Connection>, received: Received) -> ConnectionState {
        match received {
            Received::Frame(frame) => {
                self.handler.handle(&frame);
                ConnectionState::Connected(conn)
            }
            Received::Pong => {
                debug!("Pong received");
                ConnectionState::Connected(conn)
            }
            Received::Idle => ConnectionState::ReceivingIdle(conn),
            Received::Ended(SessionEnd::Closed) => {
                warn!("WebSocket connection closed; will reconnect");
                self.disconnected()
            }
            Received::Ended(SessionEnd::Failed(e)) => {
                error!("WebSocket connection error: {}", e);
                self.disconnected()
            }
        }
    }

    fn disconnected(&mut self) -> ConnectionState {
        ConnectionState::Disconnected {
            retry_in: Some(self.backoff.next_delay()),
        }
    }
}

async fn connect<C: Connector>(
    connector: &C,
    config: &SupervisorConfig,
) -> Result<Box<dyn Connection>, StreamError> {
    let timeout = config.connect_timeout;
    tokio::time::timeout(timeout, connector.connect(&config.url))
        .await
        .map_err(|_| StreamError::ConnectTimeout(timeout))?
}

async fn next_message(conn: &mut dyn Connection, idle: Option<Duration>) -> Received {
    let result = match idle {
        Some(idle) => match tokio::time::timeout(idle, conn.recv()).await {
            Ok(result) => result,
            Err(_) => return Received::Idle,
        },
        None => conn.recv().await,
    };

    match result {
        Some(Ok(Inbound::Data(frame))) => Received::Frame(frame),
        Some(Ok(Inbound::Pong)) => Received::Pong,
        Some(Err(e)) => Received::Ended(SessionEnd::Failed(e)),
        None => Received::Ended(SessionEnd::Closed),
    }
}
