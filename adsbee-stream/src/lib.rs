//! # adsbee-stream
//!
//! Resilient consumer for the ADSBee WebSocket metrics stream.
//!
//! A [`ConnectionSupervisor`] owns the connection for the lifetime of the
//! process. It reconnects with exponential [`Backoff`] after every failure,
//! probes idle sessions with a ping, and passes each received message to a
//! [`FrameHandler`] one at a time.
//!
//! The transport sits behind the [`Connector`] and [`Connection`] traits;
//! [`WsConnector`] is the `tokio-tungstenite` implementation used in
//! production.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use adsbee_stream::{ConnectionSupervisor, SupervisorConfig, WsConnector};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SupervisorConfig {
//!         url: "ws://adsbee.local/metrics".to_string(),
//!         receive_timeout: Some(Duration::from_secs(15)),
//!         ..SupervisorConfig::default()
//!     };
//!
//!     let supervisor = ConnectionSupervisor::new(config, WsConnector, |frame: &[u8]| {
//!         println!("{}", String::from_utf8_lossy(frame));
//!     });
//!
//!     // Runs until the token is cancelled.
//!     supervisor.run(CancellationToken::new()).await;
//! }
//! ```

mod backoff;
mod error;
mod supervisor;
mod transport;

pub use backoff::Backoff;
pub use error::StreamError;
pub use supervisor::{ConnectionSupervisor, FrameHandler, SupervisorConfig};
pub use transport::{Connection, Connector, Inbound, WsConnector};
