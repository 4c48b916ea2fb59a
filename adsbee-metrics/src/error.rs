//! Error types for the scrape endpoint.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors that can occur when starting the Prometheus endpoint.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// The configured listen address could not be parsed.
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    /// The listen address could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
