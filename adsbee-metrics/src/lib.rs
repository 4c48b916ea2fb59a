//! # adsbee-metrics
//!
//! Gauge registry and Prometheus endpoint for ADSBee telemetry.
//!
//! The update path and the scrape path share a [`MetricRegistry`]. A
//! [`MetricUpdater`] writes decoded snapshots into it; the
//! [`prometheus::PrometheusExporter`] renders it on every scrape.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use adsbee_metrics::prometheus::{PrometheusConfig, PrometheusExporter};
//! use adsbee_metrics::{MetricRegistry, MetricUpdater};
//! use adsbee_types::parse_snapshot;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(MetricRegistry::new());
//!     let updater = MetricUpdater::new(registry.clone());
//!
//!     let exporter = PrometheusExporter::new(PrometheusConfig::default(), registry);
//!     let server = exporter.start_server(CancellationToken::new()).await?;
//!
//!     let snapshot = parse_snapshot(br#"{"aircraft_dictionary_metrics": {"demods_1090": 3000}}"#)?;
//!     updater.apply(&snapshot);
//!
//!     server.wait().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Non-blocking scrapes**: gauge cells are atomics, so a scrape never
//!   waits on the update path
//! - **Set-if-present**: fields missing from a snapshot keep their last value
//! - **Grow-only labels**: label combinations are created on first use and
//!   never evicted

mod error;
pub mod prometheus;
mod registry;
mod updater;

pub use error::ExporterError;
pub use registry::{Gauge, GaugeFamily, MetricRegistry};
pub use updater::{
    counter_gauge, MetricUpdater, DEVICE_CORE_USAGE, DEVICE_HEAP_FREE,
    DEVICE_HEAP_LARGEST_FREE_BLOCK, DEVICE_TEMPERATURE, DEVICE_UPTIME, FEED_MPS,
};

// Re-export types for convenience
pub use adsbee_types::Snapshot;
