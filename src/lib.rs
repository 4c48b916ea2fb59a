//! # adsbee-exporter
//!
//! Prometheus exporter for the ADSBee metrics WebSocket.
//!
//! The exporter keeps one WebSocket session to the device alive, decodes
//! every message it receives and republishes the latest values as gauges on
//! a scrape endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        adsbee-exporter                           │
//! │  ┌──────────────────────┐   ┌──────────────────┐                 │
//! │  │ ConnectionSupervisor │──▶│ SnapshotPipeline │                 │
//! │  │   (adsbee-stream)    │   │ parse + apply    │                 │
//! │  └──────────┬───────────┘   └────────┬─────────┘                 │
//! │             │ WebSocket              │ MetricUpdater             │
//! │             ▼                        ▼                           │
//! │        ADSBee device        ┌────────────────┐   ┌────────────┐  │
//! │                             │ MetricRegistry │◀──│ /metrics   │◀─┼── Prometheus
//! │                             └────────────────┘   └────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`settings`]**: defaults, optional file and environment, validated
//!   into [`Settings`]
//! - **[`SnapshotPipeline`]**: the frame handler that turns messages into
//!   gauge updates
//! - **[`Exporter`]**: wires the registry, the scrape server and the
//!   supervisor together
//!
//! ## Usage
//!
//! ### As a binary
//!
//! ```bash
//! WS_URL=ws://adsbee.local/metrics EXPORTER_PORT=9100 adsbee-exporter
//! adsbee-exporter --config exporter.toml
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use adsbee_exporter::{Exporter, Settings};
//! use adsbee_stream::WsConnector;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::load(None).unwrap();
//! let shutdown = CancellationToken::new();
//!
//! let running = Exporter::new(settings)
//!     .start(WsConnector, shutdown.clone())
//!     .await
//!     .unwrap();
//!
//! // ... later
//! shutdown.cancel();
//! running.wait().await;
//! # });
//! ```
//!
//! ### Feeding messages by hand
//!
//! ```
//! use std::sync::Arc;
//!
//! use adsbee_exporter::SnapshotPipeline;
//! use adsbee_metrics::{MetricRegistry, MetricUpdater};
//! use adsbee_stream::FrameHandler;
//!
//! let registry = Arc::new(MetricRegistry::new());
//! let mut pipeline = SnapshotPipeline::new(MetricUpdater::new(registry.clone()));
//!
//! pipeline.handle(br#"{"device_status": {"pico": {"core_0_usage_percent": 42.5}}}"#);
//! assert_eq!(
//!     registry.get("adsbee_device_core_usage_percent", &["pico", "core_0"]),
//!     Some(42.5)
//! );
//! ```

mod pipeline;
pub mod settings;

use std::net::SocketAddr;
use std::sync::Arc;

use adsbee_metrics::prometheus::{PrometheusConfig, PrometheusExporter, ServerHandle};
use adsbee_metrics::{ExporterError, MetricRegistry, MetricUpdater};
use adsbee_stream::{ConnectionSupervisor, Connector, SupervisorConfig};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use pipeline::SnapshotPipeline;
pub use settings::{ConfigError, Settings};

/// The assembled exporter, ready to start.
#[derive(Debug)]
pub struct Exporter {
    settings: Settings,
    registry: Arc<MetricRegistry>,
    updater: MetricUpdater,
}

impl Exporter {
    /// Build the registry and register every exported gauge.
    pub fn new(settings: Settings) -> Self {
        let registry = Arc::new(MetricRegistry::new());
        let updater = MetricUpdater::new(registry.clone());
        Self {
            settings,
            registry,
            updater,
        }
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Bind the scrape endpoint and spawn the stream supervisor.
    ///
    /// Fails only if the endpoint cannot be bound. Both tasks run until
    /// `shutdown` is cancelled.
    pub async fn start<C>(
        self,
        connector: C,
        shutdown: CancellationToken,
    ) -> Result<RunningExporter, ExporterError>
    where
        C: Connector + 'static,
    {
        let config = PrometheusConfig::builder()
            .listen_addr(format!("0.0.0.0:{}", self.settings.exporter_port))
            .metrics_path("/metrics")
            .build();
        let server = PrometheusExporter::new(config, self.registry.clone())
            .start_server(shutdown.clone())
            .await?;
        info!(
            "Prometheus exporter listening on port {}",
            server.local_addr().port()
        );

        let supervisor = ConnectionSupervisor::new(
            supervisor_config(&self.settings),
            connector,
            SnapshotPipeline::new(self.updater),
        );
        let supervisor = tokio::spawn(supervisor.run(shutdown));

        Ok(RunningExporter { server, supervisor })
    }
}

fn supervisor_config(settings: &Settings) -> SupervisorConfig {
    SupervisorConfig {
        url: settings.ws_url.clone(),
        connect_timeout: settings.connect_timeout,
        receive_timeout: settings.receive_timeout,
        reconnect_min: settings.reconnect_min,
        reconnect_max: settings.reconnect_max,
    }
}

/// Handles to the running exporter tasks.
#[derive(Debug)]
pub struct RunningExporter {
    server: ServerHandle,
    supervisor: JoinHandle<()>,
}

impl RunningExporter {
    /// Address the scrape endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Wait for both tasks to wind down after shutdown.
    pub async fn wait(self) {
        if let Err(e) = self.supervisor.await {
            warn!("Connection supervisor task failed: {}", e);
        }
        self.server.wait().await;
    }
}
