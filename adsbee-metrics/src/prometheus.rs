//! Prometheus exposition format support.
//!
//! This module renders a [`MetricRegistry`] in the Prometheus text-based
//! exposition format and serves it over HTTP so it can be scraped by
//! Prometheus or compatible monitoring systems.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use adsbee_metrics::prometheus::{PrometheusConfig, PrometheusExporter};
//! use adsbee_metrics::MetricRegistry;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(MetricRegistry::new());
//!     registry.register_gauge("adsbee_demods_1090_current", "Latest absolute value for 1090 demods.");
//!
//!     let config = PrometheusConfig::builder()
//!         .listen_addr("0.0.0.0:9100")
//!         .metrics_path("/metrics")
//!         .build();
//!
//!     let exporter = PrometheusExporter::new(config, registry);
//!     let server = exporter.start_server(CancellationToken::new()).await?;
//!
//!     // Metrics available at http://localhost:9100/metrics
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{ExporterError, MetricRegistry};

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Configuration for Prometheus metrics endpoint.
#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    /// Address to listen on (e.g., "0.0.0.0:9100")
    pub listen_addr: String,
    /// Advertised metrics path (e.g., "/metrics"). The exposition is served
    /// on every path other than the health checks.
    pub metrics_path: String,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9100".to_string(),
            metrics_path: "/metrics".to_string(),
        }
    }
}

impl PrometheusConfig {
    /// Create a new builder for PrometheusConfig.
    pub fn builder() -> PrometheusConfigBuilder {
        PrometheusConfigBuilder::default()
    }
}

/// Builder for PrometheusConfig.
#[derive(Debug, Default)]
pub struct PrometheusConfigBuilder {
    listen_addr: Option<String>,
    metrics_path: Option<String>,
}

impl PrometheusConfigBuilder {
    /// Set the listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Set the metrics path.
    pub fn metrics_path(mut self, path: impl Into<String>) -> Self {
        self.metrics_path = Some(path.into());
        self
    }

    /// Build the PrometheusConfig.
    pub fn build(self) -> PrometheusConfig {
        let defaults = PrometheusConfig::default();
        PrometheusConfig {
            listen_addr: self.listen_addr.unwrap_or(defaults.listen_addr),
            metrics_path: self.metrics_path.unwrap_or(defaults.metrics_path),
        }
    }
}

/// Prometheus exporter that serves a registry over HTTP.
#[derive(Debug)]
pub struct PrometheusExporter {
    config: PrometheusConfig,
    registry: Arc<MetricRegistry>,
}

impl PrometheusExporter {
    /// Create a new Prometheus exporter.
    pub fn new(config: PrometheusConfig, registry: Arc<MetricRegistry>) -> Self {
        Self { config, registry }
    }

    /// Get the current metrics in Prometheus exposition format.
    pub fn render(&self) -> String {
        format_prometheus(&self.registry)
    }

    /// Bind the listen address and start serving.
    ///
    /// Binding happens before this returns, so an unusable address is
    /// reported to the caller. Serving then runs in a background task until
    /// `shutdown` is cancelled; connections already accepted are allowed to
    /// finish.
    pub async fn start_server(
        &self,
        shutdown: CancellationToken,
    ) -> Result<ServerHandle, ExporterError> {
        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|_| ExporterError::InvalidAddress(self.config.listen_addr.clone()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ExporterError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ExporterError::Bind { addr, source })?;

        info!(addr = %local_addr, path = %self.config.metrics_path, "Prometheus exporter listening");

        let registry = self.registry.clone();
        let task = tokio::spawn(run_server(listener, registry, shutdown));

        Ok(ServerHandle { local_addr, task })
    }
}

/// Handle to a running metrics server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the server is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the accept loop to stop.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            warn!("Prometheus server task failed: {}", e);
        }
    }
}

async fn run_server(
    listener: TcpListener,
    registry: Arc<MetricRegistry>,
    shutdown: CancellationToken,
) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Prometheus server shutting down");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Prometheus accept error: {}", e);
                    continue;
                }
            },
        };
        let io = TokioIo::new(stream);

        let registry = registry.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let registry = registry.clone();

                async move { handle_request(req, &registry) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(%peer, "Prometheus connection error: {}", e);
            }
        });
    }
}

fn handle_request(
    req: Request<hyper::body::Incoming>,
    registry: &MetricRegistry,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match req.uri().path() {
        "/health" | "/healthz" => text_response(StatusCode::OK, "text/plain", "OK".to_string()),
        _ => text_response(
            StatusCode::OK,
            EXPOSITION_CONTENT_TYPE,
            format_prometheus(registry),
        ),
    };

    Ok(response)
}

fn text_response(
    status: StatusCode,
    content_type: &'static str,
    body: String,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Format a registry as Prometheus exposition format.
///
/// Families are emitted in name order, each with `# HELP` (when it has help
/// text) and `# TYPE ... gauge`, followed by its samples in label order.
pub fn format_prometheus(registry: &MetricRegistry) -> String {
    let mut output = String::new();

    for family in registry.families() {
        let name = family.name();
        if !family.help().is_empty() {
            let _ = writeln!(output, "# HELP {} {}", name, escape_help(family.help()));
        }
        let _ = writeln!(output, "# TYPE {} gauge", name);

        for (values, value) in family.samples() {
            output.push_str(name);
            if !values.is_empty() {
                let labels: Vec<String> = family
                    .label_names()
                    .iter()
                    .zip(values.iter())
                    .map(|(label, value)| format!("{}=\"{}\"", label, escape_label_value(value)))
                    .collect();
                let _ = write!(output, "{{{}}}", labels.join(","));
            }
            let _ = writeln!(output, " {}", format_value(value));
        }
    }

    output
}

/// Format a sample value the way Prometheus expects special floats.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// Escape a label value for Prometheus format.
/// Backslash, double-quote, and newline must be escaped.
fn escape_label_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Escape help text. Only backslash and newline are escaped here.
fn escape_help(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\n', "\\n")
}
