use std::path::PathBuf;

use adsbee_exporter::{Exporter, Settings};
use adsbee_stream::WsConnector;
use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "adsbee-exporter", version)]
#[command(about = "Prometheus exporter for the ADSBee metrics WebSocket")]
struct Args {
    /// Optional configuration file (TOML, YAML or JSON).
    /// Environment variables such as WS_URL and EXPORTER_PORT override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref()).context("invalid configuration")?;
    init_logging(&settings);
    info!(url = %settings.ws_url, port = settings.exporter_port, "Starting ADSBee exporter");

    let shutdown = CancellationToken::new();
    let running = Exporter::new(settings)
        .start(WsConnector, shutdown.clone())
        .await
        .context("failed to start metrics endpoint")?;

    wait_for_signal().await;
    info!("Received shutdown signal; shutting down...");

    shutdown.cancel();
    running.wait().await;
    Ok(())
}

/// Install the fmt subscriber. `RUST_LOG` wins over `LOG_LEVEL` when set.
fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }
}
