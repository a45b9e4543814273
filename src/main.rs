//! Demo LoRa Basic Station network server.
//!
//! Answers discovery for any station, hands out a static US902 channel plan
//! and logs every message stations send. Set `RUST_LOG` to adjust verbosity.

mod cli;
mod demo;

use basicstation::server::StationServer;
use clap::Parser;
use demo::DemoServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = cli::Cli::parse();
    if let Some(addr) = cli.metrics_address {
        install_metrics(addr)?;
    }

    let network = DemoServer::new(&cli.public_uri, cli.muxs, cli.region);
    StationServer::new(network).bind(cli.address)?.run().await?;
    Ok(())
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    log::info!("metrics exporter listening: addr={addr}");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    log::warn!("metrics feature disabled, ignoring --metrics-address {addr}");
    Ok(())
}
