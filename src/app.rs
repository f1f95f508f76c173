//! Core application runner for `mijia-exporter`.
//!
//! This module is intentionally decoupled from process exit codes and signal
//! handling so startup ordering can be tested with an injected transport.

use crate::client::SensorClient;
use crate::config::{self, ConfigError, DEFAULT_CONFIG_PATH};
use crate::duration::parse_duration;
use crate::metrics::MetricStore;
use crate::poller::{Poller, ProbeError, ProbeOutcome};
use crate::server;
use crate::transport::{self, Backend, Transport, TransportError};
use clap::Parser;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Prometheus exporter for Mijia Bluetooth temperature and humidity sensors.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Sensor list: a JSON array of {"mac", "area", "area_type"} objects.
    #[arg(long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Time between two collection cycles.
    /// Accepts duration with suffix: 30s, 5m, 1h.
    /// Without suffix, value is interpreted as seconds.
    #[arg(long, env = "EXPORTER_COLLECT_INTERVAL", default_value = "60", value_parser = parse_duration)]
    pub interval: Duration,

    /// Port of the metrics endpoint
    #[arg(long, env = "EXPORTER_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Address the metrics endpoint binds to
    #[arg(long, env = "EXPORTER_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Bluetooth transport backend to use
    #[arg(long, env = "EXPORTER_BACKEND", default_value_t, value_enum)]
    pub backend: Backend,

    /// Verbose output, log every sensor reading
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Errors that stop the exporter.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Open the configured backend and run the exporter until `shutdown`.
pub async fn run(options: Options, shutdown: watch::Receiver<bool>) -> Result<(), AppError> {
    let transport = transport::open(options.backend).await?;
    info!(backend = %options.backend, "transport ready");
    run_with_transport(options, transport, shutdown).await
}

/// Run the exporter with an injected transport.
///
/// Startup order matters: the sensor list is loaded, every sensor is probed
/// once, and only then is the metrics port bound. Any probe failure is
/// returned before the port is touched.
pub async fn run_with_transport(
    options: Options,
    transport: Arc<dyn Transport>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let sensors = config::load(&options.config)?;
    info!(
        sensors = sensors.len(),
        path = %options.config.display(),
        "configuration loaded"
    );

    let store = Arc::new(MetricStore::new());
    let poller = Poller::new(
        sensors,
        SensorClient::new(transport),
        Arc::clone(&store),
        options.interval,
    );

    info!("checking sensors once before starting the metrics endpoint");
    if poller.probe(&shutdown).await? == ProbeOutcome::Interrupted {
        info!("shutdown requested during startup probe");
        return Ok(());
    }

    let addr = SocketAddr::new(options.bind, options.port);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::Bind { addr, source })?;

    let server = tokio::spawn(server::serve(listener, store, shutdown.clone()));
    info!(interval = ?options.interval, "starting collection");
    poller.run(shutdown).await;

    // The server watches the same shutdown signal.
    if let Err(error) = server.await {
        warn!(%error, "metrics server task failed");
    }
    Ok(())
}
