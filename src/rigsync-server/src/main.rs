// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod control;
mod hub;
mod listener;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::{TcpListener, UdpSocket};
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use rigsync_app::{init_logging, ConfigFile};
use rigsync_core::{Catalog, DynResult};

use config::{LatencyProfile, ServerConfig};
use control::ControlChannel;
use hub::Hub;
use listener::ClientEvent;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - state synchronization hub");
const EVENT_CHANNEL_BUFFER: usize = 256;

#[derive(Debug, Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), about = PKG_DESCRIPTION)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// IP address for the client TCP listener
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
    /// Port for the client TCP listener
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
    /// UDP port broadcasts are sent to on each client host
    #[arg(short = 'u', long = "udp-port")]
    udp_port: Option<u16>,
    /// rigserve control address as <host>:<port>
    #[arg(short = 'a', long = "control")]
    control: Option<String>,
    /// Name of the rig session to drive
    #[arg(short = 'r', long = "rig")]
    rig: Option<String>,
    /// Latency profile for tick pacing
    #[arg(long = "latency", value_enum)]
    latency: Option<LatencyProfile>,
}

/// Merge CLI overrides into the loaded configuration.
fn resolve_config(cli: &Cli, mut cfg: ServerConfig) -> DynResult<ServerConfig> {
    if let Some(listen) = cli.listen {
        cfg.hub.listen = listen;
    }
    if let Some(port) = cli.port {
        cfg.hub.port = port;
    }
    if let Some(udp_port) = cli.udp_port {
        cfg.hub.client_udp_port = udp_port;
    }
    if let Some(ref control) = cli.control {
        let (host, port) = control
            .rsplit_once(':')
            .ok_or("control address must be <host>:<port>")?;
        cfg.control.host = host.to_string();
        cfg.control.port = port
            .parse()
            .map_err(|e| format!("Invalid control port '{}': {}", port, e))?;
    }
    if let Some(ref rig) = cli.rig {
        cfg.control.rig = rig.clone();
    }
    if let Some(latency) = cli.latency {
        cfg.behavior.latency = latency;
    }
    Ok(cfg)
}

/// Bind the client listener, retrying once per second up to the bound.
async fn bind_with_retry(addr: SocketAddr, attempts: u32) -> std::io::Result<TcpListener> {
    let mut last_err = None;
    for attempt in 1..=attempts {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                warn!("Bind {} failed (attempt {}): {}", addr, attempt, e);
                last_err = Some(e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| std::io::Error::other("bind retries exhausted")))
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (cfg, config_path) = if let Some(ref path) = cli.config {
        (ServerConfig::load_from_file(path)?, Some(path.clone()))
    } else {
        ServerConfig::load_from_default_paths()?
    };
    let cfg = resolve_config(&cli, cfg)?;
    cfg.validate()
        .map_err(|e| format!("Invalid rigsyncd configuration: {}", e))?;

    init_logging(cfg.general.log_level.as_deref());
    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let control_addr = format!("{}:{}", cfg.control.host, cfg.control.port);
    info!(
        "Starting rigsyncd (rig: {}, control: {}, latency: {:?})",
        cfg.control.rig, control_addr, cfg.behavior.latency
    );

    // Connectivity faults at startup are retried on a one-second cadence
    // up to the configured bound; past it they are fatal.
    let control = ControlChannel::connect(
        &control_addr,
        cfg.control.rig.clone(),
        Duration::from_millis(cfg.behavior.control_timeout_ms),
        cfg.behavior.connect_attempts,
    )
    .await?;

    let listen_addr = SocketAddr::from((cfg.hub.listen, cfg.hub.port));
    let tcp_listener = bind_with_retry(listen_addr, cfg.behavior.bind_attempts).await?;
    info!("Listening for clients on {}", listen_addr);

    let udp = UdpSocket::bind((cfg.hub.listen, 0)).await?;

    let (events_tx, events_rx) = mpsc::channel::<ClientEvent>(EVENT_CHANNEL_BUFFER);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let udp_port = cfg.hub.client_udp_port;
    let listener_handle = tokio::spawn(async move {
        if let Err(e) = listener::run_listener(tcp_listener, udp_port, events_tx).await {
            error!("Listener error: {:?}", e);
        }
    });

    let hub = Hub::new(
        Catalog::ft897d(),
        control,
        udp,
        cfg.behavior.latency.tick_wait(),
    );
    let hub_handle = tokio::spawn(async move {
        if let Err(e) = hub.run(events_rx, shutdown_rx).await {
            error!("Hub error: {:?}", e);
        }
    });

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    let _ = shutdown_tx.send(true);
    let _ = hub_handle.await;
    listener_handle.abort();
    let _ = listener_handle.await;
    Ok(())
}
