// SPDX-FileCopyrightText: 2026 Stan Grams <sjg@haxx.space>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod server;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use rigsync_app::{init_logging, ConfigFile};
use rigsync_backend::{register_builtin_backends_on, BackendRegistry};

use config::RigserveConfig;
use server::SessionRegistry;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - rig control server");
const BIND_ATTEMPTS: u32 = 65;

#[derive(Debug, Parser)]
#[command(version = env!("CARGO_PKG_VERSION"), about = PKG_DESCRIPTION)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// IP address for the control listener
    #[arg(short = 'l', long = "listen")]
    listen: Option<IpAddr>,
    /// Port for the control listener
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
}

/// Bind the listener, retrying once per second up to the attempt bound.
async fn bind_with_retry(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let mut last_err = None;
    for attempt in 1..=BIND_ATTEMPTS {
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
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", RigserveConfig::example_toml());
        return Ok(());
    }

    let (cfg, config_path) = if let Some(ref path) = cli.config {
        match RigserveConfig::load_from_file(path) {
            Ok(cfg) => (cfg, Some(path.clone())),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    } else {
        match RigserveConfig::load_from_default_paths() {
            Ok(found) => found,
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    };
    if let Err(e) = cfg.validate() {
        eprintln!("Invalid rigserved configuration: {}", e);
        std::process::exit(1);
    }

    init_logging(cfg.general.log_level.as_deref());
    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let mut backends = BackendRegistry::new();
    register_builtin_backends_on(&mut backends);

    let mut sessions = SessionRegistry::new();
    for entry in &cfg.rigs {
        if let Err(e) = sessions.open(&backends, &entry.model, &entry.name) {
            error!("Cannot open rig '{}': {}", entry.name, e);
            std::process::exit(1);
        }
    }

    let listen_ip = cli.listen.unwrap_or(cfg.listen.listen);
    let listen_port = cli.port.unwrap_or(cfg.listen.port);
    let addr = SocketAddr::from((listen_ip, listen_port));
    let listener = bind_with_retry(addr).await?;
    info!("rigserved listening on {}", addr);

    tokio::select! {
        result = server::run_server(listener, backends, sessions) => {
            if let Err(e) = result {
                error!("Control server error: {:?}", e);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
        }
    }

    Ok(())
}
