mod bridge;
mod config;
mod credential;
mod error;
mod mdns;
mod orchestrator;
mod pairing;
mod poll;
mod present;
mod probe;
mod report;
mod resolver;
mod wire;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::Parser;
use crate::bridge::AdbBridge;
use crate::config::{parse_ports, Config};
use crate::mdns::browser::MdnsDiscovery;
use crate::orchestrator::Orchestrator;
use crate::present::TerminalPresenter;
use crate::wire::WireClient;

/// Pair and connect an Android device for wireless debugging using a QR code.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "ADB_WIFI_PAIR_CONFIG")]
    config: Option<PathBuf>,

    /// Path to the adb executable
    #[arg(long)]
    adb: Option<PathBuf>,

    /// Only try to reach an already-paired device; never pair
    #[arg(long)]
    connect_only: bool,

    /// Seconds to look for an already-paired device
    #[arg(long, value_name = "SECS")]
    connect_timeout: Option<u64>,

    /// Comma-separated connect ports to try, e.g. 5555,5556
    #[arg(long, value_name = "PORTS")]
    connect_ports: Option<String>,

    /// Service id to advertise in the QR code (requires --password)
    #[arg(long)]
    service_id: Option<String>,

    /// Pairing password (requires --service-id)
    #[arg(long)]
    password: Option<String>,

    /// Print the result as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(adb) = &self.adb {
            config.bridge.adb_path = adb.clone();
        }
        if let Some(secs) = self.connect_timeout {
            config.discovery.reconnect_window_secs = secs;
        }
        if let Some(ports) = &self.connect_ports {
            config.connect.ports = parse_ports(ports);
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "adb_wifi_pair=debug" } else { "adb_wifi_pair=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter))
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    cli.apply(&mut config);
    let timings = config.timings();

    tracing::debug!("Using {:?}", config);

    let credential = credential::from_args_or_generate(cli.service_id.clone(), cli.password.clone());

    let discovery = Arc::new(MdnsDiscovery::new().context("Failed to create mDNS daemon")?);
    let orchestrator = Orchestrator::new(
        Arc::new(AdbBridge::new(&config.bridge.adb_path)),
        discovery.clone(),
        Arc::new(TerminalPresenter),
        WireClient::new(config.bridge.server, timings.server_timeout),
        config.connect.ports.clone(),
        timings,
    );

    let result = orchestrator.run(&credential, cli.connect_only).await;
    discovery.shutdown();
    let report = result.context("mDNS discovery failed")?;

    match report.failed_stage() {
        None => tracing::info!("{}", report),
        Some(stage) => tracing::error!(%stage, "{}", report),
    }

    if cli.json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!("{}", report);
    }

    Ok(ExitCode::from(report.exit_code()))
}
