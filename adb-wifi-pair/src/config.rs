use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::{BRIDGE_SERVER_PORT, DEFAULT_CONNECT_PORT};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub connect: ConnectConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_adb_path")]
    pub adb_path: PathBuf,
    /// Host-local bridge server used by the raw pairing fallback
    #[serde(default = "default_server")]
    pub server: SocketAddr,
    #[serde(default = "default_pair_timeout")]
    pub pair_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_server_timeout")]
    pub server_timeout_secs: u64,
    #[serde(default = "default_mdns_check_timeout")]
    pub mdns_check_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// How long to look for an already-paired device before pairing
    #[serde(default = "default_reconnect_window")]
    pub reconnect_window_secs: u64,
    /// How long to wait for the QR code to be scanned
    #[serde(default = "default_pairing_window")]
    pub pairing_window_secs: u64,
    #[serde(default = "default_resolve_window")]
    pub resolve_window_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectConfig {
    /// Ports tried after the advertised one
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,
}

/// Every bounded wait the pairing flow performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub poll_interval: Duration,
    pub reconnect_window: Duration,
    pub pairing_window: Duration,
    pub resolve_window: Duration,
    pub pair_timeout: Duration,
    pub connect_timeout: Duration,
    pub server_timeout: Duration,
    pub mdns_check_timeout: Duration,
}

fn default_adb_path() -> PathBuf {
    PathBuf::from("adb")
}

fn default_server() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, BRIDGE_SERVER_PORT))
}

fn default_pair_timeout() -> u64 {
    20
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_server_timeout() -> u64 {
    5
}

fn default_mdns_check_timeout() -> u64 {
    10
}

fn default_reconnect_window() -> u64 {
    5
}

fn default_pairing_window() -> u64 {
    60
}

fn default_resolve_window() -> u64 {
    10
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_ports() -> Vec<u16> {
    vec![DEFAULT_CONNECT_PORT]
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            adb_path: default_adb_path(),
            server: default_server(),
            pair_timeout_secs: default_pair_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            server_timeout_secs: default_server_timeout(),
            mdns_check_timeout_secs: default_mdns_check_timeout(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            reconnect_window_secs: default_reconnect_window(),
            pairing_window_secs: default_pairing_window(),
            resolve_window_secs: default_resolve_window(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            ports: default_ports(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn timings(&self) -> Timings {
        Timings {
            poll_interval: Duration::from_millis(self.discovery.poll_interval_ms.max(1)),
            reconnect_window: Duration::from_secs(self.discovery.reconnect_window_secs),
            pairing_window: Duration::from_secs(self.discovery.pairing_window_secs),
            resolve_window: Duration::from_secs(self.discovery.resolve_window_secs),
            pair_timeout: Duration::from_secs(self.bridge.pair_timeout_secs),
            connect_timeout: Duration::from_secs(self.bridge.connect_timeout_secs),
            server_timeout: Duration::from_secs(self.bridge.server_timeout_secs),
            mdns_check_timeout: Duration::from_secs(self.bridge.mdns_check_timeout_secs),
        }
    }
}

/// Parses a comma-separated port list, skipping entries that are not ports.
pub fn parse_ports(list: &str) -> Vec<u16> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter_map(|p| match p.parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                tracing::warn!("Ignoring invalid port: {}", p);
                None
            }
        })
        .collect()
}
