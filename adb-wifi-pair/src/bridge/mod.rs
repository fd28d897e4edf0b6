pub mod adb;
pub mod verdict;

use std::net::SocketAddrV4;
use std::time::Duration;
use async_trait::async_trait;
use crate::error::BridgeError;

pub use adb::AdbBridge;

/// Captured result of one bridge tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeOutput {
    /// None when the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl BridgeOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// The external tool that performs the actual device transport operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Bridge: Send + Sync + 'static {
    async fn connect(&self, target: SocketAddrV4, timeout: Duration)
        -> Result<BridgeOutput, BridgeError>;

    async fn pair(
        &self,
        target: SocketAddrV4,
        password: &str,
        timeout: Duration,
    ) -> Result<BridgeOutput, BridgeError>;

    /// Asks the tool whether its own mDNS backend works
    async fn mdns_check(&self, timeout: Duration) -> Result<BridgeOutput, BridgeError>;
}
