use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use super::{Bridge, BridgeOutput};
use crate::error::BridgeError;

/// Runs the `adb` executable as a subprocess.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    path: PathBuf,
}

impl AdbBridge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn run(&self, args: &[&str], timeout: Duration) -> Result<BridgeOutput, BridgeError> {
        debug!("Running {} {}", self.path.display(), args.join(" "));

        let child = Command::new(&self.path)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, child)
            .await
            .map_err(|_| BridgeError::Timeout(timeout))?
            .map_err(|source| BridgeError::Spawn {
                path: self.path.clone(),
                source,
            })?;

        let output = BridgeOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        debug!(
            "{} exited with {:?}: stdout={:?} stderr={:?}",
            args.first().copied().unwrap_or_default(),
            output.status,
            output.stdout.trim(),
            output.stderr.trim()
        );
        Ok(output)
    }
}

#[async_trait]
impl Bridge for AdbBridge {
    async fn connect(&self, target: SocketAddrV4, timeout: Duration)
        -> Result<BridgeOutput, BridgeError>
    {
        self.run(&["connect", &target.to_string()], timeout).await
    }

    async fn pair(
        &self,
        target: SocketAddrV4,
        password: &str,
        timeout: Duration,
    ) -> Result<BridgeOutput, BridgeError> {
        self.run(&["pair", &target.to_string(), password], timeout).await
    }

    async fn mdns_check(&self, timeout: Duration) -> Result<BridgeOutput, BridgeError> {
        self.run(&["mdns", "check"], timeout).await
    }
}
