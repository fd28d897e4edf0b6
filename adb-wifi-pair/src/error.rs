use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to run the bridge tool at all. A run that completes with a
/// failing exit status is not an error; see [`crate::bridge::verdict`].
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to run {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bridge tool did not finish within {0:?}")]
    Timeout(Duration),
}

/// Errors of the raw length-prefixed pairing protocol.
#[derive(Debug, Error)]
pub enum WireError {
    /// The server answered `FAIL` with this message
    #[error("{0}")]
    Fail(String),

    #[error("unexpected status {0:?}")]
    UnexpectedStatus(String),

    #[error("malformed length header {0:?}")]
    MalformedLength(String),

    #[error("request of {0} bytes does not fit a 4-digit length header")]
    RequestTooLong(usize),

    #[error("bridge server did not answer within {0:?}")]
    Timeout(Duration),

    #[error("bridge server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WireError {
    /// Everything except an explicit `FAIL` answer
    pub fn is_violation(&self) -> bool {
        !matches!(self, WireError::Fail(_))
    }
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("mDNS discovery unavailable: {0}")]
    Unavailable(#[from] mdns_sd::Error),
}
