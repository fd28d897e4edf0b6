//! Raw pairing request sent straight to the host-local bridge server.
//!
//! Used when the bridge tool has no usable `pair` command. The request is
//! `<4 lowercase hex digits><command>` where the digits carry the byte length
//! of the command. The answer starts with `OKAY` or `FAIL`; a `FAIL` is
//! followed by another 4-hex-digit length and that many bytes of message.

use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use shared::protocol::{HOST_PAIR_PREFIX, STATUS_FAIL, STATUS_OKAY};
use crate::error::WireError;

const HEADER_LEN: usize = 4;
const MAX_PAYLOAD: usize = 0xffff;

pub fn pair_command(password: &str, target: SocketAddrV4) -> String {
    format!("{}{}:{}:{}", HOST_PAIR_PREFIX, password, target.ip(), target.port())
}

/// Prefixes `command` with its length as 4 lowercase hex digits.
pub fn encode_request(command: &str) -> Result<Vec<u8>, WireError> {
    let len = command.len();
    if len > MAX_PAYLOAD {
        return Err(WireError::RequestTooLong(len));
    }

    let mut request = format!("{:04x}", len).into_bytes();
    request.extend_from_slice(command.as_bytes());
    Ok(request)
}

/// Decodes a 4-hex-digit length header.
pub fn decode_length(header: &[u8; HEADER_LEN]) -> Result<usize, WireError> {
    let malformed = || WireError::MalformedLength(String::from_utf8_lossy(header).into_owned());

    if !header.iter().all(u8::is_ascii_hexdigit) {
        return Err(malformed());
    }
    let digits = std::str::from_utf8(header).map_err(|_| malformed())?;
    usize::from_str_radix(digits, 16).map_err(|_| malformed())
}

/// Sends one request over `stream` and reads exactly one answer.
pub async fn exchange<S>(stream: &mut S, command: &str) -> Result<(), WireError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = encode_request(command)?;
    stream.write_all(&request).await?;
    stream.flush().await?;

    let mut status = [0u8; HEADER_LEN];
    stream.read_exact(&mut status).await?;

    if &status == STATUS_OKAY {
        return Ok(());
    }
    if &status != STATUS_FAIL {
        return Err(WireError::UnexpectedStatus(
            String::from_utf8_lossy(&status).into_owned(),
        ));
    }

    let mut header = [0u8; HEADER_LEN];
    stream.read_exact(&mut header).await?;
    let len = decode_length(&header)?;

    let mut message = vec![0u8; len];
    stream.read_exact(&mut message).await?;
    Err(WireError::Fail(String::from_utf8_lossy(&message).into_owned()))
}

/// Client for the bridge server's raw pairing request.
#[derive(Debug, Clone)]
pub struct WireClient {
    server: SocketAddr,
    timeout: Duration,
}

impl WireClient {
    pub fn new(server: SocketAddr, timeout: Duration) -> Self {
        Self { server, timeout }
    }

    /// Pairs with `target` through the bridge server. The connection is
    /// dropped before returning, whatever the outcome.
    pub async fn pair(&self, target: SocketAddrV4, password: &str) -> Result<(), WireError> {
        let command = pair_command(password, target);
        debug!("Sending raw pairing request to {}: {}", self.server, command);

        let result = tokio::time::timeout(self.timeout, async {
            let mut stream = TcpStream::connect(self.server).await?;
            exchange(&mut stream, &command).await
        })
        .await
        .unwrap_or(Err(WireError::Timeout(self.timeout)));

        match &result {
            Ok(()) => info!("Bridge server accepted pairing with {}", target),
            Err(WireError::Fail(message)) => warn!("Bridge server rejected pairing: {}", message),
            Err(e) => warn!("Raw pairing protocol error: {}", e),
        }
        result
    }
}
