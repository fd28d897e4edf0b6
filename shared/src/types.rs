use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use serde::{Serialize, Deserialize};
use crate::protocol::{CONNECT_SERVICE_TYPE, PAIRING_SERVICE_TYPE};

/// The two kinds of service a device advertises over mDNS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Pairing,
    Connect,
}

impl ServiceKind {
    /// The DNS-SD service type browsed for this kind
    pub fn service_type(&self) -> &'static str {
        match self {
            ServiceKind::Pairing => PAIRING_SERVICE_TYPE,
            ServiceKind::Connect => CONNECT_SERVICE_TYPE,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_type())
    }
}

/// A resolved service advertisement.
/// Immutable once handed to a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAdvertisement {
    pub kind: ServiceKind,

    /// Full DNS-SD instance name, e.g. "studio-ab12cd34._adb-tls-pairing._tcp.local."
    pub instance_name: String,

    /// IPv4 addresses, in the order they were resolved
    pub addresses: Vec<Ipv4Addr>,

    /// Advertised service port
    pub port: u16,
}

impl ServiceAdvertisement {
    /// Instance name up to, not including, the first `.`
    pub fn instance_label(&self) -> &str {
        self.instance_name
            .split('.')
            .next()
            .unwrap_or_default()
    }
}

/// One-time credential shown to the user as a QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingCredential {
    /// Must equal the instance label of the pairing advertisement
    pub service_id: String,
    pub password: String,
}

/// Address and port a device was reached on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOutcome {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl ConnectionOutcome {
    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.address, self.port)
    }
}

impl fmt::Display for ConnectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
