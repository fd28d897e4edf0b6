use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use shared::types::ConnectionOutcome;
use crate::bridge::{verdict::connect_succeeded, Bridge};

fn push_unique(ports: &mut Vec<u16>, port: u16) {
    if !ports.contains(&port) {
        ports.push(port);
    }
}

/// Probe order for an advertised service: the advertised port, then the
/// configured ports in order, without duplicates.
pub fn candidate_ports(advertised: u16, configured: &[u16]) -> Vec<u16> {
    let mut ports = Vec::with_capacity(configured.len() + 1);
    push_unique(&mut ports, advertised);
    for &port in configured {
        push_unique(&mut ports, port);
    }
    ports
}

/// Probe order after pairing: the resolved connect port if any, the
/// configured ports, then the port pairing happened on.
pub fn connect_candidates(resolved: Option<u16>, configured: &[u16], pairing_port: u16) -> Vec<u16> {
    let mut ports = Vec::with_capacity(configured.len() + 2);
    if let Some(port) = resolved {
        push_unique(&mut ports, port);
    }
    for &port in configured {
        push_unique(&mut ports, port);
    }
    push_unique(&mut ports, pairing_port);
    ports
}

/// Tries address/port combinations through the bridge until one connects.
pub struct PortProber<B> {
    bridge: Arc<B>,
    attempt_timeout: Duration,
}

impl<B: Bridge> PortProber<B> {
    pub fn new(bridge: Arc<B>, attempt_timeout: Duration) -> Self {
        Self {
            bridge,
            attempt_timeout,
        }
    }

    /// Every address is tried with every port, in the given order. Failed
    /// attempts are logged and skipped.
    pub async fn probe(&self, addresses: &[Ipv4Addr], ports: &[u16]) -> Option<ConnectionOutcome> {
        for &address in addresses {
            for &port in ports {
                let target = SocketAddrV4::new(address, port);
                debug!("Connecting to {}", target);

                match self.bridge.connect(target, self.attempt_timeout).await {
                    Ok(output) if connect_succeeded(&output) => {
                        info!("Connected to {}", target);
                        return Some(ConnectionOutcome { address, port });
                    }
                    Ok(output) => {
                        debug!("Connect to {} failed: {}", target, output.combined().trim());
                    }
                    Err(e) => {
                        warn!("Connect attempt to {} failed: {}", target, e);
                    }
                }
            }
        }

        None
    }
}
