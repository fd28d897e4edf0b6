use std::net::SocketAddrV4;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use crate::bridge::verdict::{pair_verdict, PairVerdict};
use crate::bridge::Bridge;
use crate::mdns::browser::Discovery;
use crate::probe::{connect_candidates, PortProber};
use crate::report::{PairingReport, Stage};
use crate::resolver::ConnectPortResolver;
use crate::wire::WireClient;

/// What to do when the connect port cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnUnresolved {
    /// Probe configured ports and the pairing port anyway
    Probe,
    /// Report pairing only
    Skip,
}

/// Pairs with a matched device and then tries to connect to it.
pub struct Handshake<B, D> {
    bridge: Arc<B>,
    wire: WireClient,
    resolver: ConnectPortResolver<D>,
    prober: Arc<PortProber<B>>,
    connect_ports: Arc<[u16]>,
    pair_timeout: Duration,
}

impl<B: Bridge, D: Discovery> Handshake<B, D> {
    pub fn new(
        bridge: Arc<B>,
        wire: WireClient,
        resolver: ConnectPortResolver<D>,
        prober: Arc<PortProber<B>>,
        connect_ports: Arc<[u16]>,
        pair_timeout: Duration,
    ) -> Self {
        Self {
            bridge,
            wire,
            resolver,
            prober,
            connect_ports,
            pair_timeout,
        }
    }

    pub async fn run(&self, target: SocketAddrV4, password: &str) -> PairingReport {
        info!(stage = %Stage::PairPrimary, "Pairing with {}", target);

        let output = match self.bridge.pair(target, password, self.pair_timeout).await {
            Ok(output) => output,
            Err(e) => {
                error!("Pair command failed: {}", e);
                return PairingReport::BridgeFailed {
                    stage: Stage::PairPrimary,
                    detail: e.to_string(),
                };
            }
        };

        match pair_verdict(&output) {
            PairVerdict::Paired => {
                info!("Paired with {}", target);
                self.connect_after_pairing(target, OnUnresolved::Probe).await
            }
            PairVerdict::Unsupported => {
                warn!(
                    stage = %Stage::PairFallback,
                    "Pair command unsupported or failed (exit {:?}), falling back to raw protocol",
                    output.status
                );
                match self.wire.pair(target, password).await {
                    Ok(()) => self.connect_after_pairing(target, OnUnresolved::Skip).await,
                    Err(e) if e.is_violation() => PairingReport::FallbackProtocolError {
                        reason: e.to_string(),
                    },
                    Err(e) => PairingReport::FallbackRejected {
                        message: e.to_string(),
                    },
                }
            }
            PairVerdict::Rejected => {
                let detail = output.combined().trim().to_string();
                error!("Pairing with {} rejected: {}", target, detail);
                PairingReport::PairingRejected { detail }
            }
        }
    }

    async fn connect_after_pairing(&self, target: SocketAddrV4, on_unresolved: OnUnresolved) -> PairingReport {
        let address = *target.ip();
        let paired_only = PairingReport::PairedNotConnected {
            address,
            pairing_port: target.port(),
        };

        info!(stage = %Stage::ConnectAttempt, "Looking for the connect port of {}", address);
        let resolved = match self.resolver.resolve(address).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("Connect port lookup failed: {}", e);
                None
            }
        };

        if resolved.is_none() && on_unresolved == OnUnresolved::Skip {
            return paired_only;
        }

        let ports = connect_candidates(resolved, &self.connect_ports, target.port());
        match self.prober.probe(&[address], &ports).await {
            Some(outcome) => PairingReport::Connected(outcome),
            None => {
                warn!("Paired with {} but none of ports {:?} connected", address, ports);
                paired_only
            }
        }
    }
}
