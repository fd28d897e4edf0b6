use std::fmt;
use std::net::Ipv4Addr;
use serde::Serialize;
use shared::types::ConnectionOutcome;

/// Steps of a pairing run, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Reconnect,
    PairingAdvertised,
    PairingMatched,
    PairPrimary,
    PairFallback,
    ConnectAttempt,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Reconnect => "reconnect",
            Stage::PairingAdvertised => "pairing discovery",
            Stage::PairingMatched => "pairing match",
            Stage::PairPrimary => "pairing",
            Stage::PairFallback => "fallback pairing",
            Stage::ConnectAttempt => "connect",
        };
        f.write_str(name)
    }
}

/// Terminal result of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PairingReport {
    /// An already-paired device was reached without pairing
    Reconnected(ConnectionOutcome),
    /// Paired, then connected
    Connected(ConnectionOutcome),
    /// Paired, but no connect port answered
    PairedNotConnected { address: Ipv4Addr, pairing_port: u16 },
    /// Connect-only run found nothing
    NoPairedDevice,
    /// No pairing advertisement carried our service id in time
    NoPairingMatch,
    /// The bridge's pair command ran but did not report success
    PairingRejected { detail: String },
    /// The bridge server answered FAIL
    FallbackRejected { message: String },
    /// The bridge server could not be spoken to
    FallbackProtocolError { reason: String },
    /// The bridge tool itself could not be run
    BridgeFailed { stage: Stage, detail: String },
}

impl PairingReport {
    /// Pairing without a connection still counts as success
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            PairingReport::Reconnected(_)
                | PairingReport::Connected(_)
                | PairingReport::PairedNotConnected { .. }
        )
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// The stage a failed run stopped at
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            PairingReport::NoPairedDevice => Some(Stage::Reconnect),
            PairingReport::NoPairingMatch => Some(Stage::PairingAdvertised),
            PairingReport::PairingRejected { .. } => Some(Stage::PairPrimary),
            PairingReport::FallbackRejected { .. }
            | PairingReport::FallbackProtocolError { .. } => Some(Stage::PairFallback),
            PairingReport::BridgeFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl fmt::Display for PairingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingReport::Reconnected(outcome) => {
                write!(f, "Connected to already-paired device at {}", outcome)
            }
            PairingReport::Connected(outcome) => {
                write!(f, "Paired and connected to {}", outcome)
            }
            PairingReport::PairedNotConnected { address, pairing_port } => write!(
                f,
                "Paired with {}:{}, but automatic connection failed; connect manually",
                address, pairing_port
            ),
            PairingReport::NoPairedDevice => {
                write!(f, "No reachable paired device found")
            }
            PairingReport::NoPairingMatch => write!(
                f,
                "No device found for pairing; make sure wireless debugging is on and the QR pairing screen is open"
            ),
            PairingReport::PairingRejected { detail } => {
                write!(f, "Pairing rejected: {}", detail)
            }
            PairingReport::FallbackRejected { message } => {
                write!(f, "Fallback pairing rejected: {}", message)
            }
            PairingReport::FallbackProtocolError { reason } => {
                write!(f, "Fallback pairing failed: {}", reason)
            }
            PairingReport::BridgeFailed { stage, detail } => {
                write!(f, "Bridge tool failed during {}: {}", stage, detail)
            }
        }
    }
}
