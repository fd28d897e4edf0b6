//! Interpretation of bridge tool output.
//!
//! The tool reports results as free text, so all marker matching lives here.

use super::BridgeOutput;

/// Marker the tool prints on stdout after a successful pairing
pub const PAIR_SUCCESS_MARKER: &str = "Successfully";

/// stderr fragments meaning the `pair` command cannot be used
pub const PAIR_UNSUPPORTED_MARKERS: [&str; 3] = ["pair", "unknown command", "not recognized"];

/// Lowercased fragments meaning a connection is up
pub const CONNECTED_MARKERS: [&str; 2] = ["connected to", "already connected"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairVerdict {
    Paired,
    /// Fall back to the raw pairing protocol
    Unsupported,
    Rejected,
}

/// A non-zero exit or an unsupported marker on stderr is checked before
/// the success marker, so a failing run never counts as paired.
pub fn pair_verdict(output: &BridgeOutput) -> PairVerdict {
    let unsupported = PAIR_UNSUPPORTED_MARKERS
        .iter()
        .any(|marker| output.stderr.contains(marker));

    if !output.success() || unsupported {
        PairVerdict::Unsupported
    } else if output.stdout.contains(PAIR_SUCCESS_MARKER) {
        PairVerdict::Paired
    } else {
        PairVerdict::Rejected
    }
}

pub fn connect_succeeded(output: &BridgeOutput) -> bool {
    let combined = output.combined().to_lowercase();
    output.success() || CONNECTED_MARKERS.iter().any(|marker| combined.contains(marker))
}
