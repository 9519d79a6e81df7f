//! Net wiring: connect, disconnect and swap.
//!
//! ```text
//! selection ──▶ NetDirectory::net_set ──▶ WiringCase::classify
//!                                              │
//!                    ┌──────────┬──────────────┼──────────┐
//!                    ▼          ▼              ▼          ▼
//!                 Attach     Rename          Join       Merge
//!                (prompt)   (prompt)      (no prompt)  (prompt)
//!                    └──────────┴──────┬───────┴──────────┘
//!                                      ▼
//!                          repoint items ──▶ Board::commit
//! ```

pub mod commands;
pub mod directory;
pub mod resolver;

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::board::{BoardError, Net, NetCode, UNCONNECTED};

pub use commands::{disconnect, swap, DisconnectReport, SwapReport};
pub use directory::{NetDirectory, NetSummary};
pub use resolver::resolve_and_apply;

/// Net names the host shows for the unconnected net.
pub const RESERVED_NET_NAMES: &[&str] = &["<no net>", "<no_net>"];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WiringError {
    #[error("To swap pads, you must select {expected} pads and only {expected} pads (found {found})")]
    InvalidSelectionCount { expected: usize, found: usize },
    #[error("Invalid net name \"{0}\": a net needs a non-empty name that is not reserved for unconnected items")]
    InvalidName(String),
    #[error("Selected item refers to net code {0}, which the board does not know")]
    NetNotFound(NetCode),
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Options for wiring commands.
#[derive(Clone, Debug)]
pub struct WiringOptions {
    /// Reject names the host reserves for the unconnected net
    pub reject_reserved_names: bool,
    /// Strip surrounding whitespace from typed names
    pub trim_names: bool,
}

impl Default for WiringOptions {
    fn default() -> Self {
        Self {
            reject_reserved_names: true,
            trim_names: true,
        }
    }
}

/// What a connect request does, decided by the nets the selection touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WiringCase {
    /// Everything selected is unconnected: attach it to a new or existing net.
    Attach,
    /// Everything selected shares one net: rename that net board-wide.
    Rename,
    /// Unconnected items plus one net: join the unconnected items to it.
    Join,
    /// Several nets: merge all of their members into one net.
    Merge,
}

impl WiringCase {
    pub fn classify(net_codes: &BTreeSet<NetCode>) -> Self {
        let has_unconnected = net_codes.contains(&UNCONNECTED);
        match (net_codes.len(), has_unconnected) {
            (1, true) => WiringCase::Attach,
            (1, false) => WiringCase::Rename,
            (2, true) => WiringCase::Join,
            _ => WiringCase::Merge,
        }
    }

    pub fn needs_name(&self) -> bool {
        !matches!(self, WiringCase::Join)
    }

    pub fn prompt_title(&self) -> &'static str {
        match self {
            WiringCase::Attach => "Attach Pads to New or Existing Net",
            WiringCase::Rename => "Rename Net Attached to Pads",
            WiringCase::Join => "Join Unconnected Pads to Net",
            WiringCase::Merge => "Merge Nets Attached to Pads",
        }
    }

    pub fn prompt_tooltip(&self) -> &'static str {
        match self {
            WiringCase::Attach => "Type or select name for the net to connect these pads.",
            WiringCase::Rename => {
                "Type or select a new name for the existing net connecting these pads."
            }
            WiringCase::Join => "",
            WiringCase::Merge => {
                "Type or select name for the net created by merging the nets in this list."
            }
        }
    }
}

impl fmt::Display for WiringCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WiringCase::Attach => write!(f, "attach"),
            WiringCase::Rename => write!(f, "rename"),
            WiringCase::Join => write!(f, "join"),
            WiringCase::Merge => write!(f, "merge"),
        }
    }
}

/// Result of an applied connect request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WiringReport {
    pub case: WiringCase,
    pub net: Net,
    /// Whether the target net was created for this request
    pub created: bool,
    /// Items whose net actually changed
    pub repointed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WiringOutcome {
    Applied(WiringReport),
    /// The user dismissed the name prompt; nothing changed.
    Cancelled,
}

impl WiringOutcome {
    pub fn report(&self) -> Option<&WiringReport> {
        match self {
            WiringOutcome::Applied(report) => Some(report),
            WiringOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, WiringOutcome::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(codes: &[NetCode]) -> BTreeSet<NetCode> {
        codes.iter().copied().collect()
    }

    #[test]
    fn test_classify_cases() {
        assert_eq!(WiringCase::classify(&codes(&[0])), WiringCase::Attach);
        assert_eq!(WiringCase::classify(&codes(&[5])), WiringCase::Rename);
        assert_eq!(WiringCase::classify(&codes(&[0, 5])), WiringCase::Join);
        assert_eq!(WiringCase::classify(&codes(&[4, 5])), WiringCase::Merge);
        assert_eq!(WiringCase::classify(&codes(&[0, 4, 5])), WiringCase::Merge);
        assert_eq!(WiringCase::classify(&codes(&[])), WiringCase::Merge);
    }

    #[test]
    fn test_classification_is_exhaustive() {
        // Every (net count, sentinel present) shape lands in exactly one case
        let mut seen = std::collections::HashMap::new();
        for count in 0..6u32 {
            for with_sentinel in [false, true] {
                if with_sentinel && count == 0 {
                    continue;
                }
                let mut set: BTreeSet<NetCode> = (1..=count).collect();
                if with_sentinel {
                    set.pop_last();
                    set.insert(UNCONNECTED);
                }
                let case = WiringCase::classify(&set);
                let expected = match (set.len(), with_sentinel) {
                    (1, true) => WiringCase::Attach,
                    (1, false) => WiringCase::Rename,
                    (2, true) => WiringCase::Join,
                    _ => WiringCase::Merge,
                };
                assert_eq!(case, expected, "set {:?}", set);
                seen.insert(case, true);
            }
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_only_join_skips_prompt() {
        assert!(WiringCase::Attach.needs_name());
        assert!(WiringCase::Rename.needs_name());
        assert!(!WiringCase::Join.needs_name());
        assert!(WiringCase::Merge.needs_name());
    }
}
