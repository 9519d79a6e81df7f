//! Disconnect and swap.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::WiringError;
use crate::board::{Board, BoardItem, ItemKind, Net, PadKey, UNCONNECTED};

/// Items moved onto the unconnected net by [`disconnect`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisconnectReport {
    pub pads: usize,
    pub vias: usize,
    /// Selected tracks and zones, which disconnect leaves alone
    pub ignored: usize,
}

impl DisconnectReport {
    pub fn total(&self) -> usize {
        self.pads + self.vias
    }
}

/// The two pads whose nets were exchanged by [`swap`], with the nets they
/// now carry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapReport {
    pub first: (PadKey, Net),
    pub second: (PadKey, Net),
}

/// Move every selected pad and via onto the unconnected net.
///
/// Tracks and zones in the selection are ignored. Running it twice is the
/// same as running it once. The board is committed even if a mutation fails.
pub fn disconnect<B: Board + ?Sized>(board: &mut B) -> Result<DisconnectReport, WiringError> {
    let selection = board.selection();
    let mut report = DisconnectReport {
        pads: 0,
        vias: 0,
        ignored: 0,
    };

    let result = selection.iter().try_for_each(|item| {
        match item.kind {
            ItemKind::Pad => report.pads += 1,
            ItemKind::Via => report.vias += 1,
            ItemKind::Track | ItemKind::Zone => {
                report.ignored += 1;
                return Ok(());
            }
        }
        cut(board, item)
    });
    board.commit();
    result?;

    info!(
        "Disconnected {} pads and {} vias ({} other items ignored)",
        report.pads, report.vias, report.ignored
    );
    Ok(report)
}

fn cut<B: Board + ?Sized>(board: &mut B, item: &BoardItem) -> Result<(), WiringError> {
    board.connectivity_remove(item.id)?;
    board.set_net_code(item.id, UNCONNECTED)?;
    debug!("{} cut from {}", item, item.net);
    Ok(())
}

/// Exchange the nets of exactly two selected pads.
///
/// Anything other than two selected pads is rejected before the board is
/// touched. Swapping the same pair again restores the original wiring.
pub fn swap<B: Board + ?Sized>(board: &mut B) -> Result<SwapReport, WiringError> {
    let pads: Vec<BoardItem> = board.selection().into_iter().filter(BoardItem::is_pad).collect();
    let [first, second] = pads.as_slice() else {
        warn!("Swap needs two selected pads, found {}", pads.len());
        return Err(WiringError::InvalidSelectionCount {
            expected: 2,
            found: pads.len(),
        });
    };

    let result = move_pad(board, first, &second.net).and_then(|()| move_pad(board, second, &first.net));
    board.commit();
    result?;

    info!("Swapped nets of {} and {}", first, second);
    Ok(SwapReport {
        first: (pad_key(first), second.net.clone()),
        second: (pad_key(second), first.net.clone()),
    })
}

/// Put a pad on `net`, keeping its connectivity index entry in step: pads
/// leaving the unconnected net are indexed again, pads joining it are dropped.
fn move_pad<B: Board + ?Sized>(board: &mut B, item: &BoardItem, net: &Net) -> Result<(), WiringError> {
    if net.is_unconnected() {
        if !item.net.is_unconnected() {
            board.connectivity_remove(item.id)?;
        }
        board.set_net_code(item.id, UNCONNECTED)?;
    } else {
        if item.net.is_unconnected() {
            board.connectivity_add(item.id)?;
        }
        board.set_net(item.id, net)?;
    }
    Ok(())
}

fn pad_key(item: &BoardItem) -> PadKey {
    item.pad_key()
        .unwrap_or_else(|| PadKey::new(String::new(), item.id.0.to_string()))
}
