//! Read-only queries over the host's nets and their members.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::WiringError;
use crate::board::{Board, BoardItem, ItemKind, Net, NetCode, UNCONNECTED};

/// Member counts of one net, by item kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetSummary {
    pub net: Net,
    pub pads: usize,
    pub tracks: usize,
    pub vias: usize,
    pub zones: usize,
}

impl NetSummary {
    pub fn members(&self) -> usize {
        self.pads + self.tracks + self.vias + self.zones
    }
}

pub struct NetDirectory;

impl NetDirectory {
    /// Names of every real net on the board, sorted.
    pub fn net_names<B: Board + ?Sized>(board: &B) -> Vec<String> {
        let mut names: Vec<String> = board
            .nets()
            .into_iter()
            .filter(|net| !net.is_unconnected())
            .map(|net| net.name)
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Distinct net codes touched by a set of items.
    pub fn net_set(items: &[BoardItem]) -> BTreeSet<NetCode> {
        items.iter().map(|item| item.net.code).collect()
    }

    /// Every item, anywhere on the board, on one of `codes`.
    pub fn items_on_nets<B: Board + ?Sized>(board: &B, codes: &BTreeSet<NetCode>) -> Vec<BoardItem> {
        board
            .items()
            .into_iter()
            .filter(|item| codes.contains(&item.net.code))
            .collect()
    }

    /// Display names of the real nets among `codes`, sorted.
    pub fn names_of<B: Board + ?Sized>(
        board: &B,
        codes: &BTreeSet<NetCode>,
    ) -> Result<Vec<String>, WiringError> {
        let mut names = Vec::new();
        for &code in codes.iter().filter(|&&code| code != UNCONNECTED) {
            let net = board.find_net(code).ok_or(WiringError::NetNotFound(code))?;
            names.push(net.name);
        }
        names.sort();
        Ok(names)
    }

    /// Per-net member counts for every net the board knows.
    pub fn summaries<B: Board + ?Sized>(board: &B) -> Vec<NetSummary> {
        let mut summaries: BTreeMap<NetCode, NetSummary> = board
            .nets()
            .into_iter()
            .map(|net| {
                (
                    net.code,
                    NetSummary {
                        net,
                        pads: 0,
                        tracks: 0,
                        vias: 0,
                        zones: 0,
                    },
                )
            })
            .collect();

        for item in board.items() {
            if let Some(summary) = summaries.get_mut(&item.net.code) {
                match item.kind {
                    ItemKind::Pad => summary.pads += 1,
                    ItemKind::Track => summary.tracks += 1,
                    ItemKind::Via => summary.vias += 1,
                    ItemKind::Zone => summary.zones += 1,
                }
            }
        }

        summaries.into_values().collect()
    }
}
