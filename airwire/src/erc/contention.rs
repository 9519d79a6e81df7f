//! Contention check over the nets of a board.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{ContentionLevel, PinContention, PinFunction};
use crate::board::{Board, Net, NetCode, PadKey};

/// Where pin functions come from.
pub trait PinFunctionSource {
    fn pin_function(&self, key: &PadKey) -> Option<PinFunction>;
}

impl PinFunctionSource for BTreeMap<PadKey, PinFunction> {
    fn pin_function(&self, key: &PadKey) -> Option<PinFunction> {
        self.get(key).copied()
    }
}

/// Two pads on one net whose functions clash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinConflict {
    pub first: PadKey,
    pub first_function: PinFunction,
    pub second: PadKey,
    pub second_function: PinFunction,
    pub level: ContentionLevel,
}

/// A net with at least one clashing pin pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetContention {
    pub net: Net,
    pub level: ContentionLevel,
    pub conflicts: Vec<PinConflict>,
    /// Pads on the net whose function could not be determined
    pub unknown_pins: Vec<PadKey>,
}

/// Report every real net whose pads include a pair rated WARNING or worse.
pub fn check_nets<B, S>(board: &B, source: &S, matrix: &PinContention) -> Vec<NetContention>
where
    B: Board + ?Sized,
    S: PinFunctionSource + ?Sized,
{
    let mut pads_by_net: BTreeMap<NetCode, (Net, Vec<PadKey>)> = BTreeMap::new();
    for item in board.items() {
        if item.net.is_unconnected() {
            continue;
        }
        if let Some(key) = item.pad_key() {
            pads_by_net
                .entry(item.net.code)
                .or_insert_with(|| (item.net.clone(), Vec::new()))
                .1
                .push(key);
        }
    }

    let mut report = Vec::new();
    for (net, mut pads) in pads_by_net.into_values() {
        pads.sort();
        let mut known = Vec::new();
        let mut unknown_pins = Vec::new();
        for key in pads {
            match source.pin_function(&key) {
                Some(function) => known.push((key, function)),
                None => unknown_pins.push(key),
            }
        }
        if !unknown_pins.is_empty() {
            debug!("{}: no pin function for {} pads", net, unknown_pins.len());
        }

        let mut conflicts = Vec::new();
        for (i, (first, first_function)) in known.iter().enumerate() {
            for (second, second_function) in &known[i + 1..] {
                let level = matrix.contention(*first_function, *second_function);
                if level > ContentionLevel::Ok {
                    conflicts.push(PinConflict {
                        first: first.clone(),
                        first_function: *first_function,
                        second: second.clone(),
                        second_function: *second_function,
                        level,
                    });
                }
            }
        }

        if let Some(level) = conflicts.iter().map(|c| c.level).max() {
            report.push(NetContention {
                net,
                level,
                conflicts,
                unknown_pins,
            });
        }
    }

    info!("Contention check: {} nets with conflicts", report.len());
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{MemoryBoard, UNCONNECTED};

    #[test]
    fn test_check_nets_reports_clashes_only() {
        let mut board = MemoryBoard::new();
        board.insert_net(1, "BUS").unwrap();
        board.insert_net(2, "OK").unwrap();
        board.add_pad("U1", "1", 1).unwrap();
        board.add_pad("U2", "1", 1).unwrap();
        board.add_pad("R1", "1", 1).unwrap();
        board.add_pad("U1", "2", 2).unwrap();
        board.add_pad("U2", "2", 2).unwrap();
        board.add_pad("U3", "1", UNCONNECTED).unwrap();

        let functions: BTreeMap<PadKey, PinFunction> = [
            (PadKey::new("U1", "1"), PinFunction::Output),
            (PadKey::new("U2", "1"), PinFunction::Output),
            (PadKey::new("U1", "2"), PinFunction::Output),
            (PadKey::new("U2", "2"), PinFunction::Input),
            (PadKey::new("U3", "1"), PinFunction::NoConnect),
        ]
        .into_iter()
        .collect();

        let report = check_nets(&board, &functions, &PinContention::new());

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].net.name, "BUS");
        assert_eq!(report[0].level, ContentionLevel::Error);
        assert_eq!(report[0].conflicts.len(), 1);
        assert_eq!(report[0].unknown_pins, vec![PadKey::new("R1", "1")]);
    }

    #[test]
    fn test_warning_level() {
        let mut board = MemoryBoard::new();
        board.insert_net(1, "EN").unwrap();
        board.add_pad("U1", "1", 1).unwrap();
        board.add_pad("U2", "1", 1).unwrap();
        let functions: BTreeMap<PadKey, PinFunction> = [
            (PadKey::new("U1", "1"), PinFunction::TriState),
            (PadKey::new("U2", "1"), PinFunction::PowerIn),
        ]
        .into_iter()
        .collect();

        let report = check_nets(&board, &functions, &PinContention::new());

        assert_eq!(report[0].level, ContentionLevel::Warning);
    }
}
