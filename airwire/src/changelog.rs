//! Record of pad net reassignments since the session started.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::board::{Board, NetCode, PadKey};

#[derive(Debug, Error)]
pub enum ChangeLogError {
    #[error("Cannot write change log to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Net a pad was on when a snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetAssignment {
    pub name: String,
    pub code: NetCode,
}

/// Pad → net mapping at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetSnapshot {
    pads: BTreeMap<PadKey, NetAssignment>,
}

impl NetSnapshot {
    /// Record the net of every pad on the board.
    pub fn capture<B: Board + ?Sized>(board: &B) -> Self {
        let pads = board
            .items()
            .into_iter()
            .filter_map(|item| {
                let key = item.pad_key()?;
                Some((
                    key,
                    NetAssignment {
                        name: item.net.name,
                        code: item.net.code,
                    },
                ))
            })
            .collect();
        Self { pads }
    }

    pub fn get(&self, key: &PadKey) -> Option<&NetAssignment> {
        self.pads.get(key)
    }

    pub fn len(&self) -> usize {
        self.pads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PadKey, &NetAssignment)> {
        self.pads.iter()
    }

    /// Pads whose net differs between `self` (the baseline) and `current`,
    /// ordered by reference then pad.
    ///
    /// Pads present in only one of the snapshots are skipped.
    pub fn diff(&self, current: &NetSnapshot) -> Vec<PadChange> {
        for key in self.pads.keys().filter(|k| !current.pads.contains_key(k)) {
            debug!("Pad {} no longer on the board, skipped", key);
        }

        current
            .pads
            .iter()
            .filter_map(|(key, new)| match self.pads.get(key) {
                Some(old) if old != new => Some(PadChange {
                    key: key.clone(),
                    old: old.clone(),
                    new: new.clone(),
                }),
                Some(_) => None,
                None => {
                    debug!("Pad {} not in the baseline, skipped", key);
                    None
                }
            })
            .collect()
    }
}

/// One pad moved from one net to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PadChange {
    pub key: PadKey,
    pub old: NetAssignment,
    pub new: NetAssignment,
}

impl fmt::Display for PadChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Part {}: Pad {} moved from (net {} \"{}\") to (net {} \"{}\").",
            self.key.reference,
            self.key.pad,
            self.old.code,
            self.old.name,
            self.new.code,
            self.new.name
        )
    }
}

/// Write one line per change to `path`, replacing any existing file.
///
/// Returns the number of lines written.
pub fn write_changes(path: &Path, changes: &[PadChange]) -> Result<usize, ChangeLogError> {
    let io_err = |source: std::io::Error| ChangeLogError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);
    for change in changes {
        writeln!(out, "{}", change).map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;

    info!("Wrote {} wiring changes to {}", changes.len(), path.display());
    Ok(changes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{MemoryBoard, UNCONNECTED};
    use tempfile::TempDir;

    fn assignment(name: &str, code: NetCode) -> NetAssignment {
        NetAssignment {
            name: name.to_string(),
            code,
        }
    }

    #[test]
    fn test_capture_only_pads() {
        let mut board = MemoryBoard::new();
        board.insert_net(3, "GND").unwrap();
        board.add_pad("R1", "2", 3).unwrap();
        board.add_via(3).unwrap();

        let snapshot = NetSnapshot::capture(&board);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(
            snapshot.get(&PadKey::new("R1", "2")),
            Some(&assignment("GND", 3))
        );
    }

    #[test]
    fn test_diff_sorted_and_skips_unmatched() {
        let mut board = MemoryBoard::new();
        board.insert_net(1, "A").unwrap();
        board.insert_net(2, "B").unwrap();
        let u2 = board.add_pad("U2", "1", 1).unwrap();
        let r1 = board.add_pad("R1", "1", 1).unwrap();
        board.add_pad("R1", "2", 2).unwrap();
        let baseline = NetSnapshot::capture(&board);

        board.set_net_code(u2, 2).unwrap();
        board.set_net_code(r1, UNCONNECTED).unwrap();
        board.add_pad("C9", "1", 2).unwrap();
        let changes = baseline.diff(&NetSnapshot::capture(&board));

        let keys: Vec<String> = changes.iter().map(|c| c.key.to_string()).collect();
        assert_eq!(keys, vec!["R1:1", "U2:1"]);
        assert_eq!(changes[0].new, assignment("", 0));
    }

    #[test]
    fn test_rename_is_a_change() {
        let baseline = NetSnapshot {
            pads: [(PadKey::new("U1", "1"), assignment("N1", 4))].into_iter().collect(),
        };
        let current = NetSnapshot {
            pads: [(PadKey::new("U1", "1"), assignment("N2", 4))].into_iter().collect(),
        };
        assert_eq!(baseline.diff(&current).len(), 1);
        assert!(baseline.diff(&baseline).is_empty());
    }

    #[test]
    fn test_line_format() {
        let change = PadChange {
            key: PadKey::new("U1", "3"),
            old: assignment("", 0),
            new: assignment("GND", 7),
        };
        assert_eq!(
            change.to_string(),
            "Part U1: Pad 3 moved from (net 0 \"\") to (net 7 \"GND\")."
        );
    }

    #[test]
    fn test_write_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("changes.txt");
        let changes = vec![PadChange {
            key: PadKey::new("U1", "3"),
            old: assignment("", 0),
            new: assignment("GND", 7),
        }];

        let written = write_changes(&path, &changes).unwrap();

        assert_eq!(written, 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Part U1: Pad 3 moved from (net 0 \"\") to (net 7 \"GND\").\n");
    }

    #[test]
    fn test_write_changes_bad_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("changes.txt");

        let err = write_changes(&path, &[]).unwrap_err();

        match err {
            ChangeLogError::Io { path: reported, .. } => assert_eq!(reported, path),
        }
    }
}
