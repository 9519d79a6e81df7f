//! Host Board Interface
//!
//! The wiring logic never owns the board. It reaches the host's pads, tracks,
//! vias, zones and nets through the [`Board`] trait, which is the capability
//! set the commands need: query items, find or create nets, repoint items and
//! commit (rebuild the net list, recompute the ratsnest, refresh the view).
//!
//! [`MemoryBoard`] is a complete in-memory host used by the CLI (loaded from a
//! `.kicad_pcb` file) and by tests.

pub mod memory;
pub mod selector;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use memory::{Airwire, MemoryBoard};
pub use selector::Selector;

/// Host-assigned net code.
pub type NetCode = u32;

/// Code of the reserved "unconnected" net.
pub const UNCONNECTED: NetCode = 0;

/// An electrical net: stable numeric code plus unique display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Net {
    pub code: NetCode,
    pub name: String,
}

impl Net {
    pub fn new(code: NetCode, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
        }
    }

    /// The sentinel net every unconnected item sits on.
    pub fn unconnected() -> Self {
        Self::new(UNCONNECTED, "")
    }

    pub fn is_unconnected(&self) -> bool {
        self.code == UNCONNECTED
    }
}

impl fmt::Display for Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net {} \"{}\"", self.code, self.name)
    }
}

/// Structural type of a net-carrying board element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Pad,
    Track,
    Via,
    Zone,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Pad => write!(f, "pad"),
            ItemKind::Track => write!(f, "track"),
            ItemKind::Via => write!(f, "via"),
            ItemKind::Zone => write!(f, "zone"),
        }
    }
}

/// Opaque host handle for a board element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Identity of a pad across board revisions: owning component reference plus
/// pad number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PadKey {
    pub reference: String,
    pub pad: String,
}

impl PadKey {
    pub fn new(reference: impl Into<String>, pad: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            pad: pad.into(),
        }
    }
}

impl fmt::Display for PadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.reference, self.pad)
    }
}

/// A connectable element as the host reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub net: Net,
    pub selected: bool,
    /// Owning component reference (pads only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Pad number (pads only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pad: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Point>,
}

impl BoardItem {
    pub fn is_pad(&self) -> bool {
        self.kind == ItemKind::Pad
    }

    pub fn is_via(&self) -> bool {
        self.kind == ItemKind::Via
    }

    pub fn pad_key(&self) -> Option<PadKey> {
        match (&self.reference, &self.pad) {
            (Some(reference), Some(pad)) if self.is_pad() => {
                Some(PadKey::new(reference.clone(), pad.clone()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for BoardItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pad_key() {
            Some(key) => write!(f, "pad {}", key),
            None => write!(f, "{} #{}", self.kind, self.id.0),
        }
    }
}

/// Failures reported by the host model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BoardError {
    #[error("Unknown board item #{0}")]
    UnknownItem(usize),
    #[error("Unknown net code {0}")]
    UnknownNet(NetCode),
    #[error("A net named \"{0}\" already exists")]
    DuplicateNetName(String),
    #[error("No board item matches '{0}'")]
    NoMatch(String),
    #[error("Host error: {0}")]
    Host(String),
}

/// Capability set the wiring commands need from the host board.
///
/// Mutations go through [`Board::set_net`] with a complete [`Net`] so that an
/// item's code and name can never disagree; [`Board::set_net_code`] exists for
/// the sentinel and lets the host resolve the name itself.
pub trait Board {
    /// Every pad, track, via and zone.
    fn items(&self) -> Vec<BoardItem>;

    /// Every net the host knows, sentinel included.
    fn nets(&self) -> Vec<Net>;

    fn find_net(&self, code: NetCode) -> Option<Net>;

    fn find_net_by_name(&self, name: &str) -> Option<Net>;

    /// Create and register a new net.
    fn create_net(&mut self, name: &str) -> Result<Net, BoardError>;

    fn set_net(&mut self, id: ItemId, net: &Net) -> Result<(), BoardError>;

    fn set_net_code(&mut self, id: ItemId, code: NetCode) -> Result<(), BoardError>;

    /// Add an item to the connectivity index.
    fn connectivity_add(&mut self, id: ItemId) -> Result<(), BoardError>;

    /// Remove an item from the connectivity index.
    fn connectivity_remove(&mut self, id: ItemId) -> Result<(), BoardError>;

    fn build_list_of_nets(&mut self);

    fn recalculate_ratsnest(&mut self);

    fn refresh(&mut self);

    /// Items currently flagged as selected.
    fn selection(&self) -> Vec<BoardItem> {
        self.items().into_iter().filter(|i| i.selected).collect()
    }

    /// Bring host caches back in line after net reassignment.
    fn commit(&mut self) {
        self.build_list_of_nets();
        self.recalculate_ratsnest();
        self.refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_key_only_for_pads() {
        let mut item = BoardItem {
            id: ItemId(0),
            kind: ItemKind::Pad,
            net: Net::unconnected(),
            selected: false,
            reference: Some("U1".to_string()),
            pad: Some("3".to_string()),
            position: None,
        };
        assert_eq!(item.pad_key(), Some(PadKey::new("U1", "3")));
        assert_eq!(item.to_string(), "pad U1:3");

        item.kind = ItemKind::Via;
        assert_eq!(item.pad_key(), None);
        assert_eq!(item.to_string(), "via #0");
    }

    #[test]
    fn test_pad_key_ordering() {
        let mut keys = vec![
            PadKey::new("U2", "1"),
            PadKey::new("R1", "2"),
            PadKey::new("R1", "1"),
        ];
        keys.sort();
        assert_eq!(keys[0], PadKey::new("R1", "1"));
        assert_eq!(keys[2], PadKey::new("U2", "1"));
    }

    #[test]
    fn test_sentinel() {
        assert!(Net::unconnected().is_unconnected());
        assert!(!Net::new(4, "GND").is_unconnected());
        assert_eq!(Net::new(4, "GND").to_string(), "net 4 \"GND\"");
    }
}
