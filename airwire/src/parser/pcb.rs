//! KiCAD PCB Board Files
//!
//! Loads a `.kicad_pcb` file into a [`MemoryBoard`] and writes net changes
//! back into the original S-expression tree, leaving everything else as it
//! was read.
//!
//! Net-bearing nodes:
//! - top-level `(net N "name")` table (absent in KiCad 10, where items
//!   carry `(net "name")` only)
//! - `(pad ...)` inside `(footprint ...)` / `(module ...)`: `(net N "name")`,
//!   absent when unconnected
//! - `(segment ...)`, `(arc ...)`, `(via ...)`: `(net N)`
//! - `(zone ...)`: `(net N)` plus `(net_name "name")`

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::board::{
    Board, BoardError, ItemId, ItemKind, MemoryBoard, Net, NetCode, Point, UNCONNECTED,
};
use crate::parser::sexp::{ParseError, SExp, SExpParser};

#[derive(Debug, Error)]
pub enum PcbParseError {
    #[error("S-expression parse error: {0}")]
    SExpParse(#[from] ParseError),
    #[error("Cannot access board file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid PCB format: {0}")]
    InvalidFormat(String),
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// Where an item's node sits in the tree: child indices from the root.
#[derive(Debug, Clone)]
struct ItemLocation {
    path: Vec<usize>,
}

/// Net reference as written on an item.
enum NetRef {
    Code(NetCode, Option<String>),
    Name(String),
}

/// A parsed board file together with the board model built from it.
#[derive(Debug, Clone)]
pub struct KicadPcb {
    root: SExp,
    board: MemoryBoard,
    /// Indexed by `ItemId`
    locations: Vec<ItemLocation>,
}

impl KicadPcb {
    pub fn parse_file(path: &Path) -> Result<Self, PcbParseError> {
        let content = std::fs::read_to_string(path).map_err(|source| PcbParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let pcb = Self::parse_str(&content)?;
        info!(
            "Loaded {}: {} nets, {} items",
            path.display(),
            pcb.board.nets().len(),
            pcb.locations.len()
        );
        Ok(pcb)
    }

    pub fn parse_str(content: &str) -> Result<Self, PcbParseError> {
        let root = SExpParser::new(content).parse()?;
        match root.tag() {
            Some("kicad_pcb") => {}
            Some(other) => {
                return Err(PcbParseError::InvalidFormat(format!(
                    "Expected kicad_pcb, found {}",
                    other
                )))
            }
            None => {
                return Err(PcbParseError::InvalidFormat(
                    "Expected kicad_pcb root".to_string(),
                ))
            }
        }

        let mut pcb = KicadPcb {
            board: MemoryBoard::new(),
            locations: Vec::new(),
            root: SExp::List(Vec::new()),
        };
        let top = root.as_list().unwrap_or_default();

        // Net table first: items may appear before it in hand-edited files
        for node in top.iter().filter(|node| node.is_tagged("net")) {
            let (code, name) = Self::parse_net_decl(node)?;
            pcb.board.insert_net(code, &name)?;
        }

        for (idx, node) in top.iter().enumerate() {
            match node.tag() {
                Some("footprint") | Some("module") => pcb.parse_footprint(node, idx)?,
                Some(tag @ ("segment" | "arc" | "via" | "zone")) => {
                    let kind = match tag {
                        "via" => ItemKind::Via,
                        "zone" => ItemKind::Zone,
                        _ => ItemKind::Track,
                    };
                    let position = match kind {
                        ItemKind::Track => Self::parse_xy(node, "start"),
                        _ => Self::parse_at(node).map(|(point, _)| point),
                    };
                    let code = pcb.resolve_net(Self::read_net(node, kind))?;
                    let id = match kind {
                        ItemKind::Via => pcb.board.add_via(code)?,
                        ItemKind::Zone => pcb.board.add_zone(code)?,
                        _ => pcb.board.add_track(code)?,
                    };
                    pcb.place(id, position, vec![idx])?;
                }
                _ => {}
            }
        }

        pcb.root = root;
        Ok(pcb)
    }

    pub fn board(&self) -> &MemoryBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut MemoryBoard {
        &mut self.board
    }

    /// The original tree with every item's current net written into it and
    /// the net table rebuilt.
    pub fn to_sexp(&self) -> SExp {
        let mut root = self.root.clone();

        for (idx, location) in self.locations.iter().enumerate() {
            let Some(item) = self.board.item(ItemId(idx)) else {
                continue;
            };
            let Some(node) = root.at_path_mut(&location.path) else {
                warn!("Lost track of {} while writing", item);
                continue;
            };
            Self::write_item_net(node, item.kind, &item.net);
        }

        Self::write_net_table(&mut root, &self.board.nets());
        root
    }

    pub fn save(&self, path: &Path) -> Result<(), PcbParseError> {
        std::fs::write(path, self.to_string()).map_err(|source| PcbParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Saved {}", path.display());
        Ok(())
    }

    fn parse_footprint(&mut self, node: &SExp, idx: usize) -> Result<(), PcbParseError> {
        let reference = Self::footprint_reference(node).unwrap_or_else(|| {
            warn!("Footprint at index {} has no reference", idx);
            "?".to_string()
        });
        let (origin, rotation) = Self::parse_at(node).unwrap_or_default();

        for (pad_idx, pad) in node.as_list().unwrap_or_default().iter().enumerate() {
            if !pad.is_tagged("pad") {
                continue;
            }
            let number = pad
                .as_list()
                .and_then(|list| list.get(1))
                .and_then(|n| n.as_atom())
                .unwrap_or("");
            let code = self.resolve_net(Self::read_net(pad, ItemKind::Pad))?;
            let id = self.board.add_pad(&reference, number, code)?;
            let position = Self::parse_at(pad).map(|(offset, _)| rotate(origin, offset, rotation));
            self.place(id, position, vec![idx, pad_idx])?;
        }
        Ok(())
    }

    fn place(&mut self, id: ItemId, position: Option<Point>, path: Vec<usize>) -> Result<(), PcbParseError> {
        if let Some(position) = position {
            self.board.set_position(id, position)?;
        }
        self.locations.push(ItemLocation { path });
        Ok(())
    }

    fn footprint_reference(node: &SExp) -> Option<String> {
        let list = node.as_list()?;
        list.iter().find_map(|child| {
            let fields = child.as_list()?;
            let tag = child.tag()?;
            let key = fields.get(1)?.as_atom()?;
            let value = fields.get(2)?.as_atom()?;
            match (tag, key) {
                ("property", "Reference") | ("fp_text", "reference") => Some(value.to_string()),
                _ => None,
            }
        })
    }

    fn parse_net_decl(node: &SExp) -> Result<(NetCode, String), PcbParseError> {
        let list = node.as_list().unwrap_or_default();
        let code = list
            .get(1)
            .and_then(|c| c.as_atom())
            .and_then(|c| c.parse().ok())
            .ok_or_else(|| PcbParseError::InvalidFormat(format!("Bad net declaration: {}", node)))?;
        let name = list.get(2).and_then(|n| n.as_atom()).unwrap_or("");
        Ok((code, name.to_string()))
    }

    fn read_net(node: &SExp, kind: ItemKind) -> Option<NetRef> {
        let net = node.child("net")?.as_list()?;
        let net_ref = match net.get(1)? {
            SExp::Atom(code) => match code.parse::<NetCode>() {
                Ok(code) => {
                    let name = match kind {
                        ItemKind::Zone => node
                            .child("net_name")
                            .and_then(|n| n.as_list())
                            .and_then(|n| n.get(1))
                            .and_then(|n| n.as_atom()),
                        _ => net.get(2).and_then(|n| n.as_atom()),
                    };
                    NetRef::Code(code, name.map(str::to_string))
                }
                Err(_) => NetRef::Name(code.clone()),
            },
            SExp::Str(name) => NetRef::Name(name.clone()),
            SExp::List(_) => return None,
        };
        Some(net_ref)
    }

    fn resolve_net(&mut self, net: Option<NetRef>) -> Result<NetCode, PcbParseError> {
        match net {
            None => Ok(UNCONNECTED),
            Some(NetRef::Code(code, name)) => {
                if self.board.find_net(code).is_some() {
                    return Ok(code);
                }
                let name = name.ok_or_else(|| {
                    PcbParseError::InvalidFormat(format!("Reference to undeclared net {}", code))
                })?;
                debug!("Net {} \"{}\" declared by an item", code, name);
                Ok(self.board.insert_net(code, &name)?.code)
            }
            Some(NetRef::Name(name)) if name.is_empty() => Ok(UNCONNECTED),
            Some(NetRef::Name(name)) => match self.board.find_net_by_name(&name) {
                Some(net) => Ok(net.code),
                None => Ok(self.board.add_net(&name)?.code),
            },
        }
    }

    fn parse_at(node: &SExp) -> Option<(Point, f64)> {
        let at = node.child("at")?.as_list()?;
        let number = |idx: usize| at.get(idx).and_then(|v| v.as_atom()).and_then(|v| v.parse::<f64>().ok());
        Some((Point::new(number(1)?, number(2)?), number(3).unwrap_or(0.0)))
    }

    fn parse_xy(node: &SExp, key: &str) -> Option<Point> {
        let xy = node.child(key)?.as_list()?;
        let number = |idx: usize| xy.get(idx).and_then(|v| v.as_atom()).and_then(|v| v.parse::<f64>().ok());
        Some(Point::new(number(1)?, number(2)?))
    }

    fn write_item_net(node: &mut SExp, kind: ItemKind, net: &Net) {
        let Some(list) = node.as_list_mut() else {
            return;
        };
        let existing = list.iter().position(|child| child.is_tagged("net"));

        let replacement = match kind {
            ItemKind::Pad if net.is_unconnected() => None,
            ItemKind::Pad => Some(SExp::List(vec![
                SExp::atom("net"),
                SExp::atom(net.code.to_string()),
                SExp::string(net.name.clone()),
            ])),
            _ => Some(SExp::List(vec![
                SExp::atom("net"),
                SExp::atom(net.code.to_string()),
            ])),
        };

        match (existing, replacement) {
            (Some(idx), Some(new)) => list[idx] = new,
            (Some(idx), None) => {
                list.remove(idx);
            }
            (None, Some(new)) => list.push(new),
            (None, None) => {}
        }

        if kind == ItemKind::Zone {
            let name = SExp::List(vec![SExp::atom("net_name"), SExp::string(net.name.clone())]);
            match list.iter().position(|child| child.is_tagged("net_name")) {
                Some(idx) => list[idx] = name,
                None => list.push(name),
            }
        }
    }

    /// Replace the top-level net table with `nets`, keeping its position.
    fn write_net_table(root: &mut SExp, nets: &[Net]) {
        let Some(top) = root.as_list_mut() else {
            return;
        };
        let first_net = top.iter().position(|node| node.is_tagged("net"));
        top.retain(|node| !node.is_tagged("net"));

        let insert_at = first_net.unwrap_or_else(|| {
            top.iter()
                .rposition(|node| {
                    matches!(node.tag(), Some("general" | "paper" | "title_block" | "layers" | "setup"))
                })
                .map_or(top.len().min(1), |idx| idx + 1)
        });

        let table = nets.iter().map(|net| {
            SExp::List(vec![
                SExp::atom("net"),
                SExp::atom(net.code.to_string()),
                SExp::string(net.name.clone()),
            ])
        });
        top.splice(insert_at..insert_at, table);
    }
}

impl fmt::Display for KicadPcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sexp().to_pretty_string())
    }
}

/// Pad offset rotated by the footprint orientation (degrees, KiCad's
/// y-down convention) and moved to the footprint origin.
fn rotate(origin: Point, offset: Point, degrees: f64) -> Point {
    let (sin, cos) = degrees.to_radians().sin_cos();
    Point::new(
        origin.x + offset.x * cos + offset.y * sin,
        origin.y - offset.x * sin + offset.y * cos,
    )
}
