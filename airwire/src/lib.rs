//! Airwire - manual net rewiring for KiCad board layouts
//!
//! Connect, cut and swap the nets of selected pads, vias, tracks and zones
//! directly on a board, without going back through the schematic, and keep a
//! record of what moved.
//!
//! # Quick Start
//!
//! ```no_run
//! use airwire::prelude::*;
//! use airwire::prompt::ScriptedPrompt;
//! use std::path::Path;
//!
//! let mut pcb = airwire::load_board(Path::new("design.kicad_pcb")).unwrap();
//! let session = WiringSession::start(pcb.board(), WiringOptions::default());
//!
//! let board = pcb.board_mut();
//! for selector in ["U1:3", "R4:1"] {
//!     board.select_matching(&selector.parse().unwrap()).unwrap();
//! }
//! let mut prompt = ScriptedPrompt::new().with_name("SDA");
//! let status = session.connect(board, &mut prompt);
//! println!("{:?}", status);
//!
//! for change in session.changes(pcb.board()) {
//!     println!("{}", change);
//! }
//! pcb.save(Path::new("design.kicad_pcb")).unwrap();
//! ```
//!
//! # Features
//!
//! - **Connect**: attach, rename, join or merge nets depending on what is selected
//! - **Disconnect / Swap**: cut pads and vias loose, exchange two pads' nets
//! - **Change log**: pad-by-pad report of wiring changes since the session began
//! - **Pin contention**: electrical-rules matrix and a net check driven by library pins

pub mod board;
pub mod changelog;
pub mod core;
pub mod erc;
pub mod parser;
pub mod prompt;
pub mod wiring;

// Re-export main types
pub use board::{Board, BoardError, BoardItem, ItemId, ItemKind, MemoryBoard, Net, NetCode, PadKey, Selector, UNCONNECTED};
pub use changelog::{write_changes, ChangeLogError, NetSnapshot, PadChange};
pub use core::{AirwireError, Command, CommandStatus, WiringSession};
pub use erc::{ContentionLevel, PinContention, PinFunction};
pub use parser::pcb::{KicadPcb, PcbParseError};
pub use prompt::{NamePrompt, Prompt};
pub use wiring::{WiringCase, WiringError, WiringOptions, WiringOutcome, WiringReport};

/// Load a `.kicad_pcb` file (convenience wrapper).
pub fn load_board(path: &std::path::Path) -> Result<KicadPcb, AirwireError> {
    Ok(KicadPcb::parse_file(path)?)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        AirwireError, Board, Command, CommandStatus, KicadPcb, MemoryBoard, Prompt, WiringError,
        WiringOptions, WiringOutcome, WiringSession,
    };
}
