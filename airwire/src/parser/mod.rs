pub mod kicad_legacy;
pub mod lib_table;
pub mod netlist;
pub mod pcb;
pub mod sexp;

// Re-export for convenience
pub use kicad_legacy::{read_part_pins, read_part_pins_file, LegacyParseError, LibraryPin, PartPins};
pub use lib_table::{expand_env_vars, parse_sym_lib_table, SYM_LIB_TABLE};
pub use netlist::{guess_netlist_file, parse_netlist_parts, PartSource};
pub use pcb::{KicadPcb, PcbParseError};
pub use sexp::{ParseError, SExp, SExpParser};
