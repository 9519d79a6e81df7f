//! Netlist component sources.
//!
//! Only the `(components ...)` section of an exported KiCad netlist is read:
//! each `(comp (ref U1) ... (libsource (lib device) (part 74LS00)))` gives
//! the symbol a reference came from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::parser::sexp::{ParseError, SExp, SExpParser};

/// Library and symbol a component was placed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSource {
    /// Library nickname, lower-cased
    pub lib: String,
    pub part: String,
}

/// Component reference to its symbol source, `None` when the netlist does
/// not say.
pub fn parse_netlist_parts(content: &str) -> Result<BTreeMap<String, Option<PartSource>>, ParseError> {
    let root = SExpParser::new(content).parse()?;
    let mut parts = BTreeMap::new();

    let Some(components) = root.child("components") else {
        debug!("Netlist has no components section");
        return Ok(parts);
    };

    for comp in components.get_all("comp") {
        let Some(reference) = value(comp, "ref") else {
            continue;
        };
        let source = comp.child("libsource").and_then(|libsource| {
            Some(PartSource {
                lib: value(libsource, "lib")?.to_lowercase(),
                part: value(libsource, "part")?.to_string(),
            })
        });
        parts.insert(reference.to_string(), source);
    }
    Ok(parts)
}

fn value<'a>(node: &'a SExp, key: &str) -> Option<&'a str> {
    node.child(key)?.as_list()?.get(1)?.as_atom()
}

/// `<board stem>.net` next to the board, if it exists.
pub fn guess_netlist_file(board_path: &Path) -> Option<PathBuf> {
    let candidate = board_path.with_extension("net");
    candidate.is_file().then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const NETLIST: &str = r#"(export (version D)
  (design (source /proj/demo.sch))
  (components
    (comp (ref U1)
      (value 74LS00)
      (libsource (lib 74xx) (part 74LS00) (description "Quad NAND"))
      (sheetpath (names /) (tstamps /)))
    (comp (ref "R1")
      (value 10k)
      (libsource (lib "Device") (part "R")))
    (comp (ref TP1)
      (value TP)))
  (nets
    (net (code 1) (name GND)
      (node (ref U1) (pin 7)))))"#;

    #[test]
    fn test_components() {
        let parts = parse_netlist_parts(NETLIST).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts["U1"],
            Some(PartSource {
                lib: "74xx".to_string(),
                part: "74LS00".to_string()
            })
        );
        assert_eq!(parts["R1"].as_ref().unwrap().lib, "device");
        assert_eq!(parts["TP1"], None);
    }

    #[test]
    fn test_no_components() {
        assert!(parse_netlist_parts("(export (version D))").unwrap().is_empty());
    }

    #[test]
    fn test_guess_netlist_file() {
        let dir = TempDir::new().unwrap();
        let board = dir.path().join("demo.kicad_pcb");
        assert_eq!(guess_netlist_file(&board), None);

        std::fs::write(dir.path().join("demo.net"), "(export)").unwrap();
        assert_eq!(guess_netlist_file(&board), Some(dir.path().join("demo.net")));
    }
}
