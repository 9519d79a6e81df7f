//! KiCad Legacy Symbol Library Reader (`.lib`, KiCad 4-5)
//!
//! Only pin records are read. A part definition runs from its `DEF` line to
//! `ENDDEF`; aliases are declared on an `ALIAS` line inside it. Pins are
//! `X` records:
//!
//! ```text
//! X name num posx posy length orient Snum Snom unit convert etype [shape]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::erc::PinFunction;

#[derive(Debug, Error)]
pub enum LegacyParseError {
    #[error("Cannot read symbol library {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed pin record on line {line}: {text}")]
    MalformedPin { line: usize, text: String },
    #[error("Part '{0}' not found in library")]
    PartNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPin {
    pub number: String,
    pub name: String,
    pub unit: u32,
    pub function: PinFunction,
}

/// Pins of one part, keyed by pin number.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartPins {
    pub pins: BTreeMap<String, LibraryPin>,
    pub units: BTreeSet<u32>,
}

impl PartPins {
    pub fn function_of(&self, number: &str) -> Option<PinFunction> {
        self.pins.get(number).map(|pin| pin.function)
    }
}

/// Read the pins of `part` from legacy library text.
pub fn read_part_pins(content: &str, part: &str) -> Result<PartPins, LegacyParseError> {
    let mut found = false;
    let mut pins = PartPins::default();

    for (idx, line) in content.lines().enumerate() {
        if !found {
            found = declares_part(line, part);
            continue;
        }
        if line.starts_with("ENDDEF") {
            break;
        }
        if line.starts_with("X ") {
            let pin = parse_pin(line).ok_or_else(|| LegacyParseError::MalformedPin {
                line: idx + 1,
                text: line.to_string(),
            })?;
            pins.units.insert(pin.unit);
            pins.pins.insert(pin.number.clone(), pin);
        }
    }

    if !found {
        return Err(LegacyParseError::PartNotFound(part.to_string()));
    }
    debug!("Part {}: {} pins in {} units", part, pins.pins.len(), pins.units.len());
    Ok(pins)
}

pub fn read_part_pins_file(path: &Path, part: &str) -> Result<PartPins, LegacyParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| LegacyParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_part_pins(&content, part)
}

/// `DEF <part> ...` or `ALIAS a b <part> ...`.
fn declares_part(line: &str, part: &str) -> bool {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
        Some("DEF") => tokens
            .next()
            .is_some_and(|name| name == part || name.strip_prefix('~') == Some(part)),
        Some("ALIAS") => tokens.any(|name| name == part),
        _ => false,
    }
}

fn parse_pin(line: &str) -> Option<LibraryPin> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 12 {
        return None;
    }
    let mut etype = fields[11].chars();
    let function = match (etype.next(), etype.next()) {
        (Some(code), None) => PinFunction::from_code(code)?,
        _ => return None,
    };
    Some(LibraryPin {
        number: fields[2].to_string(),
        name: fields[1].to_string(),
        unit: fields[9].parse().ok()?,
        function,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIB: &str = "EESchema-LIBRARY Version 2.4
#encoding utf-8
#
# 74LS00
#
DEF 74LS00 U 0 30 Y Y 4 F N
F0 \"U\" 0 50 50 H V C CNN
ALIAS 74HC00 7400
DRAW
X ~ 1 -300 100 300 R 50 50 1 1 I
X ~ 2 -300 -100 300 R 50 50 1 1 I
X ~ 3 300 0 300 L 50 50 1 1 O
X ~ 4 -300 100 300 R 50 50 2 1 I
X VCC 14 0 300 0 D 50 50 0 1 W N
X GND 7 0 -300 0 U 50 50 0 1 W N
ENDDRAW
ENDDEF
#
# R
#
DEF R R 0 0 N Y 1 F N
DRAW
X ~ 1 0 150 50 D 50 50 1 1 P
X ~ 2 0 -150 50 U 50 50 1 1 P
ENDDRAW
ENDDEF
#End Library
";

    #[test]
    fn test_read_by_def_name() {
        let pins = read_part_pins(LIB, "74LS00").unwrap();
        assert_eq!(pins.pins.len(), 6);
        assert_eq!(pins.function_of("3"), Some(PinFunction::Output));
        assert_eq!(pins.function_of("14"), Some(PinFunction::PowerIn));
        assert_eq!(pins.pins["14"].name, "VCC");
        assert_eq!(pins.units, BTreeSet::from([0, 1, 2]));
    }

    #[test]
    fn test_read_by_alias_stops_at_enddef() {
        let pins = read_part_pins(LIB, "7400").unwrap();
        assert_eq!(pins.pins.len(), 6);
        assert_eq!(pins.function_of("1"), Some(PinFunction::Input));
    }

    #[test]
    fn test_part_prefix_does_not_match() {
        // "R" must not match "RR" or the 74LS00 definition
        let pins = read_part_pins(LIB, "R").unwrap();
        assert_eq!(pins.pins.len(), 2);
        assert_eq!(pins.function_of("1"), Some(PinFunction::Passive));
        assert!(matches!(
            read_part_pins(LIB, "RR"),
            Err(LegacyParseError::PartNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_pin() {
        let lib = "DEF BAD U 0 0 Y Y 1 F N\nX A 1 0 0\nENDDEF\n";
        match read_part_pins(lib, "BAD") {
            Err(LegacyParseError::MalformedPin { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected malformed pin, got {:?}", other),
        }
    }
}
