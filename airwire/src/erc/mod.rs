//! Pin Contention
//!
//! Electrical-rules matrix rating how bad it is to tie two pin functions
//! together on one net, plus the net check and library lookup built on it.

pub mod contention;
pub mod lookup;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

pub use contention::{check_nets, NetContention, PinConflict, PinFunctionSource};
pub use lookup::{LookupError, LookupOptions, PartLookup};

/// Electrical function of a symbol pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PinFunction {
    Input,
    Output,
    Bidirectional,
    TriState,
    PowerIn,
    PowerOut,
    Passive,
    Unspecified,
    OpenCollector,
    OpenEmitter,
    NoConnect,
}

impl PinFunction {
    pub const ALL: [PinFunction; 11] = [
        PinFunction::Input,
        PinFunction::Output,
        PinFunction::Bidirectional,
        PinFunction::TriState,
        PinFunction::PowerIn,
        PinFunction::PowerOut,
        PinFunction::Passive,
        PinFunction::Unspecified,
        PinFunction::OpenCollector,
        PinFunction::OpenEmitter,
        PinFunction::NoConnect,
    ];

    /// Single-letter code used in legacy symbol libraries.
    pub fn code(&self) -> char {
        match self {
            PinFunction::Input => 'I',
            PinFunction::Output => 'O',
            PinFunction::Bidirectional => 'B',
            PinFunction::TriState => 'T',
            PinFunction::PowerIn => 'W',
            PinFunction::PowerOut => 'w',
            PinFunction::Passive => 'P',
            PinFunction::Unspecified => 'U',
            PinFunction::OpenCollector => 'C',
            PinFunction::OpenEmitter => 'E',
            PinFunction::NoConnect => 'N',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.code() == code)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for PinFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PinFunction::Input => "input",
            PinFunction::Output => "output",
            PinFunction::Bidirectional => "bidirectional",
            PinFunction::TriState => "tri-state",
            PinFunction::PowerIn => "power input",
            PinFunction::PowerOut => "power output",
            PinFunction::Passive => "passive",
            PinFunction::Unspecified => "unspecified",
            PinFunction::OpenCollector => "open collector",
            PinFunction::OpenEmitter => "open emitter",
            PinFunction::NoConnect => "no connect",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for PinFunction {
    type Err = String;

    /// Accepts the one-letter code (case-sensitive, `W` and `w` differ).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(code), None) => {
                Self::from_code(code).ok_or_else(|| format!("unknown pin function code '{}'", s))
            }
            _ => Err(format!("pin function must be one letter, got '{}'", s)),
        }
    }
}

/// Severity of tying two pin functions together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentionLevel {
    Ok,
    Warning,
    Error,
}

impl fmt::Display for ContentionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentionLevel::Ok => write!(f, "OK"),
            ContentionLevel::Warning => write!(f, "WARNING"),
            ContentionLevel::Error => write!(f, "ERROR"),
        }
    }
}

use ContentionLevel::{Error as E, Warning as W};
use PinFunction::*;

/// Directed entries that differ from OK, before symmetrising.
const DIRECTED_OVERRIDES: &[(PinFunction, &[PinFunction], ContentionLevel)] = &[
    (Output, &[Output], E),
    (TriState, &[Output], W),
    (
        Unspecified,
        &[Input, Output, Bidirectional, TriState, Passive, Unspecified],
        W,
    ),
    (PowerIn, &[TriState, Unspecified], W),
    (PowerOut, &[Output, TriState, PowerOut], E),
    (PowerOut, &[Bidirectional, Unspecified], W),
    (OpenCollector, &[Output, TriState, PowerOut], E),
    (OpenCollector, &[Unspecified], W),
    (OpenEmitter, &[Output, PowerOut], E),
    (OpenEmitter, &[Bidirectional, TriState, Unspecified], W),
    (NoConnect, &PinFunction::ALL, E),
];

/// Symmetric 11×11 contention matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinContention {
    matrix: [[ContentionLevel; 11]; 11],
}

impl Default for PinContention {
    fn default() -> Self {
        Self::new()
    }
}

impl PinContention {
    pub fn new() -> Self {
        let mut matrix = [[ContentionLevel::Ok; 11]; 11];
        for (from, targets, level) in DIRECTED_OVERRIDES {
            for to in targets.iter() {
                matrix[from.index()][to.index()] = *level;
            }
        }

        for s in 0..11 {
            for d in 0..11 {
                let worst = matrix[s][d].max(matrix[d][s]);
                matrix[s][d] = worst;
                matrix[d][s] = worst;
            }
        }
        Self { matrix }
    }

    pub fn contention(&self, a: PinFunction, b: PinFunction) -> ContentionLevel {
        self.matrix[a.index()][b.index()]
    }

    /// Worst level over every pair in `functions` (a pin against itself
    /// excluded).
    pub fn worst(&self, functions: &[PinFunction]) -> ContentionLevel {
        let mut worst = ContentionLevel::Ok;
        for (i, a) in functions.iter().enumerate() {
            for b in &functions[i + 1..] {
                worst = worst.max(self.contention(*a, *b));
            }
        }
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_is_symmetric() {
        let matrix = PinContention::new();
        for a in PinFunction::ALL {
            for b in PinFunction::ALL {
                assert_eq!(matrix.contention(a, b), matrix.contention(b, a), "{} / {}", a, b);
            }
        }
    }

    #[test]
    fn test_known_entries() {
        let m = PinContention::new();
        assert_eq!(m.contention(Output, Output), ContentionLevel::Error);
        assert_eq!(m.contention(Output, TriState), ContentionLevel::Warning);
        assert_eq!(m.contention(Input, Unspecified), ContentionLevel::Warning);
        assert_eq!(m.contention(TriState, PowerOut), ContentionLevel::Error);
        assert_eq!(m.contention(PowerOut, Bidirectional), ContentionLevel::Warning);
        assert_eq!(m.contention(PowerOut, OpenEmitter), ContentionLevel::Error);
        assert_eq!(m.contention(Input, Output), ContentionLevel::Ok);
        assert_eq!(m.contention(Passive, PowerIn), ContentionLevel::Ok);
        assert_eq!(m.contention(Unspecified, PowerIn), ContentionLevel::Warning);
    }

    #[test]
    fn test_no_connect_conflicts_with_everything() {
        let m = PinContention::new();
        for f in PinFunction::ALL {
            assert_eq!(m.contention(NoConnect, f), ContentionLevel::Error);
        }
    }

    #[test]
    fn test_worst_of_group() {
        let m = PinContention::new();
        assert_eq!(m.worst(&[]), ContentionLevel::Ok);
        assert_eq!(m.worst(&[Output]), ContentionLevel::Ok);
        assert_eq!(m.worst(&[Input, Passive, Output]), ContentionLevel::Ok);
        assert_eq!(m.worst(&[Input, TriState, Output]), ContentionLevel::Warning);
        assert_eq!(m.worst(&[Output, Input, Output]), ContentionLevel::Error);
    }

    #[test]
    fn test_codes_round_trip() {
        for f in PinFunction::ALL {
            assert_eq!(PinFunction::from_code(f.code()), Some(f));
        }
        assert_eq!("w".parse::<PinFunction>(), Ok(PowerOut));
        assert_eq!("W".parse::<PinFunction>(), Ok(PowerIn));
        assert!("X".parse::<PinFunction>().is_err());
        assert!("IO".parse::<PinFunction>().is_err());
    }
}
