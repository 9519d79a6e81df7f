//! Pin functions from the project's netlist and symbol libraries.
//!
//! A component reference is traced through the netlist to its library and
//! symbol, the library nickname through the symbol library tables to a file,
//! and the pins are read from that file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::PinFunction;
use crate::board::{Board, PadKey};
use crate::parser::kicad_legacy::{read_part_pins_file, LegacyParseError, PartPins};
use crate::parser::lib_table::{parse_sym_lib_table_with, SYM_LIB_TABLE};
use crate::parser::netlist::{guess_netlist_file, parse_netlist_parts, PartSource};
use crate::parser::sexp::ParseError;

/// Environment variable overriding the KiCad configuration directory.
pub const CONFIG_HOME_VAR: &str = "KICAD_CONFIG_HOME";

/// Variable KiCad sets to the project directory.
pub const PROJECT_DIR_VAR: &str = "KIPRJMOD";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("No netlist found for {}; export one or pass it explicitly", board.display())]
    NoNetlist { board: PathBuf },
    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("{0} was not found in the netlist")]
    UnknownReference(String),
    #[error("The netlist has no library source for {0}")]
    NoLibrarySource(String),
    #[error("Library '{lib}' of {reference} is not in any symbol library table")]
    UnknownLibrary { reference: String, lib: String },
    #[error(transparent)]
    Library(#[from] LegacyParseError),
}

/// Where to look for global KiCad configuration.
#[derive(Clone, Debug)]
pub struct LookupOptions {
    /// Directory holding the global `sym-lib-table`
    pub config_home: Option<PathBuf>,
}

impl Default for LookupOptions {
    fn default() -> Self {
        Self {
            config_home: std::env::var_os(CONFIG_HOME_VAR)
                .map(PathBuf::from)
                .or_else(|| dirs::config_dir().map(|dir| dir.join("kicad"))),
        }
    }
}

/// Resolves component references to their library pins.
#[derive(Debug, Clone, Default)]
pub struct PartLookup {
    parts: BTreeMap<String, Option<PartSource>>,
    libraries: BTreeMap<String, PathBuf>,
}

impl PartLookup {
    pub fn new(parts: BTreeMap<String, Option<PartSource>>, libraries: BTreeMap<String, PathBuf>) -> Self {
        Self { parts, libraries }
    }

    /// Gather the netlist and library tables for the board at `board_path`.
    ///
    /// Without an explicit `netlist`, `<board>.net` next to the board is
    /// used. Library tables are read global first, then the board's own, so
    /// local entries win; `<board>-cache.lib` and `<board>-rescue.lib` are
    /// added when present. `${KIPRJMOD}` in a library URI is the board's
    /// directory.
    pub fn from_project(
        board_path: &Path,
        netlist: Option<&Path>,
        options: &LookupOptions,
    ) -> Result<Self, LookupError> {
        let netlist = netlist
            .map(Path::to_path_buf)
            .or_else(|| guess_netlist_file(board_path))
            .ok_or_else(|| LookupError::NoNetlist {
                board: board_path.to_path_buf(),
            })?;
        let content = read(&netlist)?;
        let parts = parse_netlist_parts(&content).map_err(|source| LookupError::Parse {
            path: netlist.clone(),
            source,
        })?;

        let board_dir = board_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut table_files = Vec::new();
        if let Some(home) = &options.config_home {
            table_files.push(home.join(SYM_LIB_TABLE));
        }
        table_files.push(board_dir.join(SYM_LIB_TABLE));

        let project_dir = board_dir.to_string_lossy().into_owned();
        let lookup_var = |var: &str| match var {
            PROJECT_DIR_VAR => Some(project_dir.clone()),
            _ => std::env::var(var).ok(),
        };

        let mut libraries = BTreeMap::new();
        for table in table_files.iter().filter(|path| path.is_file()) {
            let content = read(table)?;
            let entries = parse_sym_lib_table_with(&content, lookup_var).map_err(|source| LookupError::Parse {
                path: table.clone(),
                source,
            })?;
            debug!("{}: {} libraries", table.display(), entries.len());
            libraries.extend(entries.into_iter().map(|(name, uri)| (name, PathBuf::from(uri))));
        }

        let stem = board_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        for suffix in ["-cache", "-rescue"] {
            let name = format!("{}{}", stem, suffix);
            let file = board_dir.join(format!("{}.lib", name));
            if file.is_file() {
                libraries.insert(name.to_lowercase(), file);
            }
        }

        info!(
            "Pin lookup: {} parts from {}, {} libraries",
            parts.len(),
            netlist.display(),
            libraries.len()
        );
        Ok(Self::new(parts, libraries))
    }

    pub fn libraries(&self) -> &BTreeMap<String, PathBuf> {
        &self.libraries
    }

    pub fn source_of(&self, reference: &str) -> Option<&PartSource> {
        self.parts.get(reference)?.as_ref()
    }

    /// Pins of the part placed as `reference`.
    pub fn pins_for(&self, reference: &str) -> Result<PartPins, LookupError> {
        let source = self
            .parts
            .get(reference)
            .ok_or_else(|| LookupError::UnknownReference(reference.to_string()))?
            .as_ref()
            .ok_or_else(|| LookupError::NoLibrarySource(reference.to_string()))?;
        let file = self
            .libraries
            .get(&source.lib)
            .ok_or_else(|| LookupError::UnknownLibrary {
                reference: reference.to_string(),
                lib: source.lib.clone(),
            })?;
        Ok(read_part_pins_file(file, &source.part)?)
    }

    /// Pin function of every pad on the board whose part can be resolved.
    ///
    /// References that cannot be resolved are logged and left out.
    pub fn pin_map<B: Board + ?Sized>(&self, board: &B) -> BTreeMap<PadKey, PinFunction> {
        let keys: Vec<PadKey> = board.items().iter().filter_map(|item| item.pad_key()).collect();
        let references: BTreeSet<&str> = keys.iter().map(|key| key.reference.as_str()).collect();

        let mut parts = BTreeMap::new();
        for reference in references {
            match self.pins_for(reference) {
                Ok(pins) => {
                    parts.insert(reference.to_string(), pins);
                }
                Err(e) => warn!("No pin information for {}: {}", reference, e),
            }
        }

        keys.iter()
            .filter_map(|key| {
                let function = parts.get(&key.reference)?.function_of(&key.pad)?;
                Some((key.clone(), function))
            })
            .collect()
    }
}

fn read(path: &Path) -> Result<String, LookupError> {
    std::fs::read_to_string(path).map_err(|source| LookupError::Io {
        path: path.to_path_buf(),
        source,
    })
}
