//! Command surface shared by hosts and the CLI.
//! Every command converts its failures into a `show_error` call.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::board::Board;
use crate::changelog::{write_changes, ChangeLogError, NetSnapshot, PadChange};
use crate::erc::LookupError;
use crate::parser::pcb::PcbParseError;
use crate::parser::sexp::ParseError;
use crate::parser::LegacyParseError;
use crate::prompt::Prompt;
use crate::wiring::{self, WiringError, WiringOptions, WiringOutcome};

#[derive(Debug, thiserror::Error)]
pub enum AirwireError {
    #[error(transparent)]
    Wiring(#[from] WiringError),
    #[error(transparent)]
    ChangeLog(#[from] ChangeLogError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Pcb(#[from] PcbParseError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Library(#[from] LegacyParseError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The four toolbar commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Connect,
    Disconnect,
    Swap,
    Dump,
}

impl Command {
    pub const ALL: [Command; 4] = [Command::Connect, Command::Disconnect, Command::Swap, Command::Dump];

    pub fn label(&self) -> &'static str {
        match self {
            Command::Connect => "Wire It",
            Command::Disconnect => "Cut It",
            Command::Swap => "Swap It",
            Command::Dump => "Dump It",
        }
    }

    pub fn tooltip(&self) -> &'static str {
        match self {
            Command::Connect => "Connect pads with an airwire",
            Command::Disconnect => "Disconnect airwires from pads",
            Command::Swap => "Swap airwires between two pads",
            Command::Dump => "Dump wiring changes to a file",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// How a command ended, after errors were shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum CommandStatus {
    Completed,
    Cancelled,
    Failed(String),
}

impl CommandStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, CommandStatus::Failed(_))
    }
}

/// One editing session on one board: the baseline for the change log plus
/// the options every command runs with.
#[derive(Debug, Clone)]
pub struct WiringSession {
    baseline: NetSnapshot,
    options: WiringOptions,
}

impl WiringSession {
    /// Start a session, recording the current pad nets as the baseline.
    pub fn start<B: Board + ?Sized>(board: &B, options: WiringOptions) -> Self {
        let baseline = NetSnapshot::capture(board);
        info!("Wiring session started with {} pads", baseline.len());
        Self { baseline, options }
    }

    /// Resume against a baseline captured elsewhere, e.g. from the board
    /// file as it was before this run.
    pub fn with_baseline(baseline: NetSnapshot, options: WiringOptions) -> Self {
        Self { baseline, options }
    }

    pub fn baseline(&self) -> &NetSnapshot {
        &self.baseline
    }

    pub fn options(&self) -> &WiringOptions {
        &self.options
    }

    pub fn run<B, P>(&self, command: Command, board: &mut B, prompt: &mut P) -> CommandStatus
    where
        B: Board + ?Sized,
        P: Prompt + ?Sized,
    {
        match command {
            Command::Connect => self.connect(board, prompt),
            Command::Disconnect => self.disconnect(board, prompt),
            Command::Swap => self.swap(board, prompt),
            Command::Dump => self.dump_changes(board, prompt),
        }
    }

    pub fn connect<B, P>(&self, board: &mut B, prompt: &mut P) -> CommandStatus
    where
        B: Board + ?Sized,
        P: Prompt + ?Sized,
    {
        let result = wiring::resolve_and_apply(board, prompt, &self.options).map(|outcome| match outcome {
            WiringOutcome::Applied(_) => CommandStatus::Completed,
            WiringOutcome::Cancelled => CommandStatus::Cancelled,
        });
        surface(prompt, result.map_err(AirwireError::from))
    }

    pub fn disconnect<B, P>(&self, board: &mut B, prompt: &mut P) -> CommandStatus
    where
        B: Board + ?Sized,
        P: Prompt + ?Sized,
    {
        let result = wiring::disconnect(board).map(|_| CommandStatus::Completed);
        surface(prompt, result.map_err(AirwireError::from))
    }

    pub fn swap<B, P>(&self, board: &mut B, prompt: &mut P) -> CommandStatus
    where
        B: Board + ?Sized,
        P: Prompt + ?Sized,
    {
        let result = wiring::swap(board).map(|_| CommandStatus::Completed);
        surface(prompt, result.map_err(AirwireError::from))
    }

    /// Ask for a file and write the changes since the session started.
    pub fn dump_changes<B, P>(&self, board: &B, prompt: &mut P) -> CommandStatus
    where
        B: Board + ?Sized,
        P: Prompt + ?Sized,
    {
        let Some(path) = prompt.prompt_dump_path() else {
            return CommandStatus::Cancelled;
        };
        let result = self
            .diff_and_write(board, &path)
            .map(|_| CommandStatus::Completed);
        surface(prompt, result.map_err(AirwireError::from))
    }

    /// Pads whose net changed since the session started.
    pub fn changes<B: Board + ?Sized>(&self, board: &B) -> Vec<PadChange> {
        self.baseline.diff(&NetSnapshot::capture(board))
    }

    pub fn diff_and_write<B: Board + ?Sized>(&self, board: &B, path: &Path) -> Result<usize, ChangeLogError> {
        write_changes(path, &self.changes(board))
    }
}

fn surface<P: Prompt + ?Sized>(prompt: &mut P, result: Result<CommandStatus, AirwireError>) -> CommandStatus {
    match result {
        Ok(status) => status,
        Err(e) => {
            let message = e.to_string();
            warn!("Command failed: {}", message);
            prompt.show_error(&message);
            CommandStatus::Failed(message)
        }
    }
}
