//! Airwire CLI - rewire the nets of a KiCad board from the command line.

use anyhow::{bail, Context};
use airwire::erc::{check_nets, LookupOptions, NetContention, PartLookup};
use airwire::prompt::NamePrompt;
use airwire::wiring::NetDirectory;
use airwire::{
    Board, Command, CommandStatus, ContentionLevel, KicadPcb, PadChange, PinContention,
    PinFunction, Prompt, Selector, WiringOptions, WiringSession,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "airwire")]
#[command(about = "Manual net rewiring for KiCad board layouts", long_about = None)]
#[command(version)]
struct Cli {
    /// Log more (-v for info, -vv for debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the nets of a board with their members and airwires
    Nets {
        /// Path to .kicad_pcb file
        #[arg(value_name = "BOARD")]
        board: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Connect the selected items: attach, rename, join or merge nets
    Connect {
        #[command(flatten)]
        edit: EditArgs,

        /// Net name to use instead of asking on stdin
        #[arg(long, value_name = "NAME")]
        net: Option<String>,

        /// Accept net names the board reserves for unconnected items
        #[arg(long)]
        allow_reserved: bool,
    },

    /// Move the selected pads and vias onto the unconnected net
    Disconnect {
        #[command(flatten)]
        edit: EditArgs,
    },

    /// Exchange the nets of exactly two selected pads
    Swap {
        #[command(flatten)]
        edit: EditArgs,
    },

    /// Report pads whose net differs between two versions of a board
    Dump {
        /// Board before editing
        #[arg(value_name = "ORIGINAL")]
        original: PathBuf,

        /// Board after editing
        #[arg(value_name = "CURRENT")]
        current: PathBuf,

        /// Write the change log here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Show the pin contention matrix, or the entry for two pin functions
    Contention {
        /// Pin function codes: I O B T W w P U C E N
        #[arg(value_name = "FUNCTION", num_args = 0..=2)]
        functions: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Check every net for clashing pin functions using the project's libraries
    Erc {
        /// Path to .kicad_pcb file
        #[arg(value_name = "BOARD")]
        board: PathBuf,

        /// Netlist to read parts from (default: <BOARD>.net)
        #[arg(long, value_name = "FILE")]
        netlist: Option<PathBuf>,

        /// KiCad configuration directory holding the global sym-lib-table
        #[arg(long, value_name = "DIR")]
        config_home: Option<PathBuf>,

        /// Exit with error code if a net reaches this level
        #[arg(long, value_enum)]
        fail_on: Option<FailOnLevel>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(clap::Args)]
struct EditArgs {
    /// Path to .kicad_pcb file
    #[arg(value_name = "BOARD")]
    board: PathBuf,

    /// Item to select: REF:PAD, via:N, track:N or zone:N (repeatable)
    #[arg(short, long = "select", value_name = "ITEM")]
    select: Vec<String>,

    /// Write the edited board here instead of overwriting BOARD
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormat,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts
    Json,
}

#[derive(Clone, ValueEnum)]
enum FailOnLevel {
    Warning,
    Error,
}

impl FailOnLevel {
    fn level(&self) -> ContentionLevel {
        match self {
            FailOnLevel::Warning => ContentionLevel::Warning,
            FailOnLevel::Error => ContentionLevel::Error,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match cli.command {
        Commands::Nets { board, format } => handle_nets(&board, format),
        Commands::Connect {
            edit,
            net,
            allow_reserved,
        } => {
            let options = WiringOptions {
                reject_reserved_names: !allow_reserved,
                ..WiringOptions::default()
            };
            handle_edit(Command::Connect, edit, ConsolePrompt::new(net), options)
        }
        Commands::Disconnect { edit } => handle_edit(
            Command::Disconnect,
            edit,
            ConsolePrompt::new(None),
            WiringOptions::default(),
        ),
        Commands::Swap { edit } => handle_edit(
            Command::Swap,
            edit,
            ConsolePrompt::new(None),
            WiringOptions::default(),
        ),
        Commands::Dump {
            original,
            current,
            output,
            format,
        } => handle_dump(&original, &current, output.as_deref(), format),
        Commands::Contention { functions, format } => handle_contention(&functions, format),
        Commands::Erc {
            board,
            netlist,
            config_home,
            fail_on,
            format,
        } => handle_erc(&board, netlist.as_deref(), config_home, fail_on, format),
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .try_init()
        .ok();
}

/// Terminal prompt. A preset name answers the first name request without
/// reading stdin; an empty line or end of input cancels.
struct ConsolePrompt {
    preset: Option<String>,
}

impl ConsolePrompt {
    fn new(preset: Option<String>) -> Self {
        Self { preset }
    }
}

impl Prompt for ConsolePrompt {
    fn prompt_net_name(&mut self, request: &NamePrompt) -> Option<String> {
        if let Some(name) = self.preset.take() {
            return Some(name);
        }

        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "{}", request.title);
        if !request.tooltip.is_empty() {
            let _ = writeln!(stderr, "{}", request.tooltip);
        }
        if !request.suggestions.is_empty() {
            let _ = writeln!(stderr, "Nets: {}", request.suggestions.join(", "));
        }
        let _ = write!(stderr, "Net name (empty to cancel): ");
        let _ = stderr.flush();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let name = line.trim_end_matches(['\r', '\n']);
                (!name.is_empty()).then(|| name.to_string())
            }
        }
    }

    fn prompt_dump_path(&mut self) -> Option<PathBuf> {
        None
    }

    fn show_error(&mut self, message: &str) {
        eprintln!("Error: {}", message);
    }
}

fn load(path: &Path) -> anyhow::Result<KicadPcb> {
    airwire::load_board(path).with_context(|| format!("Cannot load {}", path.display()))
}

fn select_items(pcb: &mut KicadPcb, selectors: &[String]) -> anyhow::Result<()> {
    for text in selectors {
        let selector: Selector = text.parse()?;
        pcb.board_mut()
            .select_matching(&selector)
            .with_context(|| format!("Nothing on the board matches '{}'", text))?;
    }
    Ok(())
}

fn handle_nets(path: &Path, format: OutputFormat) -> i32 {
    let mut pcb = match load(path) {
        Ok(pcb) => pcb,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return 1;
        }
    };
    pcb.board_mut().recalculate_ratsnest();
    let board = pcb.board();
    let summaries = NetDirectory::summaries(board);

    match format {
        OutputFormat::Human => {
            println!("{:>5}  {:<24} {:>5} {:>6} {:>5} {:>5} {:>8}", "CODE", "NET", "PADS", "TRACKS", "VIAS", "ZONES", "AIRWIRES");
            for summary in &summaries {
                let name = if summary.net.is_unconnected() {
                    "<no net>"
                } else {
                    summary.net.name.as_str()
                };
                println!(
                    "{:>5}  {:<24} {:>5} {:>6} {:>5} {:>5} {:>8}",
                    summary.net.code,
                    name,
                    summary.pads,
                    summary.tracks,
                    summary.vias,
                    summary.zones,
                    board.airwires_on(summary.net.code)
                );
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "file": path.display().to_string(),
                "nets": summaries.iter().map(|s| {
                    serde_json::json!({
                        "code": s.net.code,
                        "name": s.net.name,
                        "pads": s.pads,
                        "tracks": s.tracks,
                        "vias": s.vias,
                        "zones": s.zones,
                        "airwires": board.airwires_on(s.net.code),
                    })
                }).collect::<Vec<_>>(),
            });
            print_json(&output);
        }
    }
    0
}

fn handle_edit(command: Command, args: EditArgs, mut prompt: ConsolePrompt, options: WiringOptions) -> i32 {
    match run_edit(command, &args, &mut prompt, options) {
        Ok((status, changes)) => {
            output_edit(command, &status, &changes, &args.format);
            if status.is_failed() {
                1
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn run_edit(
    command: Command,
    args: &EditArgs,
    prompt: &mut ConsolePrompt,
    options: WiringOptions,
) -> anyhow::Result<(CommandStatus, Vec<PadChange>)> {
    if args.select.is_empty() && command != Command::Connect {
        bail!("Select at least one item with --select");
    }
    let mut pcb = load(&args.board)?;
    let session = WiringSession::start(pcb.board(), options);
    select_items(&mut pcb, &args.select)?;

    let status = session.run(command, pcb.board_mut(), prompt);
    if status != CommandStatus::Completed {
        return Ok((status, Vec::new()));
    }

    let target = args.output.as_deref().unwrap_or(&args.board);
    pcb.save(target)
        .with_context(|| format!("Cannot write {}", target.display()))?;
    Ok((status, session.changes(pcb.board())))
}

fn output_edit(command: Command, status: &CommandStatus, changes: &[PadChange], format: &OutputFormat) {
    match format {
        OutputFormat::Human => match status {
            CommandStatus::Completed => {
                println!("{}: {} pads changed net", command, changes.len());
                for change in changes {
                    println!("  {}", change);
                }
            }
            CommandStatus::Cancelled => println!("{}: cancelled, board left unchanged", command),
            // Already shown by the prompt
            CommandStatus::Failed(_) => {}
        },
        OutputFormat::Json => {
            let output = serde_json::json!({
                "command": command,
                "result": status,
                "changes": changes,
            });
            print_json(&output);
        }
    }
}

fn handle_dump(original: &Path, current: &Path, output: Option<&Path>, format: OutputFormat) -> i32 {
    let result = load(original).and_then(|before| {
        let after = load(current)?;
        let session = WiringSession::start(before.board(), WiringOptions::default());
        let changes = session.changes(after.board());
        if let Some(path) = output {
            session.diff_and_write(after.board(), path)?;
        }
        Ok(changes)
    });

    let changes = match result {
        Ok(changes) => changes,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return 1;
        }
    };

    match (format, output) {
        (OutputFormat::Human, Some(path)) => {
            println!("Wrote {} changes to {}", changes.len(), path.display());
        }
        (OutputFormat::Human, None) => {
            for change in &changes {
                println!("{}", change);
            }
        }
        (OutputFormat::Json, _) => print_json(&serde_json::json!({ "changes": changes })),
    }
    0
}

fn handle_contention(functions: &[String], format: OutputFormat) -> i32 {
    let matrix = PinContention::new();
    let parsed: Result<Vec<PinFunction>, String> = functions.iter().map(|f| f.parse()).collect();
    let parsed = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match parsed.as_slice() {
        [] => output_matrix(&matrix, &format),
        [a, b] => {
            let level = matrix.contention(*a, *b);
            match format {
                OutputFormat::Human => println!("{} + {}: {}", a, b, level),
                OutputFormat::Json => print_json(&serde_json::json!({
                    "first": a.code().to_string(),
                    "second": b.code().to_string(),
                    "level": level,
                })),
            }
        }
        _ => {
            eprintln!("Error: give two pin functions, or none for the whole matrix");
            return 1;
        }
    }
    0
}

fn output_matrix(matrix: &PinContention, format: &OutputFormat) {
    match format {
        OutputFormat::Human => {
            let header: Vec<String> = PinFunction::ALL.iter().map(|f| f.code().to_string()).collect();
            println!("   {}", header.join(" "));
            for row in PinFunction::ALL {
                let cells: Vec<&str> = PinFunction::ALL
                    .iter()
                    .map(|col| match matrix.contention(row, *col) {
                        ContentionLevel::Ok => ".",
                        ContentionLevel::Warning => "W",
                        ContentionLevel::Error => "E",
                    })
                    .collect();
                println!("{}  {}", row.code(), cells.join(" "));
            }
        }
        OutputFormat::Json => {
            let rows: serde_json::Map<String, serde_json::Value> = PinFunction::ALL
                .iter()
                .map(|row| {
                    let cols: serde_json::Map<String, serde_json::Value> = PinFunction::ALL
                        .iter()
                        .map(|col| (col.code().to_string(), serde_json::json!(matrix.contention(*row, *col))))
                        .collect();
                    (row.code().to_string(), serde_json::Value::Object(cols))
                })
                .collect();
            print_json(&serde_json::Value::Object(rows));
        }
    }
}

fn handle_erc(
    path: &Path,
    netlist: Option<&Path>,
    config_home: Option<PathBuf>,
    fail_on: Option<FailOnLevel>,
    format: OutputFormat,
) -> i32 {
    let options = match config_home {
        Some(dir) => LookupOptions {
            config_home: Some(dir),
        },
        None => LookupOptions::default(),
    };

    let result = load(path).and_then(|pcb| {
        let lookup = PartLookup::from_project(path, netlist, &options)?;
        let functions = lookup.pin_map(pcb.board());
        Ok(check_nets(pcb.board(), &functions, &PinContention::new()))
    });

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return 1;
        }
    };

    match format {
        OutputFormat::Human => output_erc_human(path, &report),
        OutputFormat::Json => print_json(&serde_json::json!({
            "file": path.display().to_string(),
            "nets": report,
        })),
    }

    match fail_on {
        Some(threshold) if report.iter().any(|net| net.level >= threshold.level()) => 1,
        _ => 0,
    }
}

fn output_erc_human(path: &Path, report: &[NetContention]) {
    println!("\nFile: {}", path.display());
    println!("{}", "─".repeat(60));

    if report.is_empty() {
        println!("  No pin contention found");
        return;
    }

    for net in report {
        println!("\n  {} ({}):", net.net.name, net.level);
        for conflict in &net.conflicts {
            println!(
                "    - {} ({}) with {} ({}): {}",
                conflict.first, conflict.first_function, conflict.second, conflict.second_function, conflict.level
            );
        }
        if !net.unknown_pins.is_empty() {
            let unknown: Vec<String> = net.unknown_pins.iter().map(|key| key.to_string()).collect();
            println!("    Unknown pins: {}", unknown.join(", "));
        }
    }

    let errors = report.iter().filter(|net| net.level == ContentionLevel::Error).count();
    println!("\n  Summary:");
    println!("    Errors:   {}", errors);
    println!("    Warnings: {}", report.len() - errors);
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: {}", e),
    }
}
