//! Integration tests for Airwire wiring sessions

use airwire::prelude::*;
use airwire::prompt::ScriptedPrompt;
use airwire::{ItemKind, PadKey, Selector, UNCONNECTED};
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_demo() -> KicadPcb {
    airwire::load_board(&fixture_path("demo.kicad_pcb")).expect("demo board should load")
}

fn select(board: &mut MemoryBoard, selectors: &[&str]) {
    for s in selectors {
        let selector: Selector = s.parse().expect("valid selector");
        board.select_matching(&selector).expect("selector should match");
    }
}

fn net_name(board: &MemoryBoard, reference: &str, pad: &str) -> String {
    let id = board.find_pad(reference, pad).expect("pad exists");
    board.net_of(id).expect("item exists").name.clone()
}

#[test]
fn test_attach_unconnected_pads_to_new_net() {
    let mut pcb = load_demo();
    let session = WiringSession::start(pcb.board(), WiringOptions::default());
    let board = pcb.board_mut();
    select(board, &["U2:1", "R1:2"]);
    let mut prompt = ScriptedPrompt::new().with_name("INT");

    let status = session.connect(board, &mut prompt);

    assert_eq!(status, CommandStatus::Completed);
    assert_eq!(net_name(board, "U2", "1"), "INT");
    assert_eq!(net_name(board, "R1", "2"), "INT");
    assert_eq!(
        prompt.requests()[0].suggestions,
        vec!["GND", "SCL", "SDA", "VCC"],
        "attach offers every board net"
    );
    assert_eq!(board.airwires_on(board.find_net_by_name("INT").unwrap().code), 1);
}

#[test]
fn test_join_unconnected_pad_to_existing_net() {
    let mut pcb = load_demo();
    let session = WiringSession::start(pcb.board(), WiringOptions::default());
    let board = pcb.board_mut();
    select(board, &["R1:2", "U1:4"]);
    let mut prompt = ScriptedPrompt::new();

    assert_eq!(session.connect(board, &mut prompt), CommandStatus::Completed);

    assert!(prompt.requests().is_empty(), "join never prompts");
    assert_eq!(net_name(board, "R1", "2"), "GND");
    assert_eq!(net_name(board, "U2", "1"), "");
}

#[test]
fn test_rename_reaches_tracks_and_unselected_pads() {
    let mut pcb = load_demo();
    let session = WiringSession::start(pcb.board(), WiringOptions::default());
    let board = pcb.board_mut();
    select(board, &["U1:2"]);
    let mut prompt = ScriptedPrompt::new().with_name("I2C_SDA");

    session.connect(board, &mut prompt);

    assert_eq!(net_name(board, "U2", "2"), "I2C_SDA");
    let track = board
        .items()
        .into_iter()
        .find(|item| item.kind == ItemKind::Track)
        .unwrap();
    assert_eq!(track.net.name, "I2C_SDA");
}

#[test]
fn test_merge_across_kinds_leaves_other_nets() {
    let mut pcb = load_demo();
    let session = WiringSession::start(pcb.board(), WiringOptions::default());
    let board = pcb.board_mut();
    select(board, &["U1:3", "via:0"]);
    let mut prompt = ScriptedPrompt::new().with_name("PWR");

    assert_eq!(session.connect(board, &mut prompt), CommandStatus::Completed);

    assert_eq!(prompt.requests()[0].suggestions, vec!["GND", "VCC"]);
    for (reference, pad) in [("U1", "3"), ("U2", "3"), ("U1", "4"), ("U2", "4")] {
        assert_eq!(net_name(board, reference, pad), "PWR");
    }
    let zone = board
        .items()
        .into_iter()
        .find(|item| item.kind == ItemKind::Zone)
        .unwrap();
    assert_eq!(zone.net.name, "PWR");
    assert_eq!(net_name(board, "U1", "1"), "SCL");
    assert_eq!(net_name(board, "U1", "2"), "SDA");
}

#[test]
fn test_disconnect_then_dump() {
    let mut pcb = load_demo();
    let session = WiringSession::start(pcb.board(), WiringOptions::default());
    let board = pcb.board_mut();
    select(board, &["U1:1", "track:0"]);
    let mut prompt = ScriptedPrompt::new();

    assert_eq!(session.disconnect(board, &mut prompt), CommandStatus::Completed);
    assert_eq!(net_name(board, "U1", "1"), "");
    assert_eq!(board.items().iter().find(|i| i.kind == ItemKind::Track).unwrap().net.name, "SDA");

    let changes = session.changes(pcb.board());
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].key, PadKey::new("U1", "1"));
    assert_eq!(
        changes[0].to_string(),
        "Part U1: Pad 1 moved from (net 4 \"SCL\") to (net 0 \"\")."
    );
}

#[test]
fn test_swap_and_swap_back_leaves_empty_log() {
    let mut pcb = load_demo();
    let session = WiringSession::start(pcb.board(), WiringOptions::default());
    let board = pcb.board_mut();
    select(board, &["U1:1", "U1:2"]);
    let mut prompt = ScriptedPrompt::new();

    session.swap(board, &mut prompt);
    assert_eq!(net_name(board, "U1", "1"), "SDA");
    assert_eq!(net_name(board, "U1", "2"), "SCL");
    assert_eq!(session.changes(board).len(), 2);

    session.swap(board, &mut prompt);
    assert!(session.changes(board).is_empty());
    assert!(prompt.errors().is_empty());
}

#[test]
fn test_session_survives_save_and_reload() {
    let mut pcb = load_demo();
    let session = WiringSession::start(pcb.board(), WiringOptions::default());
    {
        let board = pcb.board_mut();
        select(board, &["U2:1", "U1:2"]);
        let mut prompt = ScriptedPrompt::new();
        assert_eq!(session.connect(board, &mut prompt), CommandStatus::Completed);
    }

    let dir = TempDir::new().unwrap();
    let saved = dir.path().join("demo.kicad_pcb");
    pcb.save(&saved).unwrap();
    let reloaded = airwire::load_board(&saved).unwrap();

    assert_eq!(net_name(reloaded.board(), "U2", "1"), "SDA");
    let log = dir.path().join("changes.txt");
    assert_eq!(session.diff_and_write(reloaded.board(), &log).unwrap(), 1);
    let text = std::fs::read_to_string(&log).unwrap();
    assert_eq!(
        text,
        "Part U2: Pad 1 moved from (net 0 \"\") to (net 3 \"SDA\").\n"
    );
}

#[test]
fn test_every_command_commits_except_cancel() {
    let mut board = MemoryBoard::new();
    let pad = board.add_pad("J1", "1", UNCONNECTED).unwrap();
    board.select(pad).unwrap();
    let session = WiringSession::start(&board, WiringOptions::default());

    let mut prompt = ScriptedPrompt::new().with_cancel();
    assert_eq!(session.run(Command::Connect, &mut board, &mut prompt), CommandStatus::Cancelled);
    assert_eq!(board.commit_stats().refreshes, 0);

    session.run(Command::Disconnect, &mut board, &mut prompt);
    assert_eq!(board.commit_stats().refreshes, 1);

    let mut prompt = ScriptedPrompt::new().with_name("   ");
    let status = session.run(Command::Connect, &mut board, &mut prompt);
    assert!(status.is_failed());
    assert_eq!(board.commit_stats().refreshes, 1);
}
