//! Connect: decide what the selection means and repoint the affected items.
//!
//! The nets touched by the selection pick one of four cases (see
//! [`WiringCase`]). Rename and merge act on every member of the nets
//! involved, selected or not; attach and join only move selected items that
//! are currently unconnected.

use std::collections::BTreeSet;
use tracing::{debug, info};

use super::{
    NetDirectory, WiringCase, WiringError, WiringOptions, WiringOutcome, WiringReport,
    RESERVED_NET_NAMES,
};
use crate::board::{Board, BoardItem, Net, NetCode, UNCONNECTED};
use crate::prompt::{NamePrompt, Prompt};

/// Resolve the current selection to a target net and repoint items onto it.
///
/// The board is committed after every applied case, even when no item
/// changed. A cancelled prompt or a rejected name leaves the board untouched
/// and uncommitted.
pub fn resolve_and_apply<B, P>(
    board: &mut B,
    prompt: &mut P,
    options: &WiringOptions,
) -> Result<WiringOutcome, WiringError>
where
    B: Board + ?Sized,
    P: Prompt + ?Sized,
{
    let selection = board.selection();
    let net_codes = NetDirectory::net_set(&selection);
    let case = WiringCase::classify(&net_codes);
    debug!(
        "Connect: {} selected items on {} nets, case {}",
        selection.len(),
        net_codes.len(),
        case
    );

    let (target, created) = if case.needs_name() {
        let suggestions = match case {
            WiringCase::Merge => NetDirectory::names_of(board, &net_codes)?,
            _ => NetDirectory::net_names(board),
        };
        let request = NamePrompt {
            title: case.prompt_title().to_string(),
            tooltip: case.prompt_tooltip().to_string(),
            suggestions,
        };
        let Some(typed) = prompt.prompt_net_name(&request) else {
            info!("Connect ({}) cancelled", case);
            return Ok(WiringOutcome::Cancelled);
        };
        let name = validate_name(board, &typed, options)?;
        resolve_net(board, &name)?
    } else {
        (join_target(board, &net_codes)?, false)
    };

    let targets = items_to_repoint(board, case, &selection, &net_codes);
    let result = repoint(board, &targets, &target);
    board.commit();
    let repointed = result?;

    info!(
        "Connect ({}): {} items now on {}{}",
        case,
        repointed,
        target,
        if created { " (new)" } else { "" }
    );
    Ok(WiringOutcome::Applied(WiringReport {
        case,
        net: target,
        created,
        repointed,
    }))
}

/// Check a typed name and normalise it per `options`.
pub fn validate_name<B: Board + ?Sized>(
    board: &B,
    typed: &str,
    options: &WiringOptions,
) -> Result<String, WiringError> {
    let name = if options.trim_names { typed.trim() } else { typed };
    let invalid = || WiringError::InvalidName(typed.to_string());

    if name.trim().is_empty() {
        return Err(invalid());
    }
    if board
        .find_net(UNCONNECTED)
        .is_some_and(|sentinel| sentinel.name == name)
    {
        return Err(invalid());
    }
    if options.reject_reserved_names && RESERVED_NET_NAMES.contains(&name) {
        return Err(invalid());
    }
    Ok(name.to_string())
}

/// Existing net with this exact name, or a freshly registered one.
fn resolve_net<B: Board + ?Sized>(board: &mut B, name: &str) -> Result<(Net, bool), WiringError> {
    if let Some(net) = board.find_net_by_name(name) {
        return Ok((net, false));
    }
    let net = board.create_net(name)?;
    info!("Created {}", net);
    Ok((net, true))
}

fn join_target<B: Board + ?Sized>(board: &B, net_codes: &BTreeSet<NetCode>) -> Result<Net, WiringError> {
    let code = net_codes
        .iter()
        .copied()
        .find(|&code| code != UNCONNECTED)
        .ok_or(WiringError::NetNotFound(UNCONNECTED))?;
    board.find_net(code).ok_or(WiringError::NetNotFound(code))
}

fn items_to_repoint<B: Board + ?Sized>(
    board: &B,
    case: WiringCase,
    selection: &[BoardItem],
    net_codes: &BTreeSet<NetCode>,
) -> Vec<BoardItem> {
    let unconnected_selected = || {
        selection
            .iter()
            .filter(|item| item.net.is_unconnected())
            .cloned()
    };

    match case {
        WiringCase::Attach | WiringCase::Join => unconnected_selected().collect(),
        WiringCase::Rename => NetDirectory::items_on_nets(board, net_codes),
        WiringCase::Merge => {
            // Only the selected unconnected items join the merge. Unselected
            // unconnected items anywhere else on the board stay where they are.
            let real: BTreeSet<NetCode> = net_codes
                .iter()
                .copied()
                .filter(|&code| code != UNCONNECTED)
                .collect();
            let mut items = NetDirectory::items_on_nets(board, &real);
            items.extend(unconnected_selected());
            items
        }
    }
}

fn repoint<B: Board + ?Sized>(board: &mut B, items: &[BoardItem], target: &Net) -> Result<usize, WiringError> {
    let mut moved = 0;
    for item in items {
        if item.net == *target {
            continue;
        }
        if item.net.is_unconnected() {
            board.connectivity_add(item.id)?;
        }
        board.set_net(item.id, target)?;
        debug!("{} -> {}", item, target);
        moved += 1;
    }
    Ok(moved)
}
