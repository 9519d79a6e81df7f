//! In-memory host board with a connectivity index and ratsnest.
//!
//! The ratsnest is the set of airwires drawn between members of the same net:
//! for each net, a minimum spanning tree over the indexed items, weighted by
//! distance when positions are known.

use petgraph::algo::min_spanning_tree;
use petgraph::data::Element;
use petgraph::graph::UnGraph;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::{
    Board, BoardError, BoardItem, ItemId, ItemKind, Net, NetCode, PadKey, Point, Selector,
    UNCONNECTED,
};

/// Edge weight used between items without a position.
const UNPLACED_DISTANCE: f64 = 1.0;

/// One unrouted connection between two items of the same net.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Airwire {
    pub net: NetCode,
    pub from: ItemId,
    pub to: ItemId,
    pub length: f64,
}

/// How many times each commit step ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitStats {
    pub net_list_builds: usize,
    pub ratsnest_builds: usize,
    pub refreshes: usize,
}

#[derive(Debug, Clone)]
pub struct MemoryBoard {
    nets: BTreeMap<NetCode, Net>,
    items: Vec<BoardItem>,
    /// Items tracked by the connectivity index
    indexed: BTreeSet<ItemId>,
    /// Member counts per net, valid as of the last net-list build
    net_members: BTreeMap<NetCode, usize>,
    airwires: Vec<Airwire>,
    ratsnest_stale: bool,
    stats: CommitStats,
}

impl Default for MemoryBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBoard {
    /// An empty board holding only the unconnected net.
    pub fn new() -> Self {
        let mut nets = BTreeMap::new();
        nets.insert(UNCONNECTED, Net::unconnected());
        Self {
            nets,
            items: Vec::new(),
            indexed: BTreeSet::new(),
            net_members: BTreeMap::new(),
            airwires: Vec::new(),
            ratsnest_stale: false,
            stats: CommitStats::default(),
        }
    }

    /// Register a net under a fixed code, as read from a board file.
    pub fn insert_net(&mut self, code: NetCode, name: &str) -> Result<Net, BoardError> {
        if let Some(existing) = self.nets.get(&code) {
            if existing.name == name {
                return Ok(existing.clone());
            }
            return Err(BoardError::Host(format!(
                "net code {} is already registered as \"{}\"",
                code, existing.name
            )));
        }
        if self.find_net_by_name(name).is_some() {
            return Err(BoardError::DuplicateNetName(name.to_string()));
        }
        let net = Net::new(code, name);
        self.nets.insert(code, net.clone());
        Ok(net)
    }

    /// Register a net under the next free code.
    pub fn add_net(&mut self, name: &str) -> Result<Net, BoardError> {
        self.create_net(name)
    }

    pub fn add_pad(&mut self, reference: &str, pad: &str, code: NetCode) -> Result<ItemId, BoardError> {
        self.push_item(ItemKind::Pad, code, Some(reference), Some(pad))
    }

    pub fn add_track(&mut self, code: NetCode) -> Result<ItemId, BoardError> {
        self.push_item(ItemKind::Track, code, None, None)
    }

    pub fn add_via(&mut self, code: NetCode) -> Result<ItemId, BoardError> {
        self.push_item(ItemKind::Via, code, None, None)
    }

    pub fn add_zone(&mut self, code: NetCode) -> Result<ItemId, BoardError> {
        self.push_item(ItemKind::Zone, code, None, None)
    }

    fn push_item(
        &mut self,
        kind: ItemKind,
        code: NetCode,
        reference: Option<&str>,
        pad: Option<&str>,
    ) -> Result<ItemId, BoardError> {
        let net = self.nets.get(&code).cloned().ok_or(BoardError::UnknownNet(code))?;
        let id = ItemId(self.items.len());
        self.items.push(BoardItem {
            id,
            kind,
            net,
            selected: false,
            reference: reference.map(str::to_string),
            pad: pad.map(str::to_string),
            position: None,
        });
        self.indexed.insert(id);
        self.ratsnest_stale = true;
        Ok(id)
    }

    fn item_mut(&mut self, id: ItemId) -> Result<&mut BoardItem, BoardError> {
        self.items.get_mut(id.0).ok_or(BoardError::UnknownItem(id.0))
    }

    pub fn item(&self, id: ItemId) -> Option<&BoardItem> {
        self.items.get(id.0)
    }

    pub fn net_of(&self, id: ItemId) -> Option<&Net> {
        self.item(id).map(|item| &item.net)
    }

    pub fn find_pad(&self, reference: &str, pad: &str) -> Option<ItemId> {
        let key = PadKey::new(reference, pad);
        self.items
            .iter()
            .find(|item| item.pad_key().as_ref() == Some(&key))
            .map(|item| item.id)
    }

    pub fn set_position(&mut self, id: ItemId, position: Point) -> Result<(), BoardError> {
        self.item_mut(id)?.position = Some(position);
        Ok(())
    }

    pub fn select(&mut self, id: ItemId) -> Result<(), BoardError> {
        self.item_mut(id)?.selected = true;
        Ok(())
    }

    pub fn deselect(&mut self, id: ItemId) -> Result<(), BoardError> {
        self.item_mut(id)?.selected = false;
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        for item in &mut self.items {
            item.selected = false;
        }
    }

    /// Select the item named by `selector`.
    pub fn select_matching(&mut self, selector: &Selector) -> Result<ItemId, BoardError> {
        let id = selector
            .resolve(&self.items)
            .ok_or_else(|| BoardError::NoMatch(selector.to_string()))?;
        self.select(id)?;
        Ok(id)
    }

    /// Whether the connectivity index tracks this item.
    pub fn is_indexed(&self, id: ItemId) -> bool {
        self.indexed.contains(&id)
    }

    pub fn airwires(&self) -> &[Airwire] {
        &self.airwires
    }

    pub fn airwires_on(&self, code: NetCode) -> usize {
        self.airwires.iter().filter(|a| a.net == code).count()
    }

    pub fn is_ratsnest_stale(&self) -> bool {
        self.ratsnest_stale
    }

    pub fn commit_stats(&self) -> CommitStats {
        self.stats
    }

    /// Member count of a net as of the last net-list build.
    pub fn net_member_count(&self, code: NetCode) -> usize {
        self.net_members.get(&code).copied().unwrap_or(0)
    }

    fn net_airwires(&self, code: NetCode, members: &[&BoardItem]) -> Vec<Airwire> {
        let mut graph = UnGraph::<ItemId, f64>::new_undirected();
        let nodes: Vec<_> = members.iter().map(|item| graph.add_node(item.id)).collect();

        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let length = match (members[i].position, members[j].position) {
                    (Some(a), Some(b)) => a.distance(&b),
                    _ => UNPLACED_DISTANCE,
                };
                graph.add_edge(nodes[i], nodes[j], length);
            }
        }

        min_spanning_tree(&graph)
            .filter_map(|element| match element {
                Element::Edge {
                    source,
                    target,
                    weight,
                } => Some(Airwire {
                    net: code,
                    from: members[source].id,
                    to: members[target].id,
                    length: weight,
                }),
                Element::Node { .. } => None,
            })
            .collect()
    }
}

impl Board for MemoryBoard {
    fn items(&self) -> Vec<BoardItem> {
        self.items.clone()
    }

    fn nets(&self) -> Vec<Net> {
        self.nets.values().cloned().collect()
    }

    fn find_net(&self, code: NetCode) -> Option<Net> {
        self.nets.get(&code).cloned()
    }

    fn find_net_by_name(&self, name: &str) -> Option<Net> {
        self.nets.values().find(|net| net.name == name).cloned()
    }

    fn create_net(&mut self, name: &str) -> Result<Net, BoardError> {
        if self.find_net_by_name(name).is_some() {
            return Err(BoardError::DuplicateNetName(name.to_string()));
        }
        let code = match self.nets.keys().next_back() {
            Some(&last) => last
                .checked_add(1)
                .ok_or_else(|| BoardError::Host(format!("no net code left after {}", last)))?,
            None => 1,
        };
        let net = Net::new(code, name);
        self.nets.insert(code, net.clone());
        debug!("Registered new net {}", net);
        Ok(net)
    }

    fn set_net(&mut self, id: ItemId, net: &Net) -> Result<(), BoardError> {
        if self.nets.get(&net.code) != Some(net) {
            return Err(BoardError::UnknownNet(net.code));
        }
        self.item_mut(id)?.net = net.clone();
        self.ratsnest_stale = true;
        Ok(())
    }

    fn set_net_code(&mut self, id: ItemId, code: NetCode) -> Result<(), BoardError> {
        let net = self.nets.get(&code).cloned().ok_or(BoardError::UnknownNet(code))?;
        self.item_mut(id)?.net = net;
        self.ratsnest_stale = true;
        Ok(())
    }

    fn connectivity_add(&mut self, id: ItemId) -> Result<(), BoardError> {
        self.item_mut(id)?;
        self.indexed.insert(id);
        self.ratsnest_stale = true;
        Ok(())
    }

    fn connectivity_remove(&mut self, id: ItemId) -> Result<(), BoardError> {
        self.item_mut(id)?;
        self.indexed.remove(&id);
        self.ratsnest_stale = true;
        Ok(())
    }

    fn build_list_of_nets(&mut self) {
        let mut members = BTreeMap::new();
        for item in &self.items {
            *members.entry(item.net.code).or_insert(0) += 1;
        }
        self.net_members = members;
        self.stats.net_list_builds += 1;
    }

    fn recalculate_ratsnest(&mut self) {
        let mut by_net: BTreeMap<NetCode, Vec<&BoardItem>> = BTreeMap::new();
        for item in &self.items {
            if item.net.code != UNCONNECTED && self.indexed.contains(&item.id) {
                by_net.entry(item.net.code).or_default().push(item);
            }
        }

        let airwires: Vec<Airwire> = by_net
            .iter()
            .filter(|(_, members)| members.len() > 1)
            .flat_map(|(code, members)| self.net_airwires(*code, members))
            .collect();

        debug!("Ratsnest rebuilt: {} airwires over {} nets", airwires.len(), by_net.len());
        self.airwires = airwires;
        self.ratsnest_stale = false;
        self.stats.ratsnest_builds += 1;
    }

    fn refresh(&mut self) {
        self.stats.refreshes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_board_has_sentinel() {
        let board = MemoryBoard::new();
        assert_eq!(board.nets(), vec![Net::unconnected()]);
        assert_eq!(board.find_net(UNCONNECTED), Some(Net::unconnected()));
    }

    #[test]
    fn test_create_net_assigns_next_code() {
        let mut board = MemoryBoard::new();
        let gnd = board.add_net("GND").unwrap();
        let vcc = board.add_net("VCC").unwrap();
        assert_eq!(gnd.code, 1);
        assert_eq!(vcc.code, 2);
        assert_eq!(board.find_net_by_name("VCC"), Some(vcc));
    }

    #[test]
    fn test_create_net_fails_when_codes_run_out() {
        let mut board = MemoryBoard::new();
        board.insert_net(NetCode::MAX, "TOP").unwrap();

        let result = board.create_net("NEXT");

        assert!(matches!(result, Err(BoardError::Host(_))));
        assert!(board.find_net_by_name("NEXT").is_none());
        assert_eq!(board.nets().len(), 2);
    }

    #[test]
    fn test_create_net_rejects_duplicate_name() {
        let mut board = MemoryBoard::new();
        board.add_net("GND").unwrap();
        assert_eq!(
            board.add_net("GND"),
            Err(BoardError::DuplicateNetName("GND".to_string()))
        );
    }

    #[test]
    fn test_insert_net_keeps_code() {
        let mut board = MemoryBoard::new();
        board.insert_net(7, "CLK").unwrap();
        let next = board.add_net("DATA").unwrap();
        assert_eq!(next.code, 8);
        assert!(board.insert_net(7, "OTHER").is_err());
    }

    #[test]
    fn test_set_net_requires_registered_net() {
        let mut board = MemoryBoard::new();
        let pad = board.add_pad("U1", "1", UNCONNECTED).unwrap();
        let stray = Net::new(42, "STRAY");
        assert_eq!(board.set_net(pad, &stray), Err(BoardError::UnknownNet(42)));

        // Registered code with a different name is not the same net
        let gnd = board.add_net("GND").unwrap();
        let forged = Net::new(gnd.code, "NOT_GND");
        assert!(board.set_net(pad, &forged).is_err());
        assert_eq!(board.net_of(pad), Some(&Net::unconnected()));
    }

    #[test]
    fn test_set_net_code_resolves_name() {
        let mut board = MemoryBoard::new();
        let gnd = board.add_net("GND").unwrap();
        let pad = board.add_pad("U1", "1", gnd.code).unwrap();
        board.set_net_code(pad, UNCONNECTED).unwrap();
        assert_eq!(board.net_of(pad), Some(&Net::unconnected()));
    }

    #[test]
    fn test_ratsnest_is_spanning_tree() {
        let mut board = MemoryBoard::new();
        let gnd = board.add_net("GND").unwrap();
        let a = board.add_pad("U1", "1", gnd.code).unwrap();
        let b = board.add_pad("U2", "1", gnd.code).unwrap();
        let c = board.add_pad("U3", "1", gnd.code).unwrap();
        board.set_position(a, Point::new(0.0, 0.0)).unwrap();
        board.set_position(b, Point::new(10.0, 0.0)).unwrap();
        board.set_position(c, Point::new(11.0, 0.0)).unwrap();
        board.add_pad("U4", "1", UNCONNECTED).unwrap();

        assert!(board.is_ratsnest_stale());
        board.commit();
        assert!(!board.is_ratsnest_stale());

        let wires = board.airwires();
        assert_eq!(wires.len(), 2);
        let total: f64 = wires.iter().map(|w| w.length).sum();
        assert!((total - 11.0).abs() < 1e-9);
        assert_eq!(board.airwires_on(gnd.code), 2);
    }

    #[test]
    fn test_connectivity_remove_drops_airwires() {
        let mut board = MemoryBoard::new();
        let gnd = board.add_net("GND").unwrap();
        let a = board.add_pad("U1", "1", gnd.code).unwrap();
        board.add_pad("U2", "1", gnd.code).unwrap();
        board.commit();
        assert_eq!(board.airwires().len(), 1);

        board.connectivity_remove(a).unwrap();
        assert!(!board.is_indexed(a));
        board.recalculate_ratsnest();
        assert!(board.airwires().is_empty());
    }

    #[test]
    fn test_commit_runs_every_step_once() {
        let mut board = MemoryBoard::new();
        board.commit();
        assert_eq!(
            board.commit_stats(),
            CommitStats {
                net_list_builds: 1,
                ratsnest_builds: 1,
                refreshes: 1,
            }
        );
    }

    #[test]
    fn test_select_matching() {
        let mut board = MemoryBoard::new();
        board.add_pad("U1", "1", UNCONNECTED).unwrap();
        board.add_via(UNCONNECTED).unwrap();
        let second_via = board.add_via(UNCONNECTED).unwrap();

        let id = board.select_matching(&"via:1".parse().unwrap()).unwrap();
        assert_eq!(id, second_via);
        assert_eq!(board.selection().len(), 1);

        let missing = board.select_matching(&"U9:1".parse().unwrap());
        assert_eq!(missing, Err(BoardError::NoMatch("U9:1".to_string())));
    }

    #[test]
    fn test_net_member_count_after_build() {
        let mut board = MemoryBoard::new();
        let gnd = board.add_net("GND").unwrap();
        board.add_pad("U1", "1", gnd.code).unwrap();
        board.add_track(gnd.code).unwrap();
        board.build_list_of_nets();
        assert_eq!(board.net_member_count(gnd.code), 2);
        assert_eq!(board.net_member_count(UNCONNECTED), 0);
    }
}
