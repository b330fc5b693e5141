//! Löschen von Items inklusive Aufräumen verwaister Nodes.

use std::collections::HashSet;

use crate::core::error::TopologyResult;
use crate::core::items::ItemData;
use crate::core::{propagation, Direction, ItemId, Map, NodeId, Owner};

use super::{normalize_prefab_node, recolor};

/// Löscht ein Item.
///
/// Slaves eines Prefabs und Kinder eines Compounds werden mitgelöscht.
/// Nodes ohne verbleibende Referenz werden entfernt; Nachbarn verlieren ihren
/// Verweis auf das gelöschte Item und werden neu gefärbt und ausgerichtet.
pub fn delete_item(map: &mut Map, item: ItemId) -> TopologyResult<()> {
    map.item_entry(item)?;

    let mut order = Vec::new();
    collect_dependents(map, item, &mut order, &mut HashSet::new());

    let mut touched = Vec::new();
    for id in order {
        delete_single(map, id, &mut touched);
    }

    touched.retain(|node| map.node(*node).is_some());
    touched.sort_unstable();
    touched.dedup();
    for node in &touched {
        normalize_prefab_node(map, *node);
        recolor(map, *node);
    }
    propagation::recalculate_around_nodes(map, &touched);
    Ok(())
}

/// Abhängige Items zuerst (Kinder vor Eltern).
fn collect_dependents(
    map: &Map,
    item: ItemId,
    order: &mut Vec<ItemId>,
    seen: &mut HashSet<ItemId>,
) {
    if !seen.insert(item) {
        return;
    }
    let Some(entry) = map.item(item) else {
        return;
    };
    let children: Vec<ItemId> = match &entry.data {
        ItemData::Prefab(prefab) => prefab.shape.slaves.iter().filter_map(|r| r.resolved()).collect(),
        ItemData::Compound(compound) => compound.items.iter().filter_map(|r| r.resolved()).collect(),
        _ => Vec::new(),
    };
    for child in children {
        collect_dependents(map, child, order, seen);
    }
    order.push(item);
}

fn delete_single(map: &mut Map, item: ItemId, touched: &mut Vec<NodeId>) {
    let Some(entry) = map.item(item) else {
        return;
    };
    let uid = entry.uid;
    let owner = entry.owner();
    let nodes = entry.nodes();
    let master = match &entry.data {
        ItemData::Company(slave) => slave.shape.prefab.resolved(),
        ItemData::Service(slave) => slave.shape.prefab.resolved(),
        _ => None,
    };
    let compound_nodes: Vec<NodeId> = match &entry.data {
        ItemData::Compound(compound) => compound.nodes.iter().filter_map(|r| r.resolved()).collect(),
        _ => Vec::new(),
    };

    if let Some(master) = master {
        if let Some(ItemData::Prefab(prefab)) = map.item_mut(master).map(|i| &mut i.data) {
            prefab.shape.slaves.retain(|r| !r.points_to(item));
        }
    }
    if let Owner::Compound(compound) = owner {
        if let Some(ItemData::Compound(data)) = map.item_mut(compound).map(|i| &mut i.data) {
            data.items.retain(|r| !r.points_to(item));
        }
    }

    for node in nodes {
        let Some(entry) = map.node_mut(node) else {
            continue;
        };
        for direction in [Direction::Backward, Direction::Forward] {
            if entry.item_in(direction) == Some(item) {
                entry.set_item_in(direction, None);
            }
        }
        if entry.is_orphaned() {
            remove_orphan(map, node);
        } else {
            map.refresh_node_sectors(node);
            touched.push(node);
        }
    }
    // Nach dem Löschen aller Kinder verbleibende Compound-Nodes
    for node in compound_nodes {
        if map.node(node).is_some_and(|n| n.is_orphaned()) {
            remove_orphan(map, node);
        }
    }

    map.remove_item(item);
    log::debug!("Item {uid:#x} geloescht");
}

fn remove_orphan(map: &mut Map, node: NodeId) {
    if let Some(Owner::Compound(compound)) = map.node(node).map(|n| n.owner()) {
        if let Some(ItemData::Compound(data)) = map.item_mut(compound).map(|i| &mut i.data) {
            data.nodes.retain(|r| !r.points_to(node));
        }
    }
    map.remove_node(node);
}
