//! Items zu einem Compound zusammenfassen und wieder auflösen.
//!
//! Node-UIDs, Positionen und interne Referenzen bleiben unverändert; es
//! wechseln nur Besitzer und Sektor-Zugehörigkeit.

use std::collections::BTreeSet;

use glam::Vec3;
use indexmap::IndexSet;

use crate::core::error::{TopologyError, TopologyResult};
use crate::core::items::{Compound, Item, ItemData, ItemKind};
use crate::core::{Direction, ItemId, Map, NodeId, Owner, Reference};

/// Fasst `items` (plus Slaves enthaltener Prefabs) zu einem neuen Compound
/// mit Anker bei `position` zusammen.
///
/// Schlägt fehl, wenn ein beteiligter Node auch von einem Item ausserhalb der
/// Auswahl referenziert wird.
pub fn compound_items(map: &mut Map, items: &[ItemId], position: Vec3) -> TopologyResult<ItemId> {
    let mut selection: IndexSet<ItemId> = IndexSet::new();
    for item in items {
        let entry = map.item_entry(*item)?;
        if entry.owner() != Owner::Root {
            return Err(TopologyError::NotRootItem(entry.uid));
        }
        if entry.kind() == ItemKind::Compound {
            return Err(TopologyError::WrongShape {
                uid: entry.uid,
                expected: "kein Compound",
            });
        }
        selection.insert(*item);
        if let ItemData::Prefab(prefab) = &entry.data {
            selection.extend(prefab.shape.slaves.iter().filter_map(|r| r.resolved()));
        }
    }

    let mut nodes: BTreeSet<NodeId> = BTreeSet::new();
    for item in &selection {
        nodes.extend(map.item_entry(*item)?.nodes());
    }
    for node in &nodes {
        let entry = map.node_entry(*node)?;
        if entry.items().any(|item| !selection.contains(&item)) {
            return Err(TopologyError::SharedOutsideSubset { node: entry.uid });
        }
    }

    let anchor = map.create_node(position, true, Owner::Root)?;
    let compound = Compound::new(anchor);
    let compound_id = map.attach_item(Item::new(0, ItemData::Compound(compound)), Owner::Root)?;
    map.link(anchor, Direction::Forward, Some(compound_id))?;

    for item in &selection {
        map.unplace_item(*item);
        if let Some(entry) = map.item_mut(*item) {
            entry.owner = Owner::Compound(compound_id);
        }
    }
    for node in &nodes {
        if let Some(entry) = map.node_mut(*node) {
            entry.owner = Owner::Compound(compound_id);
            entry.sectors.clear();
        }
    }
    if let Some(ItemData::Compound(data)) = map.item_mut(compound_id).map(|i| &mut i.data) {
        data.items = selection.iter().map(|id| Reference::Resolved(*id)).collect();
        data.nodes = nodes.iter().map(|id| Reference::Resolved(*id)).collect();
    }

    log::debug!("{} Items zu Compound zusammengefasst", selection.len());
    Ok(compound_id)
}

/// Löst ein Compound auf: Kinder wandern zurück in die Karte, Compound und
/// Anker-Node werden gelöscht. Gibt die freigegebenen Items zurück.
pub fn uncompound_items(map: &mut Map, compound: ItemId) -> TopologyResult<Vec<ItemId>> {
    let entry = map.item_entry(compound)?;
    let ItemData::Compound(data) = &entry.data else {
        return Err(super::chain::wrong_shape(entry, "compound"));
    };
    if entry.owner() != Owner::Root {
        return Err(TopologyError::NotRootItem(entry.uid));
    }
    let children: Vec<ItemId> = data.items.iter().map(|r| r.handle()).collect();
    let child_nodes: Vec<NodeId> = data.nodes.iter().map(|r| r.handle()).collect();
    let anchor = data.shape.node.handle();

    for node in &child_nodes {
        if let Some(entry) = map.node_mut(*node) {
            entry.owner = Owner::Root;
        }
    }
    for item in &children {
        if let Some(entry) = map.item_mut(*item) {
            entry.owner = Owner::Root;
        }
        map.place_item(*item);
    }
    for node in &child_nodes {
        map.refresh_node_sectors(*node);
    }

    map.remove_item(compound);
    map.remove_node(anchor);
    log::debug!("Compound aufgeloest, {} Items freigegeben", children.len());
    Ok(children)
}
