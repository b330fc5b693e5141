//! Topologie-Engine: alle strukturellen Graph-Operationen.
//!
//! Jede Operation prüft ihre Vorbedingungen vollständig, bevor sie die Karte
//! verändert, und stößt danach die Rotations-/Längen-Propagation an.

pub mod attach;
pub mod chain;
pub mod compound;
pub mod delete;
pub mod merge;
pub mod origin;

pub use attach::{attach, attach_all, AttachPoint};
pub use chain::{
    add_path, add_polygon, add_polyline, add_single_node, append_path_node, append_polyline,
    prepend_path_node, prepend_polyline,
};
pub use compound::{compound_items, uncompound_items};
pub use delete::delete_item;
pub use merge::{merge, split};
pub use origin::change_origin;

use std::f32::consts::PI;

use glam::Quat;

use super::items::{ItemData, ShapeKind};
use super::{Direction, ItemId, Map, NodeId};

/// Verbindung eines Nodes zu einem Prefab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PrefabLink {
    pub prefab: ItemId,
    pub slot: Direction,
    pub is_origin: bool,
}

/// Prefab im angegebenen Slot des Nodes, falls vorhanden.
pub(crate) fn prefab_in_slot(map: &Map, node: NodeId, slot: Direction) -> Option<PrefabLink> {
    let item_id = map.node(node)?.item_in(slot)?;
    match &map.item(item_id)?.data {
        ItemData::Prefab(prefab) => Some(PrefabLink {
            prefab: item_id,
            slot,
            is_origin: prefab
                .shape
                .origin_node()
                .is_some_and(|origin| origin.points_to(node)),
        }),
        _ => None,
    }
}

/// Bevorzugt das Prefab im Forward-Slot (umgedrehte Form).
pub(crate) fn prefab_link(map: &Map, node: NodeId) -> Option<PrefabLink> {
    prefab_in_slot(map, node, Direction::Forward)
        .or_else(|| prefab_in_slot(map, node, Direction::Backward))
}

/// Rotation um 180° um die Hochachse.
pub(crate) fn flip_rotation(rotation: Quat) -> Quat {
    (rotation * Quat::from_rotation_y(PI)).normalize()
}

/// Farbe, die ein Polyline-/Prefab-Node aus seinen Slots ergibt.
pub(crate) fn expected_color(map: &Map, node: NodeId) -> Option<bool> {
    let entry = map.node(node)?;
    if prefab_in_slot(map, node, Direction::Forward).is_some() {
        return Some(true);
    }
    if let Some(link) = prefab_in_slot(map, node, Direction::Backward) {
        return Some(link.is_origin);
    }
    Some(entry.backward_item.is_none() && entry.forward_item.is_some())
}

/// Färbt einen Node nach seinen Slots neu.
///
/// Nodes von Polygonen, Pfaden, Einzel-Node- und Slave-Items behalten ihre
/// Farbe; dort ist sie durch die Reihenfolge im Item festgelegt.
pub(crate) fn recolor(map: &mut Map, node: NodeId) {
    let Some(entry) = map.node(node) else {
        return;
    };
    let chain_node = entry.items().all(|item| {
        map.item(item).is_some_and(|i| {
            matches!(
                i.kind().shape_kind(),
                ShapeKind::Polyline | ShapeKind::Prefab
            )
        })
    });
    if !chain_node || entry.is_orphaned() {
        return;
    }
    if let Some(red) = expected_color(map, node) {
        if let Some(entry) = map.node_mut(node) {
            entry.set_red(red);
        }
    }
}

/// Bringt einen Prefab-Node zurück in die Normalform (Prefab im Backward-Slot),
/// wenn der Backward-Slot frei ist.
pub(crate) fn normalize_prefab_node(map: &mut Map, node: NodeId) {
    let Some(link) = prefab_in_slot(map, node, Direction::Forward) else {
        return;
    };
    let Some(entry) = map.node_mut(node) else {
        return;
    };
    if entry.backward_item.is_some() {
        return;
    }
    entry.set_item_in(Direction::Forward, None);
    entry.set_item_in(Direction::Backward, Some(link.prefab));
    entry.rotation = flip_rotation(entry.rotation);
}
