//! Attach: zwei unabhängig erzeugte Items an einem gemeinsamen Punkt verbinden.

use crate::core::error::{TopologyError, TopologyResult};
use crate::core::items::Shape;
use crate::core::{ItemId, Map, NodeId};

use super::chain::wrong_shape;
use super::merge::{apply_merge, plan_merge, MergePlan, NodeState};

/// Welcher Node des ersten Items verbunden werden soll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachPoint {
    /// Start-Node einer Polyline bzw. erster Node einer Liste
    Start,
    /// End-Node einer Polyline bzw. letzter Node einer Liste
    End,
    /// Node-Index (Prefab, Pfad, Polygon)
    Node(usize),
}

fn resolve_point(map: &Map, item: ItemId, point: AttachPoint) -> TopologyResult<NodeId> {
    let entry = map.item_entry(item)?;
    let refs = entry.shape().node_refs();
    let index = match (point, entry.shape()) {
        (AttachPoint::Start, _) => 0,
        (AttachPoint::End, Shape::SingleNode(_) | Shape::Slave(_)) => {
            return Err(wrong_shape(entry, "polyline, path or prefab"));
        }
        (AttachPoint::End, _) => refs.len().saturating_sub(1),
        (AttachPoint::Node(index), _) => index,
    };
    refs.get(index)
        .map(|r| r.handle())
        .ok_or(TopologyError::IndexOutOfRange {
            index,
            len: refs.len(),
        })
}

/// Plant den Merge zweier deckungsgleicher Nodes.
///
/// Prefab-Nodes dürfen dafür in den jeweils anderen Slot wechseln
/// (Rotation um 180° gedreht). Ist kein gültiger Zustand erreichbar, wird
/// der Fehler des ungedrehten Versuchs gemeldet.
fn plan_attach(map: &Map, a: NodeId, b: NodeId) -> TopologyResult<MergePlan> {
    let state_a = NodeState::capture(map, a)?;
    let state_b = NodeState::capture(map, b)?;
    let (keep, discard) = if state_b.prefab.is_some() && state_a.prefab.is_none() {
        (state_b, state_a)
    } else {
        (state_a, state_b)
    };

    let first = plan_merge(keep, discard);
    if first.is_ok() {
        return first;
    }
    let candidates = [
        discard.flipped().map(|d| (keep, d)),
        keep.flipped().map(|k| (k, discard)),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|(k, d)| plan_merge(k, d).ok())
        .map_or(first, Ok)
}

fn shared_node(map: &Map, node: NodeId, other: ItemId) -> TopologyResult<Option<NodeId>> {
    let position = map.node_entry(node)?.fixed_position();
    let other_item = map.item_entry(other)?;
    Ok(other_item.nodes().into_iter().find(|candidate| {
        *candidate != node
            && map
                .node(*candidate)
                .is_some_and(|n| n.fixed_position() == position)
    }))
}

/// Verbindet `item` an `point` mit dem deckungsgleichen Node von `other`.
///
/// Gibt den überlebenden Node zurück. Bei Prefab-Beteiligung überlebt der
/// Prefab-Node.
pub fn attach(
    map: &mut Map,
    item: ItemId,
    point: AttachPoint,
    other: ItemId,
) -> TopologyResult<NodeId> {
    let node = resolve_point(map, item, point)?;
    let Some(target) = shared_node(map, node, other)? else {
        return Err(no_shared_position(map, item, other));
    };
    let plan = plan_attach(map, node, target)?;
    apply_merge(map, plan)
}

/// Verbindet alle deckungsgleichen Node-Paare zweier Items (z.B. zwei Prefabs).
///
/// Jedes Paar wird erst nach dem vorherigen Merge geplant. Bei mehreren
/// Paaren läuft die Folge zuerst auf einer Kopie; schlägt ein Paar fehl,
/// bleibt die Karte unverändert.
pub fn attach_all(map: &mut Map, item: ItemId, other: ItemId) -> TopologyResult<Vec<NodeId>> {
    let nodes = map.item_entry(item)?.nodes();
    let mut pairs = 0;
    for node in &nodes {
        if shared_node(map, *node, other)?.is_some() {
            pairs += 1;
        }
    }
    if pairs == 0 {
        return Err(no_shared_position(map, item, other));
    }
    if pairs > 1 {
        attach_in_order(&mut map.clone(), &nodes, other)?;
    }
    attach_in_order(map, &nodes, other)
}

fn attach_in_order(map: &mut Map, nodes: &[NodeId], other: ItemId) -> TopologyResult<Vec<NodeId>> {
    let mut joined = Vec::new();
    for node in nodes {
        // Von einem früheren Merge verbraucht
        if map.node(*node).is_none() {
            continue;
        }
        let Some(target) = shared_node(map, *node, other)? else {
            continue;
        };
        let plan = plan_attach(map, *node, target)?;
        joined.push(apply_merge(map, plan)?);
    }
    Ok(joined)
}

fn no_shared_position(map: &Map, a: ItemId, b: ItemId) -> TopologyError {
    TopologyError::NoSharedPosition {
        a: map.item(a).map_or(0, |i| i.uid),
        b: map.item(b).map_or(0, |i| i.uid),
    }
}
