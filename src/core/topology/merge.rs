//! Merge und Split: zwei Nodes zu einem physischen Punkt zusammenlegen und
//! wieder trennen.

use crate::core::error::{TopologyError, TopologyResult};
use crate::core::items::{ItemData, ShapeMut};
use crate::core::{propagation, Direction, ItemId, Map, NodeId, Owner};

use super::{flip_rotation, normalize_prefab_node, prefab_link, recolor, PrefabLink};

/// Momentaufnahme eines Nodes für die Merge-Planung.
///
/// `flipped` markiert einen geplanten Wechsel des Prefabs in den anderen
/// Slot; Slots und Farbe sind dann bereits entsprechend umgerechnet.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeState {
    pub id: NodeId,
    pub uid: u64,
    pub red: bool,
    pub backward: Option<ItemId>,
    pub forward: Option<ItemId>,
    pub prefab: Option<PrefabLink>,
    pub flipped: bool,
    pub owner: Owner,
}

impl NodeState {
    pub fn capture(map: &Map, id: NodeId) -> TopologyResult<Self> {
        let node = map.node_entry(id)?;
        Ok(Self {
            id,
            uid: node.uid,
            red: node.is_red(),
            backward: node.backward(),
            forward: node.forward(),
            prefab: prefab_link(map, id),
            flipped: false,
            owner: node.owner(),
        })
    }

    /// Zustand nach einem Wechsel des Prefabs in den freien Slot.
    pub fn flipped(self) -> Option<Self> {
        let link = self.prefab?;
        let target = link.slot.opposite();
        let occupied = match target {
            Direction::Backward => self.backward.is_some(),
            Direction::Forward => self.forward.is_some(),
        };
        if occupied {
            return None;
        }
        Some(Self {
            backward: self.forward,
            forward: self.backward,
            red: link.is_origin || target == Direction::Forward,
            prefab: Some(PrefabLink {
                slot: target,
                ..link
            }),
            flipped: !self.flipped,
            ..self
        })
    }

    fn is_origin(&self) -> bool {
        self.prefab.is_some_and(|link| link.is_origin)
    }
}

/// Geprüfter Merge, bereit zur Ausführung.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MergePlan {
    keep: NodeState,
    discard: NodeState,
    backward: Option<ItemId>,
    forward: Option<ItemId>,
}

/// Prüft, ob zwei Node-Zustände zusammengelegt werden dürfen.
pub(crate) fn plan_merge(keep: NodeState, discard: NodeState) -> TopologyResult<MergePlan> {
    if keep.id == discard.id {
        return Err(TopologyError::SelfMerge(keep.uid));
    }
    if keep.owner != discard.owner {
        return Err(TopologyError::NotRootItem(discard.uid));
    }
    if keep.red == discard.red {
        if keep.red && (keep.is_origin() || discard.is_origin()) {
            return Err(TopologyError::BothAnchored(keep.uid));
        }
        return Err(TopologyError::SameColor {
            a: keep.uid,
            b: discard.uid,
        });
    }
    let backward = combine_slot(keep.backward, discard.backward, keep.uid, Direction::Backward)?;
    let forward = combine_slot(keep.forward, discard.forward, keep.uid, Direction::Forward)?;
    Ok(MergePlan {
        keep,
        discard,
        backward,
        forward,
    })
}

fn combine_slot(
    a: Option<ItemId>,
    b: Option<ItemId>,
    node: u64,
    direction: Direction,
) -> TopologyResult<Option<ItemId>> {
    match (a, b) {
        (Some(_), Some(_)) => Err(TopologyError::EndpointOccupied { node, direction }),
        (a, b) => Ok(a.or(b)),
    }
}

/// Führt einen geprüften Merge aus. Gibt den überlebenden Node zurück.
pub(crate) fn apply_merge(map: &mut Map, plan: MergePlan) -> TopologyResult<NodeId> {
    let keep = plan.keep.id;
    let discard = plan.discard.id;

    let discard_rotation = {
        let node = map.node_entry(discard)?;
        if plan.discard.flipped {
            flip_rotation(node.rotation)
        } else {
            node.rotation
        }
    };
    let discard_items: Vec<ItemId> = plan
        .discard
        .backward
        .into_iter()
        .chain(plan.discard.forward)
        .collect();

    for item in &discard_items {
        if let Some(entry) = map.item_mut(*item) {
            entry.data.shape_mut().replace_node(discard, keep);
        }
    }

    {
        let node = map.node_entry_mut(keep)?;
        node.set_item_in(Direction::Backward, plan.backward);
        node.set_item_in(Direction::Forward, plan.forward);
        if plan.keep.flipped {
            node.rotation = flip_rotation(node.rotation);
        } else if plan.discard.prefab.is_some() && plan.keep.prefab.is_none() {
            node.rotation = discard_rotation;
        }
    }

    if let Owner::Compound(compound) = plan.discard.owner {
        if let Some(ItemData::Compound(data)) = map.item_mut(compound).map(|i| &mut i.data) {
            data.nodes.retain(|r| !r.points_to(discard));
        }
    }
    map.remove_node(discard);
    // Anker kann gewechselt haben
    for item in discard_items {
        map.place_item(item);
    }
    map.refresh_node_sectors(keep);
    recolor(map, keep);

    log::debug!(
        "Node {:#x} in Node {:#x} zusammengelegt",
        plan.discard.uid,
        plan.keep.uid
    );
    propagation::recalculate_around_nodes(map, &[keep]);
    Ok(keep)
}

/// Legt `discard` mit `keep` zusammen.
///
/// Schlägt fehl, wenn beide Nodes dieselbe Farbe haben oder ein benötigter
/// Slot bereits belegt ist. Prefab-Nodes werden hier nicht umgedreht; das
/// übernimmt [`super::attach`].
pub fn merge(map: &mut Map, keep: NodeId, discard: NodeId) -> TopologyResult<NodeId> {
    let plan = plan_merge(
        NodeState::capture(map, keep)?,
        NodeState::capture(map, discard)?,
    )?;
    apply_merge(map, plan)
}

/// Trennt einen von zwei Items geteilten Node.
///
/// Die Seite, die nicht zum (Normalform-)Prefab gehört, bekommt einen neuen
/// Node an derselben Position. Gibt `None` zurück, wenn der Node nicht
/// geteilt ist.
pub fn split(map: &mut Map, node: NodeId) -> TopologyResult<Option<NodeId>> {
    let entry = map.node_entry(node)?;
    let (Some(backward), Some(forward)) = (entry.backward(), entry.forward()) else {
        return Ok(None);
    };
    let fixed = entry.fixed_position();
    let rotation = entry.rotation;
    let flags = entry.flags;
    let owner = entry.owner();

    let backward_is_prefab = matches!(map.item_entry(backward)?.data, ItemData::Prefab(_));
    let forward_is_prefab = matches!(map.item_entry(forward)?.data, ItemData::Prefab(_));
    // Das Prefab bleibt am Node; bei zwei Prefabs wandert das umgedrehte
    let moving_slot = if forward_is_prefab && !backward_is_prefab {
        Direction::Backward
    } else {
        Direction::Forward
    };
    let moving_item = match moving_slot {
        Direction::Backward => backward,
        Direction::Forward => forward,
    };

    let new_node = map.create_node_at(fixed, false, owner);
    if let Some(created) = map.node_mut(new_node) {
        created.rotation = rotation;
        created.flags = flags;
    }
    map.node_entry_mut(node)?.set_item_in(moving_slot, None);
    map.node_entry_mut(new_node)?
        .set_item_in(moving_slot, Some(moving_item));

    if let Some(item) = map.item_mut(moving_item) {
        match item.data.shape_mut() {
            // Schleife aus einem Segment: nur das Ende auf der bewegten Seite umhängen
            ShapeMut::Polyline(line) => match moving_slot {
                Direction::Forward => line.node = new_node.into(),
                Direction::Backward => line.forward_node = new_node.into(),
            },
            mut shape => {
                shape.replace_node(node, new_node);
            }
        }
    }

    map.place_item(moving_item);
    // Farben folgen allein den Slots: ein Prefab-Ursprung bleibt rot, das
    // abgetrennte Straßenende grün. Ein grüner Ursprung neben einem roten
    // Straßenende würde beim nächsten `recolor` wieder umgedreht.
    for id in [node, new_node] {
        normalize_prefab_node(map, id);
        map.refresh_node_sectors(id);
        recolor(map, id);
    }

    log::debug!("Node {node:?} getrennt, neuer Node {new_node:?}");
    propagation::recalculate_around_nodes(map, &[node, new_node]);
    Ok(Some(new_node))
}
