//! Prefab: vorgefertigtes Bauteil (Kreuzung, Firmengelände, ...) mit fester
//! Node-Liste und Ursprungs-Node.

use glam::{Quat, Vec3};
use ts_map_primitives::{FlagField, Token};

use super::{Item, ItemData, PrefabShape};
use crate::core::container::ItemContainer;
use crate::core::error::{TopologyError, TopologyResult};
use crate::core::topology::{self, AttachPoint};
use crate::core::{propagation, Direction, FixedVec3, ItemId, Map, NodeId};

const BYTE_DLC_GUARD: u32 = 0;
const FLAG_TOLLGATE: u32 = 8;
const FLAG_IGNORE_CUT_PLANES: u32 = 9;
const FLAG_NO_BOUNDARY: u32 = 10;
const FLAG_SECRET: u32 = 11;

/// Lage eines Prefab-Nodes relativ zum Ursprung (ungedreht).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefabNodeLayout {
    pub offset: Vec3,
    /// Richtung aus dem Prefab heraus
    pub direction: Vec3,
}

/// Node-Anordnung eines Prefab-Modells, wie sie der Prefab-Deskriptor liefert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrefabLayout {
    pub nodes: Vec<PrefabNodeLayout>,
}

/// Einstellungen pro Prefab-Node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PrefabCorner {
    pub terrain_material: Token,
    pub color_variant: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prefab {
    pub shape: PrefabShape,
    pub flags: FlagField,
    pub model: Token,
    pub variant: Token,
    pub look: Token,
    /// Eine Ecke pro Node
    pub corners: Vec<PrefabCorner>,
}

impl Prefab {
    pub fn new(shape: PrefabShape, model: Token) -> Self {
        let corners = vec![PrefabCorner::default(); shape.nodes.len()];
        Self {
            shape,
            flags: FlagField::default(),
            model,
            variant: Token::EMPTY,
            look: Token::EMPTY,
            corners,
        }
    }

    /// Platziert ein Prefab mit Ursprung bei `position`, um `yaw` gedreht.
    ///
    /// Alle Nodes führen das Prefab im Backward-Slot und zeigen aus dem
    /// Prefab heraus; nur der Ursprung (Index 0) ist rot.
    pub fn add<C: ItemContainer + ?Sized>(
        container: &mut C,
        position: Vec3,
        yaw: f32,
        layout: &PrefabLayout,
        model: Token,
    ) -> TopologyResult<ItemId> {
        if layout.nodes.is_empty() {
            return Err(TopologyError::IndexOutOfRange { index: 0, len: 0 });
        }
        let rotation = Quat::from_rotation_y(yaw);
        let placed: Vec<(Vec3, Quat)> = layout
            .nodes
            .iter()
            .map(|node| {
                let heading = propagation::heading_rotation(rotation * node.direction)
                    .unwrap_or(rotation);
                (position + rotation * node.offset, heading)
            })
            .collect();
        for (position, _) in &placed {
            FixedVec3::from_vec3(*position)?;
        }

        let mut nodes: Vec<NodeId> = Vec::with_capacity(placed.len());
        for (i, (position, heading)) in placed.iter().enumerate() {
            let node = container.add_node(*position, i == 0)?;
            if let Some(entry) = container.map_mut().node_mut(node) {
                entry.rotation = *heading;
            }
            nodes.push(node);
        }

        let shape = PrefabShape {
            nodes: nodes.iter().map(|n| (*n).into()).collect(),
            origin: 0,
            slaves: Vec::new(),
        };
        let item = container.add_item(Item::new(0, ItemData::Prefab(Prefab::new(shape, model))))?;
        let map = container.map_mut();
        for node in nodes {
            map.link(node, Direction::Backward, Some(item))?;
        }
        Ok(item)
    }

    /// Verbindet Node `index` dieses Prefabs mit dem deckungsgleichen Node
    /// eines anderen Items.
    pub fn attach(map: &mut Map, prefab: ItemId, index: usize, other: ItemId) -> TopologyResult<NodeId> {
        topology::attach(map, prefab, AttachPoint::Node(index), other)
    }

    /// Setzt den Ursprung auf Node `index`.
    pub fn change_origin(map: &mut Map, prefab: ItemId, index: usize) -> TopologyResult<()> {
        topology::change_origin(map, prefab, index)
    }

    pub fn dlc_guard(&self) -> u8 {
        self.flags.get_byte(BYTE_DLC_GUARD)
    }

    pub fn set_dlc_guard(&mut self, guard: u8) {
        self.flags.set_byte(BYTE_DLC_GUARD, guard);
    }

    pub fn is_tollgate(&self) -> bool {
        self.flags.get(FLAG_TOLLGATE)
    }

    pub fn set_tollgate(&mut self, value: bool) {
        self.flags.set(FLAG_TOLLGATE, value);
    }

    pub fn ignore_cut_planes(&self) -> bool {
        self.flags.get(FLAG_IGNORE_CUT_PLANES)
    }

    pub fn set_ignore_cut_planes(&mut self, value: bool) {
        self.flags.set(FLAG_IGNORE_CUT_PLANES, value);
    }

    pub fn no_boundary(&self) -> bool {
        self.flags.get(FLAG_NO_BOUNDARY)
    }

    pub fn set_no_boundary(&mut self, value: bool) {
        self.flags.set(FLAG_NO_BOUNDARY, value);
    }

    pub fn is_secret(&self) -> bool {
        self.flags.get(FLAG_SECRET)
    }

    pub fn set_secret(&mut self, value: bool) {
        self.flags.set(FLAG_SECRET, value);
    }
}
