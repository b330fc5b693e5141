//! Compound: Container-Item mit eigenem Anker, das andere Items samt ihrer
//! Nodes enthält.

use glam::Vec3;
use ts_map_primitives::FlagField;

use super::{ItemData, SingleNodeShape};
use crate::core::container::ItemContainer;
use crate::core::error::{TopologyError, TopologyResult};
use crate::core::{topology, ItemId, NodeId, Owner, Reference};

const FLAG_REFLECTION: u32 = 0;
const FLAG_HIDE_IN_UI_MAP: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Compound {
    pub shape: SingleNodeShape,
    pub flags: FlagField,
    /// Kind-Items in Speicherreihenfolge
    pub items: Vec<Reference<ItemId>>,
    /// Kind-Nodes in Speicherreihenfolge
    pub nodes: Vec<Reference<NodeId>>,
}

impl Compound {
    pub fn new(anchor: NodeId) -> Self {
        Self {
            shape: SingleNodeShape {
                node: anchor.into(),
            },
            flags: FlagField::default(),
            items: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Legt ein leeres Compound an; Kinder werden über
    /// [`crate::core::CompoundScope`] eingefügt.
    pub fn add<C: ItemContainer + ?Sized>(container: &mut C, position: Vec3) -> TopologyResult<ItemId> {
        if let Owner::Compound(parent) = container.owner() {
            let uid = container.map_mut().item_entry(parent)?.uid;
            return Err(TopologyError::NestedCompound(uid));
        }
        topology::add_single_node(container, position, |shape| {
            ItemData::Compound(Compound {
                shape,
                flags: FlagField::default(),
                items: Vec::new(),
                nodes: Vec::new(),
            })
        })
    }

    pub fn reflection(&self) -> bool {
        self.flags.get(FLAG_REFLECTION)
    }

    pub fn set_reflection(&mut self, value: bool) {
        self.flags.set(FLAG_REFLECTION, value);
    }

    pub fn hide_in_ui_map(&self) -> bool {
        self.flags.get(FLAG_HIDE_IN_UI_MAP)
    }

    pub fn set_hide_in_ui_map(&mut self, value: bool) {
        self.flags.set(FLAG_HIDE_IN_UI_MAP, value);
    }
}
