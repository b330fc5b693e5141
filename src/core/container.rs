//! Gemeinsamer Einfüge-Vertrag für die Karte und für Compound-Items.

use glam::Vec3;

use super::error::{TopologyError, TopologyResult};
use super::items::{Item, ItemKind};
use super::{ItemId, Map, NodeId, Owner};

/// Ziel, in das neue Nodes und Items eingefügt werden.
///
/// Die Item-Konstruktoren (`Road::add`, `Prefab::add`, ...) sind generisch
/// über diesen Trait und funktionieren dadurch gleichermaßen direkt in der
/// Karte wie innerhalb eines Compounds.
pub trait ItemContainer {
    /// Zugrunde liegende Karte (Arena, UIDs, Index).
    fn map_mut(&mut self) -> &mut Map;

    /// Besitzer, den neue Entitäten bekommen.
    fn owner(&self) -> Owner;

    /// Erzeugt einen unverbundenen Node.
    fn add_node(&mut self, position: Vec3, is_red: bool) -> TopologyResult<NodeId> {
        let owner = self.owner();
        self.map_mut().create_node(position, is_red, owner)
    }

    /// Hängt ein Item ein, dessen Nodes bereits existieren.
    fn add_item(&mut self, item: Item) -> TopologyResult<ItemId> {
        let owner = self.owner();
        self.map_mut().attach_item(item, owner)
    }
}

impl ItemContainer for Map {
    fn map_mut(&mut self) -> &mut Map {
        self
    }

    fn owner(&self) -> Owner {
        Owner::Root
    }
}

/// Fügt Entitäten als Kinder eines bestehenden Compounds ein.
pub struct CompoundScope<'a> {
    map: &'a mut Map,
    compound: ItemId,
}

impl<'a> CompoundScope<'a> {
    pub fn new(map: &'a mut Map, compound: ItemId) -> TopologyResult<Self> {
        let item = map.item_entry(compound)?;
        if item.kind() != ItemKind::Compound {
            return Err(TopologyError::WrongShape {
                uid: item.uid,
                expected: ItemKind::Compound.name(),
            });
        }
        Ok(Self { map, compound })
    }

    pub fn compound(&self) -> ItemId {
        self.compound
    }
}

impl ItemContainer for CompoundScope<'_> {
    fn map_mut(&mut self) -> &mut Map {
        self.map
    }

    fn owner(&self) -> Owner {
        Owner::Compound(self.compound)
    }
}
