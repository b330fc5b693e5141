//! Karten-Items: gemeinsamer Header, Typ-Tabelle und typspezifische Daten.

pub mod compound;
pub mod map_area;
pub mod model;
pub mod mover;
pub mod prefab;
pub mod road;
pub mod shape;
pub mod slave;
pub mod trigger;

pub use compound::Compound;
pub use map_area::{MapArea, MapAreaColor};
pub use model::Model;
pub use mover::Mover;
pub use prefab::{Prefab, PrefabCorner, PrefabLayout, PrefabNodeLayout};
pub use road::{Road, RoadTransition, StepSize, TerrainQuadData};
pub use shape::{
    PathShape, PolygonShape, PolylineShape, PrefabShape, Shape, ShapeKind, ShapeMut,
    SingleNodeShape, SlaveShape,
};
pub use slave::{Company, Service, ServiceType};
pub use trigger::{Trigger, TriggerAction};

use ts_map_primitives::FlagField;

use super::error::{check_range, TopologyResult};
use super::{ItemFileRole, ItemId, NodeId, Owner, Reference, SectorCoord};

/// Standard-Sichtweite neuer Items in Metern.
pub const DEFAULT_VIEW_DISTANCE: u16 = 400;
/// Grösste speicherbare Sichtweite (u8 × 10).
pub const MAX_VIEW_DISTANCE: u16 = 2550;

/// Item-Typen mit ihrem Typ-Tag im Binärformat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    Road,
    Prefab,
    Model,
    Company,
    Service,
    Mover,
    Trigger,
    Compound,
    MapArea,
}

impl ItemKind {
    pub const ALL: [ItemKind; 9] = [
        ItemKind::Road,
        ItemKind::Prefab,
        ItemKind::Model,
        ItemKind::Company,
        ItemKind::Service,
        ItemKind::Mover,
        ItemKind::Trigger,
        ItemKind::Compound,
        ItemKind::MapArea,
    ];

    /// Typ-Tag im Item-Header.
    pub fn tag(self) -> u32 {
        match self {
            ItemKind::Road => 3,
            ItemKind::Prefab => 4,
            ItemKind::Model => 5,
            ItemKind::Company => 6,
            ItemKind::Service => 7,
            ItemKind::Mover => 9,
            ItemKind::Trigger => 34,
            ItemKind::Compound => 40,
            ItemKind::MapArea => 42,
        }
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn shape_kind(self) -> ShapeKind {
        match self {
            ItemKind::Road => ShapeKind::Polyline,
            ItemKind::Prefab => ShapeKind::Prefab,
            ItemKind::Model | ItemKind::Compound => ShapeKind::SingleNode,
            ItemKind::Company | ItemKind::Service => ShapeKind::Slave,
            ItemKind::Mover => ShapeKind::Path,
            ItemKind::Trigger | ItemKind::MapArea => ShapeKind::Polygon,
        }
    }

    /// Typen mit Zusatzdaten in der `.data`-Datei.
    pub fn has_payload(self) -> bool {
        matches!(self, ItemKind::Road)
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemKind::Road => "road",
            ItemKind::Prefab => "prefab",
            ItemKind::Model => "model",
            ItemKind::Company => "company",
            ItemKind::Service => "service",
            ItemKind::Mover => "mover",
            ItemKind::Trigger => "trigger",
            ItemKind::Compound => "compound",
            ItemKind::MapArea => "map area",
        }
    }
}

/// Achsenparallele Box aus dem Item-Header, wird unverändert durchgereicht.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

/// Typspezifischer Teil eines Items.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemData {
    Road(Road),
    Prefab(Prefab),
    Model(Model),
    Company(Company),
    Service(Service),
    Mover(Mover),
    Trigger(Trigger),
    Compound(Compound),
    MapArea(MapArea),
}

impl ItemData {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemData::Road(_) => ItemKind::Road,
            ItemData::Prefab(_) => ItemKind::Prefab,
            ItemData::Model(_) => ItemKind::Model,
            ItemData::Company(_) => ItemKind::Company,
            ItemData::Service(_) => ItemKind::Service,
            ItemData::Mover(_) => ItemKind::Mover,
            ItemData::Trigger(_) => ItemKind::Trigger,
            ItemData::Compound(_) => ItemKind::Compound,
            ItemData::MapArea(_) => ItemKind::MapArea,
        }
    }

    pub fn shape(&self) -> Shape<'_> {
        match self {
            ItemData::Road(v) => Shape::Polyline(&v.shape),
            ItemData::Prefab(v) => Shape::Prefab(&v.shape),
            ItemData::Model(v) => Shape::SingleNode(&v.shape),
            ItemData::Company(v) => Shape::Slave(&v.shape),
            ItemData::Service(v) => Shape::Slave(&v.shape),
            ItemData::Mover(v) => Shape::Path(&v.shape),
            ItemData::Trigger(v) => Shape::Polygon(&v.shape),
            ItemData::Compound(v) => Shape::SingleNode(&v.shape),
            ItemData::MapArea(v) => Shape::Polygon(&v.shape),
        }
    }

    pub fn shape_mut(&mut self) -> ShapeMut<'_> {
        match self {
            ItemData::Road(v) => ShapeMut::Polyline(&mut v.shape),
            ItemData::Prefab(v) => ShapeMut::Prefab(&mut v.shape),
            ItemData::Model(v) => ShapeMut::SingleNode(&mut v.shape),
            ItemData::Company(v) => ShapeMut::Slave(&mut v.shape),
            ItemData::Service(v) => ShapeMut::Slave(&mut v.shape),
            ItemData::Mover(v) => ShapeMut::Path(&mut v.shape),
            ItemData::Trigger(v) => ShapeMut::Polygon(&mut v.shape),
            ItemData::Compound(v) => ShapeMut::SingleNode(&mut v.shape),
            ItemData::MapArea(v) => ShapeMut::Polygon(&mut v.shape),
        }
    }

    /// Flagfeld des Item-Headers.
    pub fn flags(&self) -> FlagField {
        match self {
            ItemData::Road(v) => v.flags,
            ItemData::Prefab(v) => v.flags,
            ItemData::Model(v) => v.flags,
            ItemData::Company(v) => v.flags,
            ItemData::Service(v) => v.flags,
            ItemData::Mover(v) => v.flags,
            ItemData::Trigger(v) => v.flags,
            ItemData::Compound(v) => v.flags,
            ItemData::MapArea(v) => v.flags,
        }
    }

    pub fn flags_mut(&mut self) -> &mut FlagField {
        match self {
            ItemData::Road(v) => &mut v.flags,
            ItemData::Prefab(v) => &mut v.flags,
            ItemData::Model(v) => &mut v.flags,
            ItemData::Company(v) => &mut v.flags,
            ItemData::Service(v) => &mut v.flags,
            ItemData::Mover(v) => &mut v.flags,
            ItemData::Trigger(v) => &mut v.flags,
            ItemData::Compound(v) => &mut v.flags,
            ItemData::MapArea(v) => &mut v.flags,
        }
    }

    /// Ruft `f` für jede Item-Referenz auf (Slaves, Master-Prefab, Compound-Kinder).
    pub fn for_each_item_ref(&mut self, mut f: impl FnMut(&mut Reference<ItemId>)) {
        match self {
            ItemData::Prefab(v) => v.shape.slaves.iter_mut().for_each(f),
            ItemData::Company(v) => f(&mut v.shape.prefab),
            ItemData::Service(v) => f(&mut v.shape.prefab),
            ItemData::Compound(v) => v.items.iter_mut().for_each(f),
            _ => {}
        }
    }
}

/// Ein Karten-Item.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Eindeutige Kennung (nie 0)
    pub uid: u64,
    pub bounding_box: BoundingBox,
    pub(crate) view_distance: u16,
    pub data: ItemData,
    pub(crate) owner: Owner,
    pub(crate) sector: Option<SectorCoord>,
}

impl Item {
    pub fn new(uid: u64, data: ItemData) -> Self {
        Self {
            uid,
            bounding_box: BoundingBox::default(),
            view_distance: DEFAULT_VIEW_DISTANCE,
            data,
            owner: Owner::Root,
            sector: None,
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.data.kind()
    }

    pub fn shape(&self) -> Shape<'_> {
        self.data.shape()
    }

    /// Sichtweite in Metern.
    pub fn view_distance(&self) -> u16 {
        self.view_distance
    }

    /// Setzt die Sichtweite; gespeichert wird in 10-m-Schritten bis 2550 m.
    pub fn set_view_distance(&mut self, meters: u16) -> TopologyResult<()> {
        check_range("view_distance", meters as f64, 0.0, MAX_VIEW_DISTANCE as f64)?;
        if meters % 10 != 0 {
            return Err(super::TopologyError::ValueOutOfRange {
                field: "view_distance (Vielfaches von 10)",
                value: meters as f64,
                min: 0.0,
                max: MAX_VIEW_DISTANCE as f64,
            });
        }
        self.view_distance = meters;
        Ok(())
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Sektor des Items; `None` für Compound-Kinder.
    pub fn sector(&self) -> Option<SectorCoord> {
        self.sector
    }

    /// Aufgelöste Nodes in Speicherreihenfolge.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.shape().node_refs().iter().map(|r| r.handle()).collect()
    }

    /// Aufgelöster Anker-Node.
    pub fn anchor_node(&self) -> Option<NodeId> {
        self.shape().anchor().map(|r| r.handle())
    }

    /// Base- oder Aux-Datei.
    pub fn file_role(&self) -> ItemFileRole {
        match &self.data {
            ItemData::Model(model) if model.is_detail() => ItemFileRole::Aux,
            _ => ItemFileRole::Base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_table_roundtrip() {
        for kind in ItemKind::ALL {
            assert_eq!(ItemKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ItemKind::from_tag(3), Some(ItemKind::Road));
        assert_eq!(ItemKind::from_tag(42), Some(ItemKind::MapArea));
        assert_eq!(ItemKind::from_tag(1), None);
    }

    #[test]
    fn test_shape_kinds() {
        assert_eq!(ItemKind::Road.shape_kind(), ShapeKind::Polyline);
        assert_eq!(ItemKind::Compound.shape_kind(), ShapeKind::SingleNode);
        assert_eq!(ItemKind::Service.shape_kind(), ShapeKind::Slave);
        assert!(ItemKind::Road.has_payload());
        assert!(!ItemKind::Prefab.has_payload());
    }
}
