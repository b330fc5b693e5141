//! Core-Domänentypen: Nodes, Items, Sektoren, Spatial-Index und die
//! Topologie-Engine.

pub mod arena;
pub mod container;
pub mod error;
pub mod items;
/// Karten-Graph
///
/// Dieses Modul definiert die Haupt-Datenstruktur:
/// - Map: Arena für Nodes und Items, UID-Tabellen, Sektoren, Spatial-Index
/// - Node: geteilter Punkt mit Rotation und zwei Item-Slots
/// - Item: Karten-Element mit typspezifischer Form
pub mod map;
pub mod node;
pub mod propagation;
pub mod reference;
pub mod sector;
pub mod spatial;
pub mod topology;

pub use arena::{Arena, Handle};
pub use container::{CompoundScope, ItemContainer};
pub use error::{Direction, TopologyError, TopologyResult};
pub use items::{Item, ItemData, ItemKind};
pub use map::{Map, ValidationIssue};
pub use node::{FixedVec3, Node, Owner, MAX_COORDINATE, POSITION_SCALE};
pub use reference::Reference;
pub use sector::{
    ItemFileRole, Sector, SectorBounds, SectorCoord, SectorDescriptor, SectorFileKind,
    DEFAULT_SECTOR_SIZE,
};
pub use spatial::{SpatialIndex, SpatialMatch};

/// Handle auf einen Node in der Map-Arena.
pub type NodeId = Handle<Node>;
/// Handle auf ein Item in der Map-Arena.
pub type ItemId = Handle<Item>;
