//! TS-Map-Engine Library.
//! Lesen, Bearbeiten und Schreiben von Sektor-Karten im TS-Binärformat.

pub mod binary;
pub mod core;
pub mod shared;

pub use binary::{load_map, save_map, FormatError, LoadReport, SaveReport};
pub use core::{
    Direction, Item, ItemData, ItemId, ItemKind, Map, Node, NodeId, Reference, SectorCoord,
    SpatialIndex, SpatialMatch, TopologyError, ValidationIssue,
};
pub use shared::EngineOptions;
