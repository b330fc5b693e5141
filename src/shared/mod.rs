//! Geteilte Typen für layer-übergreifende Verträge.
//!
//! Enthält die Engine-Optionen, die Core, Binärformat und CLI gemeinsam nutzen.

pub mod options;

pub use options::EngineOptions;
pub use options::{DEFAULT_GAME_ID, PARALLEL_LOAD, STRICT_REFERENCES};
