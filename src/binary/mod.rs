//! Binärformat der Sektor-Dateien: Leser/Schreiber, Datensätze, Dateien,
//! Auflösung sowie Laden und Speichern ganzer Karten.

pub mod codec;
pub mod error;
pub mod loader;
pub mod reader;
pub mod resolve;
pub mod saver;
pub mod sector_file;
pub mod writer;

pub use codec::{ParsedItem, Payload};
pub use error::{FormatError, FormatResult};
pub use loader::{load_map, LoadReport};
pub use reader::BinaryReader;
pub use resolve::{resolve_references, ResolveOutcome};
pub use saver::{save_map, SaveReport};
pub use sector_file::{parse_sector_bytes, ItemFile, SectorFileContent};
pub use writer::BinaryWriter;

/// Formatversion, die beim Speichern geschrieben wird.
pub const FORMAT_VERSION: u32 = 904;
/// Älteste noch lesbare Formatversion.
pub const MIN_SUPPORTED_VERSION: u32 = 900;

#[cfg(test)]
mod tests;
