//! Die vier Dateien eines Sektors: Base/Aux (Items + Nodes), Data
//! (Zusatzdaten) und Desc (Deskriptor).

use ts_map_primitives::Token;

use super::codec::{
    read_item, read_node, read_payload, write_item, write_node, write_payload, ParsedItem,
    Payload, MIN_ITEM_RECORD, NODE_RECORD,
};
use super::error::{FormatError, FormatResult};
use super::reader::BinaryReader;
use super::writer::BinaryWriter;
use super::{FORMAT_VERSION, MIN_SUPPORTED_VERSION};
use crate::core::items::{Item, ItemKind};
use crate::core::{Map, Node, SectorBounds, SectorCoord, SectorDescriptor, SectorFileKind};

/// Ende der Zusatzdaten-Datei.
const DATA_SENTINEL: u64 = u64::MAX;

/// Inhalt einer Base- oder Aux-Datei.
#[derive(Debug, Clone)]
pub struct ItemFile {
    pub version: u32,
    pub game_id: Token,
    pub coord: SectorCoord,
    pub items: Vec<ParsedItem>,
    pub nodes: Vec<Node>,
}

/// Ergebnis von [`parse_sector_bytes`].
#[derive(Debug, Clone)]
pub enum SectorFileContent {
    Items(ItemFile),
    Data(Vec<(u64, Payload)>),
    Desc(SectorDescriptor),
}

fn read_version(reader: &mut BinaryReader<'_>) -> FormatResult<u32> {
    let version = reader.read_u32()?;
    if !(MIN_SUPPORTED_VERSION..=FORMAT_VERSION).contains(&version) {
        return Err(FormatError::UnsupportedVersion {
            found: version,
            min: MIN_SUPPORTED_VERSION,
            max: FORMAT_VERSION,
        });
    }
    Ok(version)
}

// ── Base / Aux ─────────────────────────────────────────────────────

pub fn read_item_file(bytes: &[u8]) -> FormatResult<ItemFile> {
    let mut reader = BinaryReader::new(bytes);
    let version = read_version(&mut reader)?;
    let game_id = reader.read_token()?;
    let coord = SectorCoord::new(reader.read_i32()?, reader.read_i32()?);

    let item_count = reader.read_count(MIN_ITEM_RECORD)?;
    let mut items = Vec::with_capacity(item_count);
    for _ in 0..item_count {
        items.push(read_item(&mut reader)?);
    }
    let node_count = reader.read_count(NODE_RECORD)?;
    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        nodes.push(read_node(&mut reader)?);
    }
    reader.expect_end()?;

    Ok(ItemFile {
        version,
        game_id,
        coord,
        items,
        nodes,
    })
}

/// Serialisiert Items und Nodes eines Sektors in eine Item-Datei.
pub fn write_item_file(
    map: &Map,
    coord: SectorCoord,
    items: &[&Item],
    nodes: &[&Node],
) -> FormatResult<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    writer.write_u32(FORMAT_VERSION);
    writer.write_token(map.game_id);
    writer.write_i32(coord.x);
    writer.write_i32(coord.z);
    writer.write_count("item count", items.len())?;
    for item in items {
        write_item(&mut writer, map, item)?;
    }
    writer.write_count("node count", nodes.len())?;
    for node in nodes {
        write_node(&mut writer, map, node)?;
    }
    Ok(writer.into_inner())
}

// ── Data ───────────────────────────────────────────────────────────

/// Liest die Zusatzdaten; `kind_of` liefert den Typ zur Item-UID, weil
/// der Aufbau jedes Eintrags vom Typ abhängt.
pub fn read_data_file(
    bytes: &[u8],
    kind_of: impl Fn(u64) -> Option<ItemKind>,
) -> FormatResult<Vec<(u64, Payload)>> {
    let mut reader = BinaryReader::new(bytes);
    read_version(&mut reader)?;
    let mut entries = Vec::new();
    loop {
        if reader.remaining() < 8 {
            return Err(FormatError::MissingSentinel);
        }
        let uid = reader.read_u64()?;
        if uid == DATA_SENTINEL {
            break;
        }
        let kind = kind_of(uid).ok_or(FormatError::UnresolvedReference {
            kind: "data item",
            uid,
        })?;
        entries.push((uid, read_payload(&mut reader, kind)?));
    }
    reader.expect_end()?;
    Ok(entries)
}

/// Schreibt die Zusatzdaten aller Items mit Payload; `None`, wenn keines
/// welche hat.
pub fn write_data_file(items: &[&Item]) -> FormatResult<Option<Vec<u8>>> {
    let mut writer = BinaryWriter::new();
    writer.write_u32(FORMAT_VERSION);
    let mut written = 0usize;
    for item in items.iter().filter(|item| item.kind().has_payload()) {
        writer.write_u64(item.uid);
        if write_payload(&mut writer, &item.data)? {
            written += 1;
        }
    }
    if written == 0 {
        return Ok(None);
    }
    writer.write_u64(DATA_SENTINEL);
    Ok(Some(writer.into_inner()))
}

// ── Desc ───────────────────────────────────────────────────────────

pub fn read_desc_file(bytes: &[u8]) -> FormatResult<SectorDescriptor> {
    let mut reader = BinaryReader::new(bytes);
    let version = read_version(&mut reader)?;
    let bounds = SectorBounds {
        min_x: reader.read_i32()?,
        min_z: reader.read_i32()?,
        max_x: reader.read_i32()?,
        max_z: reader.read_i32()?,
    };
    let flags = reader.read_flags()?;
    let climate = reader.read_token()?;
    reader.expect_end()?;
    Ok(SectorDescriptor {
        version,
        bounds,
        flags,
        climate,
    })
}

pub fn write_desc_file(descriptor: &SectorDescriptor) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    writer.write_u32(FORMAT_VERSION);
    writer.write_i32(descriptor.bounds.min_x);
    writer.write_i32(descriptor.bounds.min_z);
    writer.write_i32(descriptor.bounds.max_x);
    writer.write_i32(descriptor.bounds.max_z);
    writer.write_flags(descriptor.flags);
    writer.write_token(descriptor.climate);
    writer.into_inner()
}

/// Parst eine einzelne Sektor-Datei ohne Kartenkontext.
///
/// Zusatzdaten werden dabei als Straßen-Payload interpretiert.
pub fn parse_sector_bytes(kind: SectorFileKind, bytes: &[u8]) -> FormatResult<SectorFileContent> {
    match kind {
        SectorFileKind::Base | SectorFileKind::Aux => {
            read_item_file(bytes).map(SectorFileContent::Items)
        }
        SectorFileKind::Data => {
            read_data_file(bytes, |_| Some(ItemKind::Road)).map(SectorFileContent::Data)
        }
        SectorFileKind::Desc => read_desc_file(bytes).map(SectorFileContent::Desc),
    }
}
