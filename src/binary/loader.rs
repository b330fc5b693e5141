//! Lädt ein Karten-Verzeichnis: Parse-Phase pro Sektor (parallel),
//! danach Registrierung und Auflösung in einem einzigen Durchlauf.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;

use super::codec::Payload;
use super::error::FormatError;
use super::resolve::resolve_references;
use super::sector_file::{read_data_file, read_desc_file, read_item_file, ItemFile};
use crate::core::items::ItemKind;
use crate::core::{
    ItemData, ItemId, Map, NodeId, Owner, SectorCoord, SectorDescriptor, SectorFileKind,
};
use crate::shared::EngineOptions;

/// Zusammenfassung eines Ladevorgangs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub sectors: usize,
    pub nodes: usize,
    pub items: usize,
    /// Übersprungene Sektoren (nur mit `skip_broken_sectors`)
    pub skipped_sectors: Vec<SectorCoord>,
    /// Doppelte Node-/Item-Datensätze, von denen der erste gewonnen hat
    pub duplicates: usize,
    pub dropped_references: usize,
    pub removed_items: usize,
    pub removed_orphans: usize,
}

/// Gefundene Dateien eines Sektors.
#[derive(Debug, Default)]
struct SectorFiles {
    base: Option<PathBuf>,
    aux: Option<PathBuf>,
    data: Option<PathBuf>,
    desc: Option<PathBuf>,
}

/// Ergebnis der Parse-Phase eines Sektors, noch ohne Kartenbezug.
#[derive(Debug)]
struct ParsedSector {
    coord: SectorCoord,
    item_files: Vec<ItemFile>,
    payloads: Vec<(u64, Payload)>,
    descriptor: Option<SectorDescriptor>,
}

/// Lädt alle Sektoren aus `dir`.
pub fn load_map(dir: &Path, options: &EngineOptions) -> Result<(Map, LoadReport)> {
    let sectors = discover_sectors(dir)?;
    log::debug!("{} Sektoren in {} gefunden", sectors.len(), dir.display());

    let parse = |(coord, files): (SectorCoord, SectorFiles)| (coord, parse_sector(coord, &files));
    let results: Vec<_> = if options.parallel_load {
        sectors.into_par_iter().map(parse).collect()
    } else {
        sectors.into_iter().map(parse).collect()
    };

    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut map = Map::with_options(name, options);
    let mut report = LoadReport::default();
    let mut root_items = Vec::new();
    let mut game_id_taken = false;

    for (coord, result) in results {
        let parsed = match result {
            Ok(parsed) => parsed,
            Err(err) if options.skip_broken_sectors => {
                log::warn!("Sektor {coord} wird uebersprungen: {err:#}");
                report.skipped_sectors.push(coord);
                continue;
            }
            Err(err) => return Err(err),
        };
        if !game_id_taken {
            if let Some(file) = parsed.item_files.first() {
                map.game_id = file.game_id;
                game_id_taken = true;
            }
        }
        register_sector(&mut map, parsed, &mut root_items, &mut report);
    }

    let outcome = resolve_references(&mut map, options.strict_references)
        .with_context(|| format!("Referenzen in {} nicht aufloesbar", dir.display()))?;
    report.dropped_references = outcome.dropped_references;
    report.removed_items = outcome.removed_items.len();

    for id in root_items {
        map.place_item(id);
    }
    for id in map.node_handles() {
        map.refresh_node_sectors(id);
    }
    report.removed_orphans = remove_orphans(&mut map);

    report.sectors = map.sectors().count();
    report.nodes = map.node_count();
    report.items = map.item_count();
    log::info!(
        "Karte geladen: {} Sektoren, {} Nodes, {} Items ({} uebersprungen, {} Duplikate)",
        report.sectors,
        report.nodes,
        report.items,
        report.skipped_sectors.len(),
        report.duplicates
    );
    Ok((map, report))
}

/// Sammelt die Sektor-Dateien anhand ihrer Namen.
fn discover_sectors(dir: &Path) -> Result<BTreeMap<SectorCoord, SectorFiles>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Kartenverzeichnis nicht lesbar: {}", dir.display()))?;
    let mut sectors: BTreeMap<SectorCoord, SectorFiles> = BTreeMap::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Fehler beim Lesen von {}", dir.display()))?;
        let path = entry.path();
        let Some((coord, kind)) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(SectorCoord::parse_file_name)
        else {
            continue;
        };
        let files = sectors.entry(coord).or_default();
        let slot = match kind {
            SectorFileKind::Base => &mut files.base,
            SectorFileKind::Aux => &mut files.aux,
            SectorFileKind::Data => &mut files.data,
            SectorFileKind::Desc => &mut files.desc,
        };
        *slot = Some(path);
    }
    Ok(sectors)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Datei nicht lesbar: {}", path.display()))
}

/// Parse-Phase eines Sektors; berührt keinen geteilten Zustand.
fn parse_sector(coord: SectorCoord, files: &SectorFiles) -> Result<ParsedSector> {
    let mut item_files = Vec::new();
    for path in [&files.base, &files.aux].into_iter().flatten() {
        let file = read_item_file(&read_file(path)?)
            .with_context(|| format!("Fehler beim Parsen von {}", path.display()))?;
        if file.coord != coord {
            return Err(FormatError::SectorMismatch {
                expected: coord,
                found: file.coord,
            })
            .with_context(|| format!("Falscher Sektor in {}", path.display()));
        }
        item_files.push(file);
    }

    let payloads = match &files.data {
        Some(path) => {
            let kinds: HashMap<u64, ItemKind> = item_files
                .iter()
                .flat_map(|file| &file.items)
                .flat_map(|parsed| std::iter::once(&parsed.item).chain(&parsed.children))
                .map(|item| (item.uid, item.kind()))
                .collect();
            read_data_file(&read_file(path)?, |uid| kinds.get(&uid).copied())
                .with_context(|| format!("Fehler beim Parsen von {}", path.display()))?
        }
        None => Vec::new(),
    };

    let descriptor = match &files.desc {
        Some(path) => Some(
            read_desc_file(&read_file(path)?)
                .with_context(|| format!("Fehler beim Parsen von {}", path.display()))?,
        ),
        None => None,
    };

    log::debug!(
        "Sektor {coord} geparst: {} Item-Dateien, {} Zusatzdaten",
        item_files.len(),
        payloads.len()
    );
    Ok(ParsedSector {
        coord,
        item_files,
        payloads,
        descriptor,
    })
}

/// Übernimmt einen geparsten Sektor in die Karte. Bei doppelten UIDs
/// gewinnt der zuerst registrierte Datensatz.
fn register_sector(
    map: &mut Map,
    parsed: ParsedSector,
    root_items: &mut Vec<ItemId>,
    report: &mut LoadReport,
) {
    let sector = map.ensure_sector(parsed.coord);
    if let Some(descriptor) = parsed.descriptor {
        sector.descriptor = descriptor;
    }

    for file in parsed.item_files {
        for node in file.nodes {
            if map.node_by_uid(node.uid).is_some() {
                log::warn!("Node {:#x} mehrfach vorhanden, Duplikat verworfen", node.uid);
                report.duplicates += 1;
                continue;
            }
            map.insert_node(node);
        }

        for parsed_item in file.items {
            if map.item_by_uid(parsed_item.item.uid).is_some() {
                log::warn!(
                    "Item {:#x} mehrfach vorhanden, Duplikat verworfen",
                    parsed_item.item.uid
                );
                report.duplicates += 1;
                continue;
            }
            let id = map.insert_item(parsed_item.item);
            root_items.push(id);

            for mut child in parsed_item.children {
                if map.item_by_uid(child.uid).is_some() {
                    log::warn!("Compound-Kind {:#x} mehrfach vorhanden", child.uid);
                    report.duplicates += 1;
                    continue;
                }
                child.owner = Owner::Compound(id);
                map.insert_item(child);
            }
            for mut node in parsed_item.child_nodes {
                if map.node_by_uid(node.uid).is_some() {
                    log::warn!("Compound-Node {:#x} mehrfach vorhanden", node.uid);
                    report.duplicates += 1;
                    continue;
                }
                node.owner = Owner::Compound(id);
                map.insert_node(node);
            }
        }
    }

    for (uid, payload) in parsed.payloads {
        let applied = map
            .item_by_uid(uid)
            .and_then(|id| map.item_mut(id))
            .is_some_and(|item| payload.apply(&mut item.data));
        if !applied {
            log::warn!("Zusatzdaten fuer Item {uid:#x} passen zu keinem Item");
        }
    }
}

/// Entfernt Nodes, auf die weder ein Slot noch eine Item-Form verweist.
///
/// Ein Node mit leeren Slots, der noch in einer Form steht, bleibt erhalten;
/// `Map::validate` meldet ihn als fehlende Rückreferenz.
fn remove_orphans(map: &mut Map) -> usize {
    let in_shapes: HashSet<NodeId> = map
        .items()
        .flat_map(|(_, item)| item.shape().node_refs())
        .filter_map(|r| r.resolved())
        .collect();
    let orphans: Vec<NodeId> = map
        .nodes()
        .filter(|(id, node)| node.is_orphaned() && !in_shapes.contains(id))
        .map(|(id, _)| id)
        .collect();
    if orphans.is_empty() {
        return 0;
    }
    for id in &orphans {
        if let Some(node) = map.remove_node(*id) {
            log::debug!("Verwaister Node {:#x} entfernt", node.uid);
        }
    }
    let removed: HashSet<NodeId> = orphans.iter().copied().collect();
    for id in map.item_handles() {
        if let Some(ItemData::Compound(compound)) = map.item_mut(id).map(|item| &mut item.data) {
            compound
                .nodes
                .retain(|r| r.resolved().is_some_and(|node| !removed.contains(&node)));
        }
    }
    orphans.len()
}
