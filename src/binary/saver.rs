//! Schreibt eine Karte als Sektor-Dateien.
//!
//! Die Puffer entstehen parallel pro Sektor aus einer unveränderten Karte,
//! geschrieben wird danach sequenziell.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rayon::prelude::*;

use super::sector_file::{write_data_file, write_desc_file, write_item_file};
use super::FORMAT_VERSION;
use crate::core::items::Item;
use crate::core::{
    ItemData, ItemFileRole, Map, Node, Owner, SectorBounds, SectorCoord, SectorDescriptor,
    SectorFileKind, POSITION_SCALE,
};

/// Zusammenfassung eines Speichervorgangs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveReport {
    pub sectors: usize,
    pub files_written: usize,
    pub files_removed: usize,
}

/// Inhalt eines Sektors für den Schreibvorgang.
#[derive(Debug, Default)]
struct SectorPlan<'a> {
    base_items: Vec<&'a Item>,
    aux_items: Vec<&'a Item>,
    base_nodes: Vec<&'a Node>,
    aux_nodes: Vec<&'a Node>,
}

/// Speichert alle Sektoren nach `dir`; nicht mehr belegte Sektor-Dateien
/// werden entfernt.
pub fn save_map(map: &Map, dir: &Path) -> Result<SaveReport> {
    let plans = plan_sectors(map);

    let buffers = plans
        .par_iter()
        .map(|(coord, plan)| build_sector(map, *coord, plan))
        .collect::<Result<Vec<_>>>()?;

    fs::create_dir_all(dir)
        .with_context(|| format!("Zielverzeichnis nicht anlegbar: {}", dir.display()))?;

    let mut report = SaveReport {
        sectors: plans.len(),
        ..SaveReport::default()
    };
    let mut written = HashSet::new();
    for (coord, files) in buffers {
        for (kind, bytes) in files {
            let name = kind.file_name(coord);
            let path = dir.join(&name);
            fs::write(&path, bytes)
                .with_context(|| format!("Datei nicht schreibbar: {}", path.display()))?;
            written.insert(name);
            report.files_written += 1;
        }
    }

    report.files_removed = remove_stale_files(dir, &written)?;
    log::info!(
        "Karte gespeichert: {} Sektoren, {} Dateien ({} veraltete entfernt)",
        report.sectors,
        report.files_written,
        report.files_removed
    );
    Ok(report)
}

/// Verteilt Root-Items und Root-Nodes auf Sektoren und Dateirollen.
///
/// Die Rolle eines Items wird beim Speichern neu bestimmt; ein Node landet
/// in der Aux-Datei, wenn alle seine Items Aux-Items sind.
fn plan_sectors(map: &Map) -> BTreeMap<SectorCoord, SectorPlan<'_>> {
    let mut plans: BTreeMap<SectorCoord, SectorPlan<'_>> = map
        .sectors()
        .map(|sector| (sector.coord, SectorPlan::default()))
        .collect();

    for sector in map.sectors() {
        for id in sector.items() {
            let Some(item) = map.item(id) else {
                continue;
            };
            let plan = plans.entry(sector.coord).or_default();
            match item.file_role() {
                ItemFileRole::Base => plan.base_items.push(item),
                ItemFileRole::Aux => plan.aux_items.push(item),
            }
        }
    }

    for (_, node) in map.nodes() {
        if node.owner() != Owner::Root {
            continue;
        }
        let coord = map.sector_of(node.position());
        let mut roles = node
            .items()
            .filter_map(|id| map.item(id))
            .map(Item::file_role)
            .peekable();
        let aux = roles.peek().is_some() && roles.all(|role| role == ItemFileRole::Aux);
        let plan = plans.entry(coord).or_default();
        if aux {
            plan.aux_nodes.push(node);
        } else {
            plan.base_nodes.push(node);
        }
    }
    plans
}

type SectorBuffers = (SectorCoord, Vec<(SectorFileKind, Vec<u8>)>);

/// Serialisiert einen Sektor in seine (bis zu vier) Dateien.
fn build_sector(map: &Map, coord: SectorCoord, plan: &SectorPlan<'_>) -> Result<SectorBuffers> {
    let context = || format!("Sektor {coord} nicht serialisierbar");
    let mut files = Vec::with_capacity(4);

    files.push((
        SectorFileKind::Base,
        write_item_file(map, coord, &plan.base_items, &plan.base_nodes).with_context(context)?,
    ));
    if !plan.aux_items.is_empty() || !plan.aux_nodes.is_empty() {
        files.push((
            SectorFileKind::Aux,
            write_item_file(map, coord, &plan.aux_items, &plan.aux_nodes).with_context(context)?,
        ));
    }

    let payload_items: Vec<&Item> = plan
        .base_items
        .iter()
        .flat_map(|item| std::iter::once(*item).chain(compound_children(map, item)))
        .collect();
    if let Some(bytes) = write_data_file(&payload_items).with_context(context)? {
        files.push((SectorFileKind::Data, bytes));
    }

    let mut descriptor = map
        .sector(coord)
        .map(|sector| sector.descriptor.clone())
        .unwrap_or_else(|| SectorDescriptor::new(FORMAT_VERSION));
    descriptor.version = FORMAT_VERSION;
    descriptor.bounds = sector_bounds(map, coord, plan);
    files.push((SectorFileKind::Desc, write_desc_file(&descriptor)));

    log::debug!(
        "Sektor {coord}: {} Base-Items, {} Aux-Items, {} Nodes",
        plan.base_items.len(),
        plan.aux_items.len(),
        plan.base_nodes.len() + plan.aux_nodes.len()
    );
    Ok((coord, files))
}

fn compound_children<'a>(map: &'a Map, item: &'a Item) -> Vec<&'a Item> {
    match &item.data {
        ItemData::Compound(compound) => compound
            .items
            .iter()
            .filter_map(|r| r.resolved())
            .filter_map(|id| map.item(id))
            .collect(),
        _ => Vec::new(),
    }
}

/// Sektor-Rechteck, erweitert um alle Nodes der Items im Sektor.
fn sector_bounds(map: &Map, coord: SectorCoord, plan: &SectorPlan<'_>) -> SectorBounds {
    let size = map.sector_size() as f64 * POSITION_SCALE as f64;
    let clamp = |v: f64| v.clamp(i32::MIN as f64, i32::MAX as f64) as i32;
    let mut bounds = SectorBounds {
        min_x: clamp(coord.x as f64 * size),
        min_z: clamp(coord.z as f64 * size),
        max_x: clamp((coord.x as f64 + 1.0) * size),
        max_z: clamp((coord.z as f64 + 1.0) * size),
    };

    let mut nodes = BTreeSet::new();
    for item in plan.base_items.iter().chain(&plan.aux_items) {
        nodes.extend(item.shape().node_refs().iter().filter_map(|r| r.resolved()));
        if let ItemData::Compound(compound) = &item.data {
            nodes.extend(compound.nodes.iter().filter_map(|r| r.resolved()));
        }
    }
    for node in nodes.into_iter().filter_map(|id| map.node(id)) {
        let position = node.fixed_position();
        bounds.min_x = bounds.min_x.min(position.x);
        bounds.min_z = bounds.min_z.min(position.z);
        bounds.max_x = bounds.max_x.max(position.x);
        bounds.max_z = bounds.max_z.max(position.z);
    }
    bounds
}

/// Löscht Sektor-Dateien, die beim aktuellen Speichern nicht entstanden sind.
fn remove_stale_files(dir: &Path, written: &HashSet<String>) -> Result<usize> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Zielverzeichnis nicht lesbar: {}", dir.display()))?;
    let mut removed = 0;
    for entry in entries {
        let entry = entry.with_context(|| format!("Fehler beim Lesen von {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if SectorCoord::parse_file_name(&name).is_none() || written.contains(&name) {
            continue;
        }
        let path = entry.path();
        fs::remove_file(&path)
            .with_context(|| format!("Veraltete Datei nicht loeschbar: {}", path.display()))?;
        log::debug!("Veraltete Sektor-Datei entfernt: {name}");
        removed += 1;
    }
    Ok(removed)
}
