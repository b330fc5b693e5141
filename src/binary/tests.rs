use std::fs;

use approx::assert_relative_eq;
use glam::Vec3;
use ts_map_primitives::Token;

use super::codec::{read_item, write_item, MIN_ITEM_RECORD};
use super::sector_file::{read_data_file, read_desc_file, read_item_file, write_item_file};
use super::*;
use crate::core::items::{
    BoundingBox, Company, Compound, ItemKind, MapArea, Model, Mover, Prefab, PrefabLayout,
    PrefabNodeLayout, Road, Service, ServiceType, Trigger, TriggerAction,
};
use crate::core::{
    CompoundScope, Item, ItemData, Map, Owner, Reference, SectorCoord, SectorFileKind,
    ValidationIssue,
};
use crate::shared::EngineOptions;

fn token(text: &str) -> Token {
    Token::new(text).unwrap()
}

fn two_way_layout() -> PrefabLayout {
    PrefabLayout {
        nodes: vec![
            PrefabNodeLayout {
                offset: Vec3::new(0.0, 0.0, 10.0),
                direction: Vec3::Z,
            },
            PrefabNodeLayout {
                offset: Vec3::new(0.0, 0.0, -10.0),
                direction: Vec3::NEG_Z,
            },
        ],
    }
}

/// Karte mit je einem Item pro Typ, verteilt auf zwei Sektoren.
fn sample_map() -> Map {
    let mut map = Map::new("sample");
    map.game_id = token("ets2");

    let road = Road::add(
        &mut map,
        Vec3::new(10.0, 0.0, 10.0),
        Vec3::new(10.0, 0.0, 40.0),
        token("road1"),
    )
    .unwrap();
    if let ItemData::Road(data) = &mut map.item_mut(road).unwrap().data {
        data.set_terrain_size(4.0).unwrap();
        data.left_terrain.materials.push(token("grass"));
        data.left_terrain.set_cell(0, 0, 1).unwrap();
        data.variant = token("broken");
        data.right_edge = token("curb");
    }

    let prefab = Prefab::add(
        &mut map,
        Vec3::new(100.0, 0.0, 100.0),
        0.0,
        &two_way_layout(),
        token("cross"),
    )
    .unwrap();
    Company::add(&mut map, prefab, Vec3::new(110.0, 0.0, 100.0), token("tree_et")).unwrap();
    Service::add(&mut map, prefab, Vec3::new(90.0, 0.0, 100.0), ServiceType::Garage).unwrap();
    {
        let item = map.item_mut(prefab).unwrap();
        item.bounding_box = BoundingBox {
            min: [90.0, -1.0, 90.0],
            max: [110.0, 4.5, 110.0],
        };
        item.set_view_distance(1200).unwrap();
        if let ItemData::Prefab(data) = &mut item.data {
            data.variant = token("night");
            data.set_tollgate(true);
            data.set_dlc_guard(3);
        }
    }

    let detail = Model::add(&mut map, Vec3::new(50.0, 0.0, 50.0), token("bush")).unwrap();
    if let ItemData::Model(model) = &mut map.item_mut(detail).unwrap().data {
        model.set_detail(true);
        model.set_scale(Vec3::new(1.5, 0.75, 2.0)).unwrap();
        model.look = token("autumn");
    }

    let mover = Mover::add(
        &mut map,
        &[
            Vec3::new(200.0, 0.0, 0.0),
            Vec3::new(210.0, 0.0, 0.0),
            Vec3::new(215.0, 0.0, 8.0),
        ],
        token("deer"),
    )
    .unwrap();
    if let ItemData::Mover(data) = &mut map.item_mut(mover).unwrap().data {
        data.set_speed(2.5).unwrap();
        data.set_width(3.0).unwrap();
        data.count = 4;
        data.tags.push(token("forest"));
    }

    let trigger = Trigger::add(
        &mut map,
        &[Vec3::new(300.0, 0.0, 0.0), Vec3::new(310.0, 0.0, 0.0)],
        true,
    )
    .unwrap();
    if let ItemData::Trigger(data) = &mut map.item_mut(trigger).unwrap().data {
        data.actions.push(TriggerAction {
            name: token("hud_parking"),
            parameters: vec![1.5, 2.0],
        });
        data.set_range(12.5).unwrap();
    }

    let area = MapArea::add(
        &mut map,
        &[
            Vec3::new(4100.0, 0.0, 0.0),
            Vec3::new(4110.0, 0.0, 0.0),
            Vec3::new(4110.0, 0.0, 10.0),
        ],
    )
    .unwrap();
    if let ItemData::MapArea(data) = &mut map.item_mut(area).unwrap().data {
        data.material = token("asphalt");
    }

    let compound = Compound::add(&mut map, Vec3::new(4200.0, 0.0, 20.0)).unwrap();
    let mut scope = CompoundScope::new(&mut map, compound).unwrap();
    Model::add(&mut scope, Vec3::new(4201.0, 0.0, 21.0), token("lamp")).unwrap();
    Road::add(
        &mut scope,
        Vec3::new(4205.0, 0.0, 20.0),
        Vec3::new(4205.0, 0.0, 40.0),
        token("path"),
    )
    .unwrap();

    map
}

fn strict_options() -> EngineOptions {
    EngineOptions {
        parallel_load: false,
        ..EngineOptions::default()
    }
}

#[test]
fn test_map_roundtrip_keeps_entities() {
    let map = sample_map();
    let dir = tempfile::tempdir().unwrap();

    let report = save_map(&map, dir.path()).unwrap();
    assert_eq!(report.sectors, 2);
    assert!(dir.path().join("sec+0000+0000.base").exists());
    assert!(dir.path().join("sec+0000+0000.aux").exists());
    assert!(dir.path().join("sec+0000+0000.data").exists());
    assert!(dir.path().join("sec+0001+0000.desc").exists());

    let (loaded, load_report) = load_map(dir.path(), &strict_options()).unwrap();
    assert!(load_report.skipped_sectors.is_empty());
    assert_eq!(load_report.duplicates, 0);
    assert_eq!(loaded.node_count(), map.node_count());
    assert_eq!(loaded.item_count(), map.item_count());
    assert_eq!(loaded.game_id, token("ets2"));
    assert!(loaded.validate().is_empty(), "{:?}", loaded.validate());

    for (_, original) in map.nodes() {
        let id = loaded.node_by_uid(original.uid).unwrap();
        let node = loaded.node(id).unwrap();
        assert_eq!(node.fixed_position(), original.fixed_position());
        assert_eq!(node.rotation, original.rotation);
        assert_eq!(node.flags, original.flags);
        assert_eq!(
            matches!(node.owner(), Owner::Root),
            matches!(original.owner(), Owner::Root)
        );
    }
    for (_, original) in map.items() {
        let id = loaded.item_by_uid(original.uid).unwrap();
        let item = loaded.item(id).unwrap();
        assert_eq!(item.kind(), original.kind());
        assert_eq!(item.sector(), original.sector());
        assert_eq!(item.file_role(), original.file_role());
    }
}

/// Kopie eines Items, in der jede Referenz als UID steht.
fn detached(map: &Map, item: &Item) -> Item {
    let mut copy = item.clone();
    copy.owner = Owner::Root;
    copy.data.shape_mut().for_each_node_ref(|r| {
        if let Some(node) = r.resolved().and_then(|id| map.node(id)) {
            *r = Reference::Unresolved(node.uid);
        }
    });
    copy.data.for_each_item_ref(|r| {
        if let Some(other) = r.resolved().and_then(|id| map.item(id)) {
            *r = Reference::Unresolved(other.uid);
        }
    });
    if let ItemData::Compound(compound) = &mut copy.data {
        for r in &mut compound.nodes {
            if let Some(node) = r.resolved().and_then(|id| map.node(id)) {
                *r = Reference::Unresolved(node.uid);
            }
        }
    }
    copy
}

#[test]
fn test_roundtrip_keeps_every_item_field() {
    let map = sample_map();
    let dir = tempfile::tempdir().unwrap();
    save_map(&map, dir.path()).unwrap();
    let (loaded, _) = load_map(dir.path(), &strict_options()).unwrap();

    let mut kinds: Vec<ItemKind> = map.items().map(|(_, item)| item.kind()).collect();
    kinds.sort_by_key(|kind| kind.tag());
    kinds.dedup();
    assert_eq!(kinds.len(), ItemKind::ALL.len(), "jeder Item-Typ ist vertreten");

    for (_, original) in map.items() {
        let id = loaded.item_by_uid(original.uid).unwrap();
        let item = loaded.item(id).unwrap();
        assert_eq!(item.bounding_box, original.bounding_box, "{:?}", item.kind());
        assert_eq!(item.view_distance(), original.view_distance());
        assert_eq!(item.data.flags(), original.data.flags());
        let owner_uid = |m: &Map, owner: Owner| match owner {
            Owner::Root => None,
            Owner::Compound(id) => m.item(id).map(|compound| compound.uid),
        };
        assert_eq!(owner_uid(&loaded, item.owner()), owner_uid(&map, original.owner()));
        assert_eq!(
            detached(&loaded, item),
            detached(&map, original),
            "Feldunterschied bei {:?} {:#x}",
            item.kind(),
            item.uid
        );
    }

    let service = loaded
        .items()
        .find_map(|(_, item)| match &item.data {
            ItemData::Service(service) => Some(service),
            _ => None,
        })
        .unwrap();
    assert_eq!(service.service_type(), ServiceType::Garage);
    let model = loaded
        .items()
        .find_map(|(_, item)| match &item.data {
            ItemData::Model(model) if model.is_detail() => Some(model),
            _ => None,
        })
        .unwrap();
    assert_relative_eq!(model.scale().y, 0.75);
    let mover = loaded
        .items()
        .find_map(|(_, item)| match &item.data {
            ItemData::Mover(mover) => Some(mover),
            _ => None,
        })
        .unwrap();
    assert_eq!(mover.shape.lengths.len(), 2);
    assert_relative_eq!(mover.speed(), 2.5);

    for (_, original) in map.nodes() {
        let node = loaded.node(loaded.node_by_uid(original.uid).unwrap()).unwrap();
        assert_eq!(node.fixed_position(), original.fixed_position());
        assert_eq!(node.rotation, original.rotation);
        assert_eq!(node.is_red(), original.is_red());
        let slot_uid = |m: &Map, slot: Option<crate::core::ItemId>| {
            slot.and_then(|id| m.item(id)).map(|item| item.uid)
        };
        assert_eq!(slot_uid(&loaded, node.forward()), slot_uid(&map, original.forward()));
        assert_eq!(slot_uid(&loaded, node.backward()), slot_uid(&map, original.backward()));
    }
}

#[test]
fn test_roundtrip_keeps_kind_specific_fields() {
    let map = sample_map();
    let dir = tempfile::tempdir().unwrap();
    save_map(&map, dir.path()).unwrap();
    let (loaded, _) = load_map(dir.path(), &strict_options()).unwrap();

    let roads: Vec<_> = loaded
        .items()
        .filter_map(|(_, item)| match &item.data {
            ItemData::Road(road) if road.look == token("road1") => Some(road),
            _ => None,
        })
        .collect();
    assert_eq!(roads.len(), 1);
    let road = roads[0];
    assert_relative_eq!(road.terrain_size(), 4.0);
    assert_eq!(road.left_terrain.materials, vec![token("grass")]);
    assert_eq!(road.left_terrain.cell(0, 0), Some(1));
    assert_relative_eq!(road.length(), 30.0, epsilon = 1e-3);

    let trigger = loaded
        .items()
        .find_map(|(_, item)| match &item.data {
            ItemData::Trigger(trigger) => Some(trigger),
            _ => None,
        })
        .unwrap();
    assert!(trigger.is_closed());
    assert_eq!(trigger.actions[0].name, token("hud_parking"));
    assert_eq!(trigger.actions[0].parameters, vec![1.5, 2.0]);

    let prefab = loaded
        .items()
        .find_map(|(_, item)| match &item.data {
            ItemData::Prefab(prefab) => Some(prefab),
            _ => None,
        })
        .unwrap();
    assert_eq!(prefab.shape.slaves.len(), 2);
    assert!(prefab.shape.slaves.iter().all(|slave| slave.is_resolved()));

    let compound = loaded
        .items()
        .find_map(|(_, item)| match &item.data {
            ItemData::Compound(compound) => Some(compound),
            _ => None,
        })
        .unwrap();
    assert_eq!(compound.items.len(), 2);
    assert_eq!(compound.nodes.len(), 3);
    let child_road = compound
        .items
        .iter()
        .filter_map(|r| loaded.item(r.handle()))
        .find(|item| item.kind() == ItemKind::Road)
        .unwrap();
    assert_eq!(child_road.sector(), None);
}

#[test]
fn test_item_file_roundtrip_is_byte_exact() {
    let map = sample_map();
    let coord = SectorCoord::new(0, 0);
    let sector = map.sector(coord).unwrap();
    let items: Vec<_> = sector.base_items().map(|id| map.item(id).unwrap()).collect();
    let bytes = write_item_file(&map, coord, &items, &[]).unwrap();

    let parsed = read_item_file(&bytes).unwrap();
    assert_eq!(parsed.version, FORMAT_VERSION);
    assert_eq!(parsed.coord, coord);
    assert_eq!(parsed.items.len(), items.len());

    // Unaufgelöste Referenzen werden unverändert zurückgeschrieben.
    let scratch = Map::new("scratch");
    let parsed_items: Vec<_> = parsed.items.iter().map(|p| &p.item).collect();
    let again = write_item_file(&scratch, coord, &parsed_items, &[]).unwrap();
    assert_eq!(again.len(), bytes.len());
    assert_eq!(&again[20..], &bytes[20..]);
}

#[test]
fn test_unsupported_version_is_rejected() {
    let mut bytes = 1u32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[0; 24]);
    assert_eq!(
        read_item_file(&bytes).unwrap_err(),
        FormatError::UnsupportedVersion {
            found: 1,
            min: MIN_SUPPORTED_VERSION,
            max: FORMAT_VERSION,
        }
    );
    assert!(matches!(
        read_desc_file(&(FORMAT_VERSION + 1).to_le_bytes()),
        Err(FormatError::UnsupportedVersion { .. })
    ));
}

#[test]
fn test_truncated_item_file_is_rejected() {
    let map = sample_map();
    let coord = SectorCoord::new(0, 0);
    let items: Vec<_> = map
        .sector(coord)
        .unwrap()
        .base_items()
        .map(|id| map.item(id).unwrap())
        .collect();
    let bytes = write_item_file(&map, coord, &items, &[]).unwrap();
    let err = read_item_file(&bytes[..bytes.len() - 3]).unwrap_err();
    assert!(matches!(err, FormatError::Truncated { .. }), "{err:?}");

    let mut trailing = bytes.clone();
    trailing.push(0);
    assert_eq!(
        read_item_file(&trailing).unwrap_err(),
        FormatError::TrailingData { count: 1 }
    );
}

#[test]
fn test_unknown_item_tag_is_rejected() {
    let mut bytes = 99u32.to_le_bytes().to_vec();
    bytes.extend_from_slice(&[0; MIN_ITEM_RECORD]);
    let mut reader = BinaryReader::new(&bytes);
    assert_eq!(
        read_item(&mut reader).unwrap_err(),
        FormatError::UnknownItemType { tag: 99, offset: 0 }
    );
}

#[test]
fn test_nested_compound_is_rejected() {
    let mut map = Map::new("nested");
    let outer = Compound::add(&mut map, Vec3::ZERO).unwrap();
    let inner = Compound::add(&mut map, Vec3::new(1.0, 0.0, 1.0)).unwrap();
    if let ItemData::Compound(data) = &mut map.item_mut(outer).unwrap().data {
        data.items.push(inner.into());
    }
    let mut writer = BinaryWriter::new();
    assert!(matches!(
        write_item(&mut writer, &map, map.item(outer).unwrap()),
        Err(FormatError::NestedCompound(_))
    ));

    // Lesend: Compound-Datensatz, dessen einziges Kind selbst ein Compound ist
    let inner_item = map.item(inner).unwrap();
    let mut child = BinaryWriter::new();
    write_item(&mut child, &map, inner_item).unwrap();
    let mut outer_record = BinaryWriter::new();
    outer_record.write_u32(ItemKind::Compound.tag());
    outer_record.write_u64(0x77);
    for _ in 0..6 {
        outer_record.write_f32(0.0);
    }
    outer_record.write_u32(0);
    outer_record.write_u8(40);
    outer_record.write_u64(0x78);
    outer_record.write_u32(1);
    outer_record.write_bytes(&child.into_inner());
    outer_record.write_u32(0);
    let bytes = outer_record.into_inner();
    let mut reader = BinaryReader::new(&bytes);
    assert_eq!(
        read_item(&mut reader).unwrap_err(),
        FormatError::NestedCompound(inner_item.uid)
    );
}

#[test]
fn test_data_file_requires_sentinel() {
    let mut bytes = FORMAT_VERSION.to_le_bytes().to_vec();
    assert_eq!(
        read_data_file(&bytes, |_| None).unwrap_err(),
        FormatError::MissingSentinel
    );
    bytes.extend_from_slice(&u64::MAX.to_le_bytes());
    assert!(read_data_file(&bytes, |_| None).unwrap().is_empty());
}

#[test]
fn test_parse_sector_bytes_dispatches_on_kind() {
    let map = sample_map();
    let dir = tempfile::tempdir().unwrap();
    save_map(&map, dir.path()).unwrap();
    let desc = fs::read(dir.path().join("sec+0000+0000.desc")).unwrap();
    let content = parse_sector_bytes(SectorFileKind::Desc, &desc).unwrap();
    let SectorFileContent::Desc(descriptor) = content else {
        panic!("Deskriptor erwartet");
    };
    assert_eq!(descriptor.version, FORMAT_VERSION);
    assert_eq!(descriptor.bounds.min_x, 0);
    assert_eq!(descriptor.bounds.max_x, 4000 * 256);
}

/// Entfernt den Node mit `uid` aus einer gespeicherten Base-Datei.
fn drop_node_from_base(dir: &std::path::Path, name: &str, uid: u64) {
    let path = dir.join(name);
    let bytes = fs::read(&path).unwrap();
    let file = read_item_file(&bytes).unwrap();
    let mut map = Map::new("scratch");
    map.game_id = file.game_id;
    let items: Vec<_> = file.items.iter().map(|p| &p.item).collect();
    let nodes: Vec<_> = file.nodes.iter().filter(|n| n.uid != uid).collect();
    let rewritten = write_item_file(&map, file.coord, &items, &nodes).unwrap();
    fs::write(path, rewritten).unwrap();
}

#[test]
fn test_slotless_shape_node_survives_load() {
    let mut map = Map::new("slots");
    let trigger = Trigger::add(
        &mut map,
        &[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
        ],
        true,
    )
    .unwrap();
    let corner = map.item(trigger).unwrap().nodes()[1];
    let corner_uid = map.node(corner).unwrap().uid;
    let dir = tempfile::tempdir().unwrap();
    save_map(&map, dir.path()).unwrap();

    // Node bleibt in der Form, verliert aber seinen Slot
    let path = dir.path().join("sec+0000+0000.base");
    let file = read_item_file(&fs::read(&path).unwrap()).unwrap();
    let mut nodes = file.nodes.clone();
    for node in nodes.iter_mut().filter(|n| n.uid == corner_uid) {
        node.backward_item = None;
        node.forward_item = None;
    }
    let items: Vec<_> = file.items.iter().map(|p| &p.item).collect();
    let node_refs: Vec<_> = nodes.iter().collect();
    let mut scratch = Map::new("scratch");
    scratch.game_id = file.game_id;
    fs::write(&path, write_item_file(&scratch, file.coord, &items, &node_refs).unwrap()).unwrap();

    let (loaded, report) = load_map(dir.path(), &strict_options()).unwrap();
    assert_eq!(report.removed_orphans, 0);
    let corner = loaded.node_by_uid(corner_uid).expect("Node muss erhalten bleiben");
    let trigger = loaded.item(loaded.item_by_uid(map.item(trigger).unwrap().uid).unwrap()).unwrap();
    assert!(trigger.nodes().iter().all(|id| loaded.node(*id).is_some()));
    assert!(trigger.nodes().contains(&corner));

    let issues = loaded.validate();
    assert!(!issues.iter().any(|i| matches!(i, ValidationIssue::DanglingNode { .. })));
    assert!(issues
        .iter()
        .any(|i| matches!(i, ValidationIssue::MissingBackReference { node, .. } if *node == corner_uid)));
}

#[test]
fn test_strict_and_lenient_resolution() {
    let mut map = Map::new("refs");
    let road = Road::add(&mut map, Vec3::ZERO, Vec3::new(0.0, 0.0, 20.0), Token::EMPTY).unwrap();
    Road::append(&mut map, road, Vec3::new(0.0, 0.0, 40.0), false).unwrap();
    let missing = map.node(map.item(road).unwrap().nodes()[0]).unwrap().uid;

    let dir = tempfile::tempdir().unwrap();
    save_map(&map, dir.path()).unwrap();
    drop_node_from_base(dir.path(), "sec+0000+0000.base", missing);

    let err = load_map(dir.path(), &strict_options()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FormatError>(),
        Some(FormatError::UnresolvedReference { kind: "node", .. })
    ));

    let lenient = EngineOptions {
        strict_references: false,
        ..strict_options()
    };
    let (loaded, report) = load_map(dir.path(), &lenient).unwrap();
    assert_eq!(report.removed_items, 1);
    assert_eq!(loaded.item_count(), 1);
    assert!(loaded.validate().is_empty(), "{:?}", loaded.validate());
}

#[test]
fn test_broken_sector_can_be_skipped() {
    let map = sample_map();
    let dir = tempfile::tempdir().unwrap();
    save_map(&map, dir.path()).unwrap();
    fs::write(dir.path().join("sec+0005+0005.base"), [1, 2, 3]).unwrap();

    assert!(load_map(dir.path(), &strict_options()).is_err());

    let options = EngineOptions {
        skip_broken_sectors: true,
        ..strict_options()
    };
    let (loaded, report) = load_map(dir.path(), &options).unwrap();
    assert_eq!(report.skipped_sectors, vec![SectorCoord::new(5, 5)]);
    assert_eq!(loaded.item_count(), map.item_count());
}

#[test]
fn test_save_removes_stale_sector_files() {
    let map = sample_map();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("sec-0003+0002.base"), b"alt").unwrap();
    fs::write(dir.path().join("notes.txt"), b"bleibt").unwrap();

    let report = save_map(&map, dir.path()).unwrap();
    assert_eq!(report.files_removed, 1);
    assert!(!dir.path().join("sec-0003+0002.base").exists());
    assert!(dir.path().join("notes.txt").exists());
}

#[test]
fn test_parallel_and_sequential_load_agree() {
    let map = sample_map();
    let dir = tempfile::tempdir().unwrap();
    save_map(&map, dir.path()).unwrap();

    let (sequential, _) = load_map(dir.path(), &strict_options()).unwrap();
    let (parallel, _) = load_map(dir.path(), &EngineOptions::default()).unwrap();
    let mut a: Vec<u64> = sequential.items().map(|(_, i)| i.uid).collect();
    let mut b: Vec<u64> = parallel.items().map(|(_, i)| i.uid).collect();
    a.sort_unstable();
    b.sort_unstable();
    assert_eq!(a, b);
}
