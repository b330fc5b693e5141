//! Integrationstests: Karte bearbeiten, speichern, wieder laden.

use approx::assert_relative_eq;
use glam::Vec3;
use ts_map_engine::core::items::{Model, Road};
use ts_map_engine::core::topology;
use ts_map_engine::{load_map, save_map, EngineOptions, ItemData, ItemKind, Map, SectorCoord};
use ts_map_primitives::Token;

fn token(text: &str) -> Token {
    Token::new(text).unwrap()
}

/// Straßenkette über die Sektorgrenze bei x = 4000 plus ein Modell.
fn edited_map() -> Map {
    let mut map = Map::new("roundtrip");
    map.game_id = token("ets2");
    let first = Road::add(
        &mut map,
        Vec3::new(3980.0, 0.0, 20.0),
        Vec3::new(3995.0, 0.0, 20.0),
        token("ger1"),
    )
    .unwrap();
    let second = Road::append(&mut map, first, Vec3::new(4010.0, 0.0, 25.0), true).unwrap();
    Road::append(&mut map, second, Vec3::new(4030.0, 0.0, 30.0), true).unwrap();
    Model::add(&mut map, Vec3::new(10.0, 2.0, 10.0), token("house")).unwrap();
    map
}

#[test]
fn test_save_and_load_preserves_graph() {
    let dir = tempfile::tempdir().unwrap();
    let map = edited_map();

    let saved = save_map(&map, dir.path()).unwrap();
    assert_eq!(saved.sectors, 2);
    assert!(dir.path().join("sec+0000+0000.base").exists());
    assert!(dir.path().join("sec+0001+0000.base").exists());
    assert!(dir.path().join("sec+0000+0000.desc").exists());

    let (loaded, report) = load_map(dir.path(), &EngineOptions::default()).unwrap();
    assert_eq!(report.nodes, map.node_count());
    assert_eq!(report.items, map.item_count());
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.dropped_references, 0);
    assert!(loaded.validate().is_empty());
    assert_eq!(loaded.game_id, map.game_id);

    for (_, node) in map.nodes() {
        let id = loaded.node_by_uid(node.uid).expect("Node fehlt nach dem Laden");
        let other = loaded.node(id).unwrap();
        assert_eq!(other.fixed_position(), node.fixed_position());
        assert_eq!(other.is_red(), node.is_red());
        let uid_of = |m: &Map, item: Option<ts_map_engine::ItemId>| {
            item.and_then(|id| m.item(id)).map(|item| item.uid)
        };
        assert_eq!(uid_of(&loaded, other.forward()), uid_of(&map, node.forward()));
        assert_eq!(uid_of(&loaded, other.backward()), uid_of(&map, node.backward()));
    }

    for (_, item) in map.items() {
        let id = loaded.item_by_uid(item.uid).expect("Item fehlt nach dem Laden");
        let other = loaded.item(id).unwrap();
        assert_eq!(other.kind(), item.kind());
        assert_eq!(other.sector(), item.sector());
        if let (ItemData::Road(a), ItemData::Road(b)) = (&item.data, &other.data) {
            assert_relative_eq!(a.length(), b.length(), epsilon = 1e-4);
            assert_eq!(a.look, b.look);
        }
    }
}

#[test]
fn test_resave_after_delete_drops_item() {
    let dir = tempfile::tempdir().unwrap();
    let mut map = edited_map();
    save_map(&map, dir.path()).unwrap();

    let model = map
        .items()
        .find(|(_, item)| item.kind() == ItemKind::Model)
        .map(|(id, _)| id)
        .unwrap();
    topology::delete_item(&mut map, model).unwrap();
    let home = SectorCoord::new(0, 0);
    assert!(map.sector(home).unwrap().items().next().is_some(), "Straße liegt noch in 0/0");

    let report = save_map(&map, dir.path()).unwrap();
    assert_eq!(report.files_removed, 0);

    let (loaded, _) = load_map(dir.path(), &EngineOptions::default()).unwrap();
    assert_eq!(loaded.item_count(), 3);
    assert!(loaded.items().all(|(_, item)| item.kind() == ItemKind::Road));
}

#[test]
fn test_load_missing_directory_fails_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gibt_es_nicht");
    let err = load_map(&missing, &EngineOptions::default()).unwrap_err();
    assert!(format!("{err:#}").contains("gibt_es_nicht"));
}
