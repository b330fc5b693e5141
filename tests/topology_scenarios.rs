//! Integrationstests für die Topologie-Engine:
//! - Polyline anlegen und verlängern (Farben, Slots, Richtungen, Längen)
//! - Merge von Endpunkten mit Farbprüfung
//! - Löschen mit Aufräumen der Nachbarn
//! - Split eines Road/Prefab-Nodes

use approx::assert_relative_eq;
use glam::Vec3;
use ts_map_engine::core::items::{Prefab, PrefabLayout, PrefabNodeLayout, Road, StepSize};
use ts_map_engine::core::topology;
use ts_map_engine::{ItemData, ItemId, Map, NodeId, TopologyError};
use ts_map_primitives::Token;

fn look() -> Token {
    Token::new("ger1").unwrap()
}

fn road_nodes(map: &Map, road: ItemId) -> (NodeId, NodeId) {
    let nodes = map.item(road).unwrap().nodes();
    (nodes[0], nodes[1])
}

fn road_data(map: &Map, road: ItemId) -> &Road {
    match &map.item(road).unwrap().data {
        ItemData::Road(data) => data,
        other => panic!("Road erwartet, gefunden: {:?}", other.kind()),
    }
}

/// Drei verbundene Straßen entlang der X-Achse: 0 → 20 → 40 → 60.
fn three_road_chain(map: &mut Map) -> [ItemId; 3] {
    let first = Road::add(map, Vec3::ZERO, Vec3::new(20.0, 0.0, 0.0), look()).unwrap();
    let second = Road::append(map, first, Vec3::new(40.0, 0.0, 0.0), false).unwrap();
    let third = Road::append(map, second, Vec3::new(60.0, 0.0, 0.0), false).unwrap();
    [first, second, third]
}

#[test]
fn test_add_polyline_sets_colors_slots_and_length() {
    let mut map = Map::new("scenario");
    let road = Road::add(
        &mut map,
        Vec3::new(10.0, 0.0, 10.0),
        Vec3::new(15.0, 0.0, 40.0),
        look(),
    )
    .unwrap();

    let (start, end) = road_nodes(&map, road);
    let start_node = map.node(start).unwrap();
    let end_node = map.node(end).unwrap();

    assert!(start_node.is_red(), "Startnode muss rot sein");
    assert!(!end_node.is_red(), "Endnode muss grün sein");
    assert_eq!(start_node.forward(), Some(road));
    assert_eq!(start_node.backward(), None);
    assert_eq!(end_node.backward(), Some(road));
    assert_eq!(end_node.forward(), None);

    // Gerades Segment: Länge entspricht der Sehne
    let expected = (25.0f32 + 900.0).sqrt();
    assert_relative_eq!(road_data(&map, road).length(), expected, epsilon = 1e-3);

    let chord = (Vec3::new(15.0, 0.0, 40.0) - Vec3::new(10.0, 0.0, 10.0)).normalize();
    assert_relative_eq!(start_node.direction().dot(chord), 1.0, epsilon = 1e-4);
    assert_relative_eq!(end_node.direction().dot(chord), 1.0, epsilon = 1e-4);
    assert!(map.validate().is_empty());
}

#[test]
fn test_append_updates_headings_and_terrain_columns() {
    let mut map = Map::new("scenario");
    let points = [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, -10.0),
        Vec3::new(10.0, 0.0, -10.0),
        Vec3::new(10.0, 0.0, 0.0),
        Vec3::new(20.0, 0.0, 0.0),
    ];
    let mut roads = vec![Road::add(&mut map, points[0], points[1], look()).unwrap()];
    for point in &points[2..] {
        let last = *roads.last().unwrap();
        roads.push(Road::append(&mut map, last, *point, true).unwrap());
    }

    let mut nodes = vec![road_nodes(&map, roads[0]).0];
    nodes.extend(roads.iter().map(|road| road_nodes(&map, *road).1));
    assert_eq!(nodes.len(), points.len());

    let red: Vec<bool> = nodes
        .iter()
        .map(|id| map.node(*id).unwrap().is_red())
        .collect();
    assert_eq!(red, vec![true, false, false, false, false]);

    // Innere Nodes: Mittelwert der angrenzenden Sehnen
    for i in 1..points.len() - 1 {
        let incoming = points[i] - points[i - 1];
        let outgoing = points[i + 1] - points[i];
        let expected = (0.5 * (incoming + outgoing)).normalize();
        let actual = map.node(nodes[i]).unwrap().direction();
        assert_relative_eq!(actual.x, expected.x, epsilon = 1e-4);
        assert_relative_eq!(actual.z, expected.z, epsilon = 1e-4);
    }

    for road in &roads {
        let data = road_data(&map, *road);
        let expected = ((data.length() / StepSize::Meters4.meters()).ceil() as u16).max(1);
        assert!(data.length() >= 10.0 - 1e-3, "Kurve kürzer als Sehne");
        assert_eq!(data.step_size(), StepSize::Meters4);
        assert_eq!(data.terrain_columns(), expected);
    }
    assert!(map.validate().is_empty());
}

#[test]
fn test_merge_rejects_same_color_and_recolors_survivor() {
    let mut map = Map::new("scenario");
    let a = Road::add(&mut map, Vec3::ZERO, Vec3::new(0.0, 0.0, -10.0), look()).unwrap();
    let b = Road::add(
        &mut map,
        Vec3::new(0.0, 0.0, -10.0),
        Vec3::new(0.0, 0.0, -20.0),
        look(),
    )
    .unwrap();
    let c = Road::add(
        &mut map,
        Vec3::new(0.0, 0.0, -30.0),
        Vec3::new(0.0, 0.0, -40.0),
        look(),
    )
    .unwrap();

    let (a_start, a_end) = road_nodes(&map, a);
    let (b_start, _) = road_nodes(&map, b);
    let (c_start, c_end) = road_nodes(&map, c);

    // Zwei Enden (grün) bzw. zwei Anfänge (rot) passen nicht zusammen
    assert!(matches!(
        topology::merge(&mut map, a_end, c_end),
        Err(TopologyError::SameColor { .. })
    ));
    assert!(matches!(
        topology::merge(&mut map, a_start, c_start),
        Err(TopologyError::SameColor { .. })
    ));
    let nodes_before = map.node_count();

    let survivor = topology::merge(&mut map, a_end, b_start).unwrap();
    assert_eq!(survivor, a_end);
    assert_eq!(map.node_count(), nodes_before - 1);
    assert!(map.node(b_start).is_none());

    let node = map.node(survivor).unwrap();
    assert_eq!(node.backward(), Some(a));
    assert_eq!(node.forward(), Some(b));
    assert!(!node.is_red(), "innerer Node ist grün");
    assert_eq!(road_nodes(&map, b).0, survivor);
    assert!(map.validate().is_empty());
}

#[test]
fn test_delete_middle_road_cleans_up_neighbors() {
    let mut map = Map::new("scenario");
    let [first, second, third] = three_road_chain(&mut map);
    let (_, n1) = road_nodes(&map, first);
    let (n2, _) = road_nodes(&map, third);
    assert_eq!(map.node_count(), 4);

    topology::delete_item(&mut map, second).unwrap();

    assert!(map.item(second).is_none());
    assert_eq!(map.item_count(), 2);
    assert_eq!(map.node_count(), 4, "beide Nachbarn behalten ihre Straße");

    let n1 = map.node(n1).unwrap();
    assert_eq!(n1.backward(), Some(first));
    assert_eq!(n1.forward(), None);
    assert!(!n1.is_red());
    assert_relative_eq!(n1.direction().x, 1.0, epsilon = 1e-4);

    let n2 = map.node(n2).unwrap();
    assert_eq!(n2.backward(), None);
    assert_eq!(n2.forward(), Some(third));
    assert!(n2.is_red(), "neuer Kettenanfang ist rot");
    assert_relative_eq!(n2.direction().x, 1.0, epsilon = 1e-4);

    assert!(map.nodes().all(|(_, node)| !node.is_orphaned()));
    assert!(map.validate().is_empty());
}

#[test]
fn test_delete_last_road_removes_orphans() {
    let mut map = Map::new("scenario");
    let road = Road::add(&mut map, Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), look()).unwrap();

    topology::delete_item(&mut map, road).unwrap();

    assert_eq!(map.item_count(), 0);
    assert_eq!(map.node_count(), 0);
    assert!(map.nodes_in_rect(glam::Vec2::splat(-10.0), glam::Vec2::splat(10.0)).is_empty());
}

#[test]
fn test_split_road_from_prefab() {
    let mut map = Map::new("scenario");
    let layout = PrefabLayout {
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
    };
    let prefab = Prefab::add(
        &mut map,
        Vec3::new(100.0, 0.0, 100.0),
        0.0,
        &layout,
        Token::new("cross").unwrap(),
    )
    .unwrap();
    let exit = map.item(prefab).unwrap().nodes()[1];
    let exit_position = map.node(exit).unwrap().position();

    let road = Road::add(
        &mut map,
        exit_position,
        exit_position + Vec3::new(0.0, 0.0, -30.0),
        look(),
    )
    .unwrap();
    let (road_start, _) = road_nodes(&map, road);

    let shared = topology::merge(&mut map, exit, road_start).unwrap();
    {
        let node = map.node(shared).unwrap();
        assert_eq!(node.backward(), Some(prefab));
        assert_eq!(node.forward(), Some(road));
    }

    let created = topology::split(&mut map, shared)
        .unwrap()
        .expect("geteilter Node muss getrennt werden");

    let old = map.node(shared).unwrap();
    let new = map.node(created).unwrap();
    assert_eq!(old.fixed_position(), new.fixed_position());
    assert_ne!(old.is_red(), new.is_red(), "genau ein Node ist rot");
    assert!(new.is_red());

    assert_eq!(old.backward(), Some(prefab));
    assert_eq!(old.forward(), None);
    assert_eq!(new.forward(), Some(road));
    assert_eq!(road_nodes(&map, road).0, created);

    // Ein ungeteilter Node bleibt unverändert
    assert_eq!(topology::split(&mut map, created).unwrap(), None);
    assert!(map.validate().is_empty());
}
