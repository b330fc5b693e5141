//! Erzeugen und Verlängern von Items: Einzel-Node, Polyline, Polygon, Pfad.

use glam::Vec3;

use crate::core::container::ItemContainer;
use crate::core::error::{TopologyError, TopologyResult};
use crate::core::items::{
    Item, ItemData, PathShape, PolygonShape, PolylineShape, Shape, ShapeMut, SingleNodeShape,
};
use crate::core::{propagation, Direction, FixedVec3, ItemId, Map, NodeId, Reference};

/// Legt ein Item mit einem einzelnen roten Anker-Node an.
pub fn add_single_node<C, F>(container: &mut C, position: Vec3, make: F) -> TopologyResult<ItemId>
where
    C: ItemContainer + ?Sized,
    F: FnOnce(SingleNodeShape) -> ItemData,
{
    FixedVec3::from_vec3(position)?;
    let node = container.add_node(position, true)?;
    let data = make(SingleNodeShape { node: node.into() });
    let item = container.add_item(Item::new(0, data))?;
    let map = container.map_mut();
    map.link(node, Direction::Forward, Some(item))?;
    Ok(item)
}

/// Legt ein Polyline-Item von `start` nach `end` an.
///
/// Der Start-Node ist rot und führt das Item vorwärts, der End-Node führt es
/// rückwärts.
pub fn add_polyline<C, F>(
    container: &mut C,
    start: Vec3,
    end: Vec3,
    make: F,
) -> TopologyResult<ItemId>
where
    C: ItemContainer + ?Sized,
    F: FnOnce(PolylineShape) -> ItemData,
{
    FixedVec3::from_vec3(start)?;
    FixedVec3::from_vec3(end)?;

    let node = container.add_node(start, true)?;
    let forward_node = container.add_node(end, false)?;
    let data = make(PolylineShape::new(node, forward_node));
    let item = container.add_item(Item::new(0, data))?;

    let map = container.map_mut();
    map.link(node, Direction::Forward, Some(item))?;
    map.link(forward_node, Direction::Backward, Some(item))?;
    propagation::recalculate_items(map, &[item]);
    Ok(item)
}

/// Legt ein Polygon an; der erste Node ist rot, alle führen das Item vorwärts.
pub fn add_polygon<C, F>(
    container: &mut C,
    positions: &[Vec3],
    min_nodes: usize,
    make: F,
) -> TopologyResult<ItemId>
where
    C: ItemContainer + ?Sized,
    F: FnOnce(PolygonShape) -> ItemData,
{
    let nodes = add_node_list(container, positions, min_nodes)?;
    let data = make(PolygonShape {
        nodes: nodes.iter().map(|n| Reference::Resolved(*n)).collect(),
    });
    let item = container.add_item(Item::new(0, data))?;
    let map = container.map_mut();
    for node in nodes {
        map.link(node, Direction::Forward, Some(item))?;
    }
    Ok(item)
}

/// Legt einen Pfad an und berechnet Rotationen und Segmentlängen.
pub fn add_path<C, F>(
    container: &mut C,
    positions: &[Vec3],
    make: F,
) -> TopologyResult<ItemId>
where
    C: ItemContainer + ?Sized,
    F: FnOnce(PathShape) -> ItemData,
{
    let nodes = add_node_list(container, positions, 2)?;
    let data = make(PathShape {
        lengths: vec![0.0; nodes.len() - 1],
        nodes: nodes.iter().map(|n| Reference::Resolved(*n)).collect(),
    });
    let item = container.add_item(Item::new(0, data))?;
    let map = container.map_mut();
    for node in nodes {
        map.link(node, Direction::Forward, Some(item))?;
    }
    propagation::recalculate_items(map, &[item]);
    Ok(item)
}

fn add_node_list<C>(
    container: &mut C,
    positions: &[Vec3],
    min_nodes: usize,
) -> TopologyResult<Vec<NodeId>>
where
    C: ItemContainer + ?Sized,
{
    if positions.len() < min_nodes {
        return Err(TopologyError::IndexOutOfRange {
            index: min_nodes.saturating_sub(1),
            len: positions.len(),
        });
    }
    for position in positions {
        FixedVec3::from_vec3(*position)?;
    }
    positions
        .iter()
        .enumerate()
        .map(|(i, position)| container.add_node(*position, i == 0))
        .collect()
}

/// Hängt ein neues Polyline-Segment an das Ende von `item`.
///
/// `make` erhält das Quell-Item und die Form des neuen Segments; dort wird
/// entschieden, welche Einstellungen übernommen werden.
pub fn append_polyline<F>(
    map: &mut Map,
    item: ItemId,
    position: Vec3,
    make: F,
) -> TopologyResult<ItemId>
where
    F: FnOnce(&Item, PolylineShape) -> ItemData,
{
    let source = map.item_entry(item)?.clone();
    let Shape::Polyline(line) = source.shape() else {
        return Err(wrong_shape(&source, "polyline"));
    };
    let end = line.forward_node.handle();
    let end_node = map.node_entry(end)?;
    if end_node.forward_item.is_some() {
        return Err(TopologyError::EndpointOccupied {
            node: end_node.uid,
            direction: Direction::Forward,
        });
    }
    FixedVec3::from_vec3(position)?;

    let new_node = map.create_node(position, false, source.owner())?;
    let data = make(&source, PolylineShape::new(end, new_node));
    let new_item = map.attach_item(Item::new(0, data), source.owner())?;
    map.link(end, Direction::Forward, Some(new_item))?;
    map.link(new_node, Direction::Backward, Some(new_item))?;
    super::recolor(map, end);

    propagation::recalculate_items(map, &[new_item]);
    Ok(new_item)
}

/// Setzt ein neues Polyline-Segment vor den Anfang von `item`.
///
/// Der neue Start-Node wird rot, der alte Start verliert seine Anker-Rolle.
pub fn prepend_polyline<F>(
    map: &mut Map,
    item: ItemId,
    position: Vec3,
    make: F,
) -> TopologyResult<ItemId>
where
    F: FnOnce(&Item, PolylineShape) -> ItemData,
{
    let source = map.item_entry(item)?.clone();
    let Shape::Polyline(line) = source.shape() else {
        return Err(wrong_shape(&source, "polyline"));
    };
    let start = line.node.handle();
    let start_node = map.node_entry(start)?;
    if start_node.backward_item.is_some() {
        return Err(TopologyError::EndpointOccupied {
            node: start_node.uid,
            direction: Direction::Backward,
        });
    }
    FixedVec3::from_vec3(position)?;

    let new_node = map.create_node(position, true, source.owner())?;
    let data = make(&source, PolylineShape::new(new_node, start));
    let new_item = map.attach_item(Item::new(0, data), source.owner())?;
    map.link(new_node, Direction::Forward, Some(new_item))?;
    map.link(start, Direction::Backward, Some(new_item))?;
    super::recolor(map, start);

    propagation::recalculate_items(map, &[new_item]);
    Ok(new_item)
}

/// Hängt einen Node an das Ende eines Pfades.
pub fn append_path_node(map: &mut Map, item: ItemId, position: Vec3) -> TopologyResult<NodeId> {
    insert_path_node(map, item, position, false)
}

/// Setzt einen Node an den Anfang eines Pfades; er wird zum neuen Anker.
pub fn prepend_path_node(map: &mut Map, item: ItemId, position: Vec3) -> TopologyResult<NodeId> {
    insert_path_node(map, item, position, true)
}

fn insert_path_node(
    map: &mut Map,
    item: ItemId,
    position: Vec3,
    at_start: bool,
) -> TopologyResult<NodeId> {
    let entry = map.item_entry(item)?;
    let owner = entry.owner();
    let Shape::Path(path) = entry.shape() else {
        return Err(wrong_shape(entry, "path"));
    };
    let old_first = path.nodes.first().map(|r| r.handle());
    FixedVec3::from_vec3(position)?;

    let node = map.create_node(position, at_start, owner)?;
    if let Some(entry) = map.item_mut(item) {
        if let ShapeMut::Path(path) = entry.data.shape_mut() {
            if at_start {
                path.nodes.insert(0, node.into());
                path.lengths.insert(0, 0.0);
            } else {
                path.nodes.push(node.into());
                path.lengths.push(0.0);
            }
        }
    }
    map.link(node, Direction::Forward, Some(item))?;
    if at_start {
        if let Some(old) = old_first.and_then(|old| map.node_mut(old)) {
            old.set_red(false);
        }
        map.place_item(item);
        let nodes = map.item_entry(item)?.nodes();
        for node in nodes {
            map.refresh_node_sectors(node);
        }
    }

    propagation::recalculate_items(map, &[item]);
    Ok(node)
}

pub(crate) fn wrong_shape(item: &Item, expected: &'static str) -> TopologyError {
    TopologyError::WrongShape {
        uid: item.uid,
        expected,
    }
}
