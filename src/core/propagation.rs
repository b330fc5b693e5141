//! Rotations- und Längen-Propagation entlang von Straßenketten und Pfaden.
//!
//! Eine Kette besteht aus Road-Items, die sich Nodes teilen (Forward-Slot des
//! einen, Backward-Slot des nächsten). Rotationen werden aus den Tangenten
//! einer Hermite-Kurve durch die Node-Positionen abgeleitet; Nodes mit
//! freier Rotation und Prefab-Nodes bleiben fest und geben ihre Richtung
//! als Tangente vor.

use std::collections::HashSet;

use glam::{Quat, Vec2, Vec3};
use ts_map_primitives::spline;

use super::items::{ItemData, ItemKind, Shape};
use super::topology::prefab_link;
use super::{ItemId, Map, NodeId};

/// Minimale horizontale Länge, ab der eine Richtung als gültig gilt.
const MIN_HEADING_LENGTH: f32 = 1e-6;
/// Toleranz für Abfragen am Ende der gespeicherten Länge.
const LENGTH_EPSILON: f32 = 1e-3;

/// Yaw-Rotation, deren Vorwärtsrichtung (-Z) horizontal in `direction` zeigt.
///
/// `None` bei (nahezu) senkrechter oder leerer Richtung.
pub fn heading_rotation(direction: Vec3) -> Option<Quat> {
    let flat = Vec2::new(direction.x, direction.z);
    if flat.length_squared() < MIN_HEADING_LENGTH * MIN_HEADING_LENGTH {
        return None;
    }
    Some(Quat::from_rotation_y(f32::atan2(-flat.x, -flat.y)))
}

/// Richtung von `from` nach `to` als Rotation.
pub fn two_point_rotation(from: Vec3, to: Vec3) -> Option<Quat> {
    heading_rotation(to - from)
}

/// Zusammenhängende Straßenkette in Fahrtrichtung.
#[derive(Debug, Clone, PartialEq)]
struct Chain {
    /// Nodes in Reihenfolge; bei geschlossenen Ketten ohne Wiederholung des Starts
    nodes: Vec<NodeId>,
    roads: Vec<ItemId>,
    closed: bool,
}

/// Berechnet Rotationen und Längen aller Ketten und Pfade der Items neu.
pub fn recalculate_items(map: &mut Map, items: &[ItemId]) {
    let mut done: HashSet<ItemId> = HashSet::new();
    for &item in items {
        if done.contains(&item) {
            continue;
        }
        let Some(kind) = map.item(item).map(|entry| entry.kind()) else {
            continue;
        };
        match kind {
            ItemKind::Road => {
                let Some(chain) = collect_chain(map, item) else {
                    continue;
                };
                done.extend(chain.roads.iter().copied());
                recalculate_chain(map, &chain);
            }
            ItemKind::Mover => {
                done.insert(item);
                recalculate_path(map, item);
            }
            _ => {}
        }
    }
}

/// Propagiert für alle Items, die an den Nodes hängen.
pub fn recalculate_around_nodes(map: &mut Map, nodes: &[NodeId]) {
    let items: Vec<ItemId> = nodes
        .iter()
        .filter_map(|node| map.node(*node))
        .flat_map(|node| node.items().collect::<Vec<_>>())
        .collect();
    recalculate_items(map, &items);
}

// ── Ketten ─────────────────────────────────────────────────────────

fn road_ends(map: &Map, road: ItemId) -> Option<(NodeId, NodeId)> {
    match &map.item(road)?.data {
        ItemData::Road(r) => Some((r.shape.node.resolved()?, r.shape.forward_node.resolved()?)),
        _ => None,
    }
}

fn next_road(map: &Map, road: ItemId) -> Option<ItemId> {
    let (_, end) = road_ends(map, road)?;
    let next = map.node(end)?.forward()?;
    let (start, _) = road_ends(map, next)?;
    (start == end).then_some(next)
}

fn previous_road(map: &Map, road: ItemId) -> Option<ItemId> {
    let (start, _) = road_ends(map, road)?;
    let previous = map.node(start)?.backward()?;
    let (_, end) = road_ends(map, previous)?;
    (end == start).then_some(previous)
}

fn collect_chain(map: &Map, road: ItemId) -> Option<Chain> {
    let mut first = road;
    let mut closed = false;
    let mut seen = HashSet::from([road]);
    while let Some(previous) = previous_road(map, first) {
        if previous == road {
            closed = true;
            first = road;
            break;
        }
        if !seen.insert(previous) {
            break;
        }
        first = previous;
    }

    let (start, end) = road_ends(map, first)?;
    let mut chain = Chain {
        nodes: vec![start, end],
        roads: vec![first],
        closed,
    };
    let mut seen = HashSet::from([first]);
    let mut current = first;
    while let Some(next) = next_road(map, current) {
        if next == first || !seen.insert(next) {
            break;
        }
        chain.nodes.push(road_ends(map, next)?.1);
        chain.roads.push(next);
        current = next;
    }
    if chain.closed && chain.nodes.len() > 1 && chain.nodes.first() == chain.nodes.last() {
        chain.nodes.pop();
    }
    Some(chain)
}

/// Node gibt seine Richtung vor und wird nicht überschrieben.
fn is_fixed(map: &Map, node: NodeId) -> bool {
    map.node(node).is_some_and(|n| n.has_free_rotation()) || prefab_link(map, node).is_some()
}

/// Tangenten einer Kurve durch `points`.
///
/// Feste Punkte (`fixed[i] = Some(richtung)`) behalten ihre Richtung, skaliert
/// auf die Länge der angrenzenden Sehne. Innere Punkte nutzen den Mittelwert
/// beider Sehnen, offene Enden die natürliche Randbedingung.
fn tangents(points: &[Vec3], fixed: &[Option<Vec3>], closed: bool) -> Vec<Vec3> {
    let count = points.len();
    if count < 2 {
        return vec![Vec3::ZERO; count];
    }
    let chord = |i: usize| points[(i + 1) % count] - points[i];
    let fixed_tangent = |i: usize, length: f32| fixed[i].map(|dir| dir * length);

    (0..count)
        .map(|i| {
            let incoming = if i > 0 || closed {
                Some(chord((i + count - 1) % count))
            } else {
                None
            };
            let outgoing = if i + 1 < count || closed {
                Some(chord(i))
            } else {
                None
            };
            let reference = outgoing.or(incoming).map_or(0.0, Vec3::length);
            if let Some(tangent) = fixed_tangent(i, reference) {
                return tangent;
            }
            match (incoming, outgoing) {
                (Some(a), Some(b)) => 0.5 * (a + b),
                (None, Some(b)) => match fixed_tangent(1, b.length()) {
                    Some(next) => 0.5 * (3.0 * b - next),
                    None => b,
                },
                (Some(a), None) => match fixed_tangent(count - 2, a.length()) {
                    Some(previous) => 0.5 * (3.0 * a - previous),
                    None => a,
                },
                (None, None) => Vec3::ZERO,
            }
        })
        .collect()
}

/// Setzt die Rotation aller nicht festen Nodes nach ihren Tangenten und
/// liefert die resultierenden Richtungen.
fn apply_headings(map: &mut Map, nodes: &[NodeId], closed: bool) -> Option<Vec<Vec3>> {
    let mut points = Vec::with_capacity(nodes.len());
    let mut fixed = Vec::with_capacity(nodes.len());
    for &id in nodes {
        let node = map.node(id)?;
        points.push(node.position());
        fixed.push(is_fixed(map, id).then(|| node.direction()));
    }

    let tangents = tangents(&points, &fixed, closed);
    for (i, &id) in nodes.iter().enumerate() {
        if fixed[i].is_some() {
            continue;
        }
        if let Some(rotation) = heading_rotation(tangents[i]) {
            if let Some(node) = map.node_mut(id) {
                node.rotation = rotation;
            }
        }
    }
    Some(nodes.iter().filter_map(|id| map.node(*id)).map(|n| n.direction()).collect())
}

/// Bogenlänge eines Segments mit den Node-Richtungen als Tangenten.
fn curved_length(p0: Vec3, d0: Vec3, p1: Vec3, d1: Vec3) -> f32 {
    let chord = p0.distance(p1);
    spline::hermite_length(p0, d0 * chord, p1, d1 * chord)
}

fn recalculate_chain(map: &mut Map, chain: &Chain) {
    let Some(directions) = apply_headings(map, &chain.nodes, chain.closed) else {
        return;
    };
    let count = chain.nodes.len();
    for (i, &road) in chain.roads.iter().enumerate() {
        let (a, b) = (i, (i + 1) % count);
        let (Some(p0), Some(p1)) = (
            map.node(chain.nodes[a]).map(|n| n.position()),
            map.node(chain.nodes[b]).map(|n| n.position()),
        ) else {
            continue;
        };
        if let Some(ItemData::Road(data)) = map.item_mut(road).map(|item| &mut item.data) {
            data.shape.length = if data.is_straight() {
                p0.distance(p1)
            } else {
                curved_length(p0, directions[a], p1, directions[b])
            };
            data.update_terrain_grid();
        }
    }
    log::debug!(
        "Kette mit {} Segmenten neu berechnet{}",
        chain.roads.len(),
        if chain.closed { " (geschlossen)" } else { "" }
    );
}

fn recalculate_path(map: &mut Map, item: ItemId) {
    let Some(Shape::Path(path)) = map.item(item).map(|i| i.shape()) else {
        return;
    };
    let Some(nodes) = path.nodes.iter().map(|r| r.resolved()).collect::<Option<Vec<_>>>() else {
        return;
    };
    let Some(directions) = apply_headings(map, &nodes, false) else {
        return;
    };
    let points: Vec<Vec3> = nodes
        .iter()
        .filter_map(|id| map.node(*id))
        .map(|n| n.position())
        .collect();
    if points.len() != nodes.len() {
        return;
    }

    if let Some(ItemData::Mover(mover)) = map.item_mut(item).map(|i| &mut i.data) {
        let curved = mover.use_curved_path();
        mover.shape.lengths = points
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                if curved {
                    curved_length(pair[0], directions[i], pair[1], directions[i + 1])
                } else {
                    pair[0].distance(pair[1])
                }
            })
            .collect();
    }
}

// ── Abfragen ───────────────────────────────────────────────────────

/// Position nach `distance` Metern entlang eines Pfades oder Straßensegments.
///
/// Nutzt die gespeicherten Längen; `None` für negative Distanzen, hinter dem
/// Ende oder für Items ohne Längen-Cache.
pub fn point_at_distance(map: &Map, item: ItemId, distance: f32) -> Option<Vec3> {
    let entry = map.item(item)?;
    let (nodes, lengths, curved): (Vec<NodeId>, Vec<f32>, bool) = match &entry.data {
        ItemData::Mover(mover) => (
            mover
                .shape
                .nodes
                .iter()
                .map(|r| r.resolved())
                .collect::<Option<_>>()?,
            mover.shape.lengths.clone(),
            mover.use_curved_path(),
        ),
        ItemData::Road(road) => (
            vec![road.shape.node.resolved()?, road.shape.forward_node.resolved()?],
            vec![road.shape.length],
            !road.is_straight(),
        ),
        _ => return None,
    };

    let total: f32 = lengths.iter().sum();
    if distance < 0.0 || distance > total + LENGTH_EPSILON {
        return None;
    }

    let mut remaining = distance;
    for (i, &length) in lengths.iter().enumerate() {
        let last = i + 1 == lengths.len();
        if remaining > length && !last {
            remaining -= length;
            continue;
        }
        let a = map.node(*nodes.get(i)?)?;
        let b = map.node(*nodes.get(i + 1)?)?;
        let (p0, p1) = (a.position(), b.position());
        let local = remaining.min(length);
        if length <= f32::EPSILON {
            return Some(p0);
        }
        if !curved {
            return Some(p0.lerp(p1, local / length));
        }
        let chord = p0.distance(p1);
        let (t0, t1) = (a.direction() * chord, b.direction() * chord);
        let t = spline::hermite_param_at_length(p0, t0, p1, t1, local)
            .unwrap_or(if local >= length { 1.0 } else { 0.0 });
        return Some(spline::hermite_point(p0, t0, p1, t1, t));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::items::{Mover, Road};
    use crate::core::topology;
    use approx::assert_relative_eq;
    use ts_map_primitives::Token;

    fn direction_of(map: &Map, node: NodeId) -> Vec3 {
        map.node(node).unwrap().direction()
    }

    #[test]
    fn test_heading_rotation_points_forward() {
        let rotation = heading_rotation(Vec3::new(1.0, 5.0, 0.0)).unwrap();
        let dir = rotation * Vec3::NEG_Z;
        assert_relative_eq!(dir.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(dir.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(dir.z, 0.0, epsilon = 1e-5);
        assert!(heading_rotation(Vec3::Y).is_none());
        assert!(two_point_rotation(Vec3::ONE, Vec3::ONE).is_none());
    }

    #[test]
    fn test_interior_heading_is_smoothed() {
        let mut map = Map::new("test");
        let first = Road::add(
            &mut map,
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -10.0),
            Token::EMPTY,
        )
        .unwrap();
        let second = Road::append(&mut map, first, Vec3::new(10.0, 0.0, -10.0), false).unwrap();

        let nodes = map.item(first).unwrap().nodes();
        let end = map.item(second).unwrap().nodes()[1];

        let start_dir = direction_of(&map, nodes[0]);
        assert_relative_eq!(start_dir.z, -1.0, epsilon = 1e-5);

        let corner = direction_of(&map, nodes[1]);
        let diagonal = std::f32::consts::FRAC_1_SQRT_2;
        assert_relative_eq!(corner.x, diagonal, epsilon = 1e-5);
        assert_relative_eq!(corner.z, -diagonal, epsilon = 1e-5);

        let end_dir = direction_of(&map, end);
        assert_relative_eq!(end_dir.x, 1.0, epsilon = 1e-5);

        let ItemData::Road(road) = &map.item(first).unwrap().data else {
            unreachable!()
        };
        assert!(road.length() > 10.0);
    }

    #[test]
    fn test_free_rotation_is_kept() {
        let mut map = Map::new("test");
        let first = Road::add(
            &mut map,
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -10.0),
            Token::EMPTY,
        )
        .unwrap();
        let corner = map.item(first).unwrap().nodes()[1];
        {
            let node = map.node_mut(corner).unwrap();
            node.set_free_rotation(true);
            node.rotation = Quat::from_rotation_y(0.3);
        }
        Road::append(&mut map, first, Vec3::new(10.0, 0.0, -10.0), false).unwrap();
        assert_eq!(map.node(corner).unwrap().rotation, Quat::from_rotation_y(0.3));
    }

    #[test]
    fn test_straight_flag_uses_chord_length() {
        let mut map = Map::new("test");
        let first = Road::add(&mut map, Vec3::ZERO, Vec3::new(0.0, 0.0, -10.0), Token::EMPTY)
            .unwrap();
        let second = Road::append(&mut map, first, Vec3::new(10.0, 0.0, -10.0), false).unwrap();
        if let ItemData::Road(road) = &mut map.item_mut(second).unwrap().data {
            road.set_straight(true);
        }
        recalculate_items(&mut map, &[second]);
        let ItemData::Road(road) = &map.item(second).unwrap().data else {
            unreachable!()
        };
        assert_relative_eq!(road.length(), 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_closed_loop_is_cyclic() {
        let mut map = Map::new("test");
        let first = Road::add(&mut map, Vec3::ZERO, Vec3::new(0.0, 0.0, -10.0), Token::EMPTY)
            .unwrap();
        let second = Road::append(&mut map, first, Vec3::new(10.0, 0.0, -10.0), false).unwrap();
        let third = Road::append(&mut map, second, Vec3::new(10.0, 0.0, 0.0), false).unwrap();
        let fourth = Road::append(&mut map, third, Vec3::new(0.0, 0.0, 0.0), false).unwrap();

        let start = map.item(first).unwrap().nodes()[0];
        let end = map.item(fourth).unwrap().nodes()[1];
        let kept = topology::merge(&mut map, start, end).unwrap();

        let chain = collect_chain(&map, third).unwrap();
        assert!(chain.closed);
        assert_eq!(chain.roads.len(), 4);
        assert_eq!(chain.nodes.len(), 4);

        // Ecke des Quadrats: Mittel aus eingehender und ausgehender Sehne
        let dir = direction_of(&map, kept);
        let diagonal = std::f32::consts::FRAC_1_SQRT_2;
        assert_relative_eq!(dir.x, -diagonal, epsilon = 1e-5);
        assert_relative_eq!(dir.z, -diagonal, epsilon = 1e-5);
        assert!(!map.node(kept).unwrap().is_red());
    }

    #[test]
    fn test_mover_position_at_distance() {
        let mut map = Map::new("test");
        let mover = Mover::add(
            &mut map,
            &[Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, 30.0)],
            Token::EMPTY,
        )
        .unwrap();

        let ItemData::Mover(data) = &map.item(mover).unwrap().data else {
            unreachable!()
        };
        assert_relative_eq!(data.total_length(), 30.0, epsilon = 1e-4);

        let p = point_at_distance(&map, mover, 15.0).unwrap();
        assert_relative_eq!(p.z, 15.0, epsilon = 1e-3);
        assert!(point_at_distance(&map, mover, 30.5).is_none());
        assert!(point_at_distance(&map, mover, -1.0).is_none());
        assert!(point_at_distance(&map, mover, 30.0).is_some());
    }

    #[test]
    fn test_curved_road_position_stays_on_segment_ends() {
        let mut map = Map::new("test");
        let road = Road::add(&mut map, Vec3::ZERO, Vec3::new(0.0, 0.0, -20.0), Token::EMPTY)
            .unwrap();
        let start = point_at_distance(&map, road, 0.0).unwrap();
        assert_relative_eq!(start.z, 0.0, epsilon = 1e-3);
        let middle = point_at_distance(&map, road, 10.0).unwrap();
        assert_relative_eq!(middle.z, -10.0, epsilon = 1e-2);
    }
}
