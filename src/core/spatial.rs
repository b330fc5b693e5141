//! Spatial-Index (KD-Tree) für schnelle Node-Abfragen auf der X/Z-Ebene.
//!
//! Der Index wird inkrementell gepflegt: jede Node-Erzeugung, -Verschiebung
//! und -Löschung in [`crate::core::Map`] aktualisiert ihn sofort.

use std::collections::{BTreeSet, HashMap};

use glam::Vec2;
use kiddo::{KdTree, SquaredEuclidean};

/// Ergebnis einer Distanzabfrage gegen den Spatial-Index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialMatch {
    /// UID des gefundenen Nodes
    pub node_uid: u64,
    /// Euklidische Distanz zum Suchpunkt
    pub distance: f32,
}

/// Alle Nodes an exakt derselben X/Z-Position; ein Baum-Eintrag pro Punkt.
#[derive(Debug, Clone)]
struct PointStack {
    position: Vec2,
    uids: BTreeSet<u64>,
}

/// Spatial-Index über allen Nodes einer Karte, Schlüssel ist die Node-UID.
///
/// Der KD-Tree kennt nur unterschiedliche Punkte. Beliebig viele Nodes an
/// derselben Position (gestapelte Modelle, Ebenen übereinander) teilen sich
/// einen Eintrag.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    tree: KdTree<f64, 2>,
    positions: HashMap<u64, Vec2>,
    /// Punkt-ID → gestapelte Nodes
    stacks: HashMap<u64, PointStack>,
    /// Bitmuster der Position → Punkt-ID
    point_ids: HashMap<[u32; 2], u64>,
    next_point_id: u64,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::empty()
    }
}

impl SpatialIndex {
    /// Erstellt einen leeren Spatial-Index.
    pub fn empty() -> Self {
        Self {
            tree: KdTree::new(),
            positions: HashMap::new(),
            stacks: HashMap::new(),
            point_ids: HashMap::new(),
            next_point_id: 0,
        }
    }

    /// Baut einen Index aus `(uid, position)`-Paaren.
    pub fn from_positions(entries: impl IntoIterator<Item = (u64, Vec2)>) -> Self {
        let mut index = Self::empty();
        for (uid, position) in entries {
            index.insert(uid, position);
        }
        index
    }

    /// Gibt die Anzahl indexierter Nodes zurück.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Gibt `true` zurück, wenn keine Nodes im Index liegen.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Position eines Nodes laut Index.
    pub fn lookup(&self, uid: u64) -> Option<Vec2> {
        self.positions.get(&uid).copied()
    }

    /// Fügt einen Node ein; ein vorhandener Eintrag wird ersetzt.
    pub fn insert(&mut self, uid: u64, position: Vec2) {
        if self.positions.contains_key(&uid) {
            self.remove(uid);
        }
        let position = canonical(position);
        let key = point_key(position);
        let point_id = match self.point_ids.get(&key) {
            Some(id) => *id,
            None => {
                let id = self.next_point_id;
                self.next_point_id += 1;
                self.tree.add(&to_point(position), id);
                self.point_ids.insert(key, id);
                self.stacks.insert(
                    id,
                    PointStack {
                        position,
                        uids: BTreeSet::new(),
                    },
                );
                id
            }
        };
        if let Some(stack) = self.stacks.get_mut(&point_id) {
            stack.uids.insert(uid);
        }
        self.positions.insert(uid, position);
    }

    /// Entfernt einen Node. Gibt `false` zurück, wenn er nicht indexiert war.
    pub fn remove(&mut self, uid: u64) -> bool {
        let Some(position) = self.positions.remove(&uid) else {
            return false;
        };
        let key = point_key(position);
        let Some(point_id) = self.point_ids.get(&key).copied() else {
            return true;
        };
        let now_empty = self.stacks.get_mut(&point_id).is_some_and(|stack| {
            stack.uids.remove(&uid);
            stack.uids.is_empty()
        });
        if now_empty {
            self.tree.remove(&to_point(position), point_id);
            self.stacks.remove(&point_id);
            self.point_ids.remove(&key);
        }
        true
    }

    /// Verschiebt einen Node.
    pub fn update(&mut self, uid: u64, position: Vec2) {
        self.insert(uid, position);
    }

    /// Findet den nächsten Node zur gegebenen Position.
    ///
    /// Bei gestapelten Nodes gewinnt die kleinste UID.
    pub fn nearest(&self, query: Vec2) -> Option<SpatialMatch> {
        if self.is_empty() {
            return None;
        }

        let result = self.tree.nearest_one::<SquaredEuclidean>(&to_point(query));
        let node_uid = self.stacks.get(&result.item)?.uids.first().copied()?;
        Some(SpatialMatch {
            node_uid,
            distance: (result.distance as f32).sqrt(),
        })
    }

    /// Findet alle Nodes innerhalb eines Radius um die Query-Position.
    pub fn within_radius(&self, query: Vec2, radius: f32) -> Vec<SpatialMatch> {
        if self.is_empty() || radius.is_sign_negative() {
            return Vec::new();
        }

        let mut results = self
            .tree
            .within::<SquaredEuclidean>(&to_point(query), (radius as f64) * (radius as f64))
            .into_iter()
            .filter_map(|entry| {
                let stack = self.stacks.get(&entry.item)?;
                let distance = (entry.distance as f32).sqrt();
                Some(stack.uids.iter().map(move |uid| SpatialMatch {
                    node_uid: *uid,
                    distance,
                }))
            })
            .flatten()
            .collect::<Vec<_>>();

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.node_uid.cmp(&b.node_uid)));
        results
    }

    /// Findet alle Nodes innerhalb eines achsenparallelen Rechtecks (Ränder inklusive).
    ///
    /// Nutzt den KD-Tree mit einer umschließenden Kreisabfrage + Nachfilterung,
    /// statt O(n) über alle Positionen zu iterieren.
    pub fn within_rect(&self, min: Vec2, max: Vec2) -> Vec<u64> {
        if self.is_empty() || min.x > max.x || min.y > max.y {
            return Vec::new();
        }

        let center_x = (min.x as f64 + max.x as f64) * 0.5;
        let center_y = (min.y as f64 + max.y as f64) * 0.5;
        let half_w = (max.x as f64 - min.x as f64) * 0.5;
        let half_h = (max.y as f64 - min.y as f64) * 0.5;
        // Radius des umschließenden Kreises (Diagonale / 2), leicht vergrößert
        // damit Eckpunkte trotz Rundung im Vorfilter bleiben
        let radius_sq = (half_w * half_w + half_h * half_h) * (1.0 + 1e-9) + 1e-9;

        let mut uids: Vec<u64> = self
            .tree
            .within::<SquaredEuclidean>(&[center_x, center_y], radius_sq)
            .into_iter()
            .filter_map(|entry| {
                let stack = self.stacks.get(&entry.item)?;
                let pos = stack.position;
                // Exakte Rechteck-Prüfung nach dem KD-Tree-Vorfilter
                (pos.x >= min.x && pos.x <= max.x && pos.y >= min.y && pos.y <= max.y)
                    .then(|| stack.uids.iter().copied())
            })
            .flatten()
            .collect();
        uids.sort_unstable();
        uids
    }
}

/// `-0.0` und `0.0` landen auf demselben Punkt.
fn canonical(position: Vec2) -> Vec2 {
    position + Vec2::ZERO
}

fn point_key(position: Vec2) -> [u32; 2] {
    [position.x.to_bits(), position.y.to_bits()]
}

fn to_point(position: Vec2) -> [f64; 2] {
    [position.x as f64, position.y as f64]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> SpatialIndex {
        SpatialIndex::from_positions([
            (1, Vec2::new(0.0, 0.0)),
            (2, Vec2::new(10.0, 0.0)),
            (3, Vec2::new(4.0, 3.0)),
        ])
    }

    #[test]
    fn nearest_returns_expected_node() {
        let index = sample_index();
        let nearest = index
            .nearest(Vec2::new(3.9, 2.9))
            .expect("Treffer erwartet");

        assert_eq!(nearest.node_uid, 3);
        assert!(nearest.distance < 0.2);
    }

    #[test]
    fn radius_query_returns_sorted_matches() {
        let index = sample_index();
        let matches = index.within_radius(Vec2::new(0.0, 0.0), 6.0);

        let uids: Vec<u64> = matches.into_iter().map(|m| m.node_uid).collect();
        assert_eq!(uids, vec![1, 3]);
    }

    #[test]
    fn rect_query_returns_nodes_inside_bounds() {
        let index = sample_index();
        let uids = index.within_rect(Vec2::new(-1.0, -1.0), Vec2::new(5.0, 3.5));

        assert_eq!(uids, vec![1, 3]);
    }

    #[test]
    fn rect_query_includes_edges() {
        let index = sample_index();
        let uids = index.within_rect(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));

        assert_eq!(uids, vec![1, 2]);
    }

    #[test]
    fn update_moves_node_out_of_old_region() {
        let mut index = sample_index();
        index.update(1, Vec2::new(100.0, 100.0));

        assert_eq!(index.len(), 3);
        assert_eq!(index.lookup(1), Some(Vec2::new(100.0, 100.0)));
        assert!(index.within_rect(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0)).is_empty());
        assert_eq!(index.nearest(Vec2::new(99.0, 99.0)).map(|m| m.node_uid), Some(1));
    }

    #[test]
    fn remove_drops_entry() {
        let mut index = sample_index();
        assert!(index.remove(3));
        assert!(!index.remove(3));
        assert_eq!(index.len(), 2);
        assert_eq!(index.nearest(Vec2::new(4.0, 3.0)).map(|m| m.node_uid), Some(1));
    }

    #[test]
    fn stacked_nodes_share_one_point() {
        let mut index = SpatialIndex::empty();
        let spot = Vec2::new(5.0, 5.0);
        for uid in 1..=100 {
            index.insert(uid, spot);
        }
        index.insert(500, Vec2::new(6.0, 5.0));

        assert_eq!(index.len(), 101);
        let uids = index.within_rect(Vec2::new(4.0, 4.0), Vec2::new(5.5, 5.5));
        assert_eq!(uids, (1..=100).collect::<Vec<u64>>());
        assert_eq!(index.within_radius(spot, 0.5).len(), 100);
        assert_eq!(index.nearest(Vec2::new(5.1, 5.0)).map(|m| m.node_uid), Some(1));

        for uid in 1..=99 {
            assert!(index.remove(uid));
        }
        assert_eq!(index.within_rect(spot, spot), vec![100]);
        assert!(index.remove(100));
        assert!(index.within_rect(spot, spot).is_empty());
        assert_eq!(index.nearest(spot).map(|m| m.node_uid), Some(500));

        // Wiederbelegen nach dem Leeren
        index.insert(7, spot);
        assert_eq!(index.nearest(spot).map(|m| m.node_uid), Some(7));
    }

    #[test]
    fn update_within_stack_keeps_other_nodes() {
        let mut index = SpatialIndex::from_positions((1..=40).map(|uid| (uid, Vec2::ZERO)));
        index.update(3, Vec2::new(-0.0, 10.0));

        assert_eq!(index.within_rect(Vec2::ZERO, Vec2::ZERO).len(), 39);
        assert_eq!(index.within_rect(Vec2::new(0.0, 10.0), Vec2::new(0.0, 10.0)), vec![3]);
    }

    #[test]
    fn empty_index_has_no_entries() {
        let index = SpatialIndex::empty();

        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert!(index.nearest(Vec2::new(0.0, 0.0)).is_none());
    }
}
