//! Geometrische Grundformen der Items: welche Nodes ein Item referenziert.

use crate::core::{ItemId, NodeId, Reference};

/// Form-Familie eines Item-Typs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Ein einzelner Anker-Node
    SingleNode,
    /// Zwei Nodes, Start und Ende (Straßen)
    Polyline,
    /// Geordnete Node-Liste, offen oder geschlossen
    Polygon,
    /// Geordnete Node-Liste mit Segmentlängen (Mover)
    Path,
    /// Feste Node-Liste mit Ursprungs-Index
    Prefab,
    /// Einzelner Node plus Verweis auf ein Master-Prefab
    Slave,
}

impl ShapeKind {
    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::SingleNode => "single node",
            ShapeKind::Polyline => "polyline",
            ShapeKind::Polygon => "polygon",
            ShapeKind::Path => "path",
            ShapeKind::Prefab => "prefab",
            ShapeKind::Slave => "prefab slave",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleNodeShape {
    pub node: Reference<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolylineShape {
    /// Start-Node (Anker)
    pub node: Reference<NodeId>,
    pub forward_node: Reference<NodeId>,
    /// Bogenlänge, wird von der Propagation gepflegt
    pub length: f32,
}

impl PolylineShape {
    pub fn new(node: NodeId, forward_node: NodeId) -> Self {
        Self {
            node: node.into(),
            forward_node: forward_node.into(),
            length: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolygonShape {
    pub nodes: Vec<Reference<NodeId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathShape {
    pub nodes: Vec<Reference<NodeId>>,
    /// Länge jedes Segments `nodes[i] -> nodes[i + 1]`
    pub lengths: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefabShape {
    pub nodes: Vec<Reference<NodeId>>,
    /// Index des Ursprungs-Nodes in `nodes`
    pub origin: u16,
    /// Company/Service-Items, die an diesem Prefab hängen
    pub slaves: Vec<Reference<ItemId>>,
}

impl PrefabShape {
    pub fn origin_node(&self) -> Option<Reference<NodeId>> {
        self.nodes.get(self.origin as usize).copied()
    }

    /// Position von `node` in der Node-Liste.
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.nodes.iter().position(|r| r.points_to(node))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlaveShape {
    pub node: Reference<NodeId>,
    pub prefab: Reference<ItemId>,
}

/// Lesender Blick auf die Form eines Items.
#[derive(Debug, Clone, Copy)]
pub enum Shape<'a> {
    SingleNode(&'a SingleNodeShape),
    Polyline(&'a PolylineShape),
    Polygon(&'a PolygonShape),
    Path(&'a PathShape),
    Prefab(&'a PrefabShape),
    Slave(&'a SlaveShape),
}

impl Shape<'_> {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::SingleNode(_) => ShapeKind::SingleNode,
            Shape::Polyline(_) => ShapeKind::Polyline,
            Shape::Polygon(_) => ShapeKind::Polygon,
            Shape::Path(_) => ShapeKind::Path,
            Shape::Prefab(_) => ShapeKind::Prefab,
            Shape::Slave(_) => ShapeKind::Slave,
        }
    }

    /// Alle Node-Referenzen in Speicherreihenfolge.
    pub fn node_refs(&self) -> Vec<Reference<NodeId>> {
        match self {
            Shape::SingleNode(s) => vec![s.node],
            Shape::Polyline(s) => vec![s.node, s.forward_node],
            Shape::Polygon(s) => s.nodes.clone(),
            Shape::Path(s) => s.nodes.clone(),
            Shape::Prefab(s) => s.nodes.clone(),
            Shape::Slave(s) => vec![s.node],
        }
    }

    /// Node, dessen Position den Sektor des Items bestimmt.
    pub fn anchor(&self) -> Option<Reference<NodeId>> {
        match self {
            Shape::SingleNode(s) => Some(s.node),
            Shape::Polyline(s) => Some(s.node),
            Shape::Polygon(s) => s.nodes.first().copied(),
            Shape::Path(s) => s.nodes.first().copied(),
            Shape::Prefab(s) => s.origin_node(),
            Shape::Slave(s) => Some(s.node),
        }
    }
}

/// Schreibender Blick auf die Form eines Items.
#[derive(Debug)]
pub enum ShapeMut<'a> {
    SingleNode(&'a mut SingleNodeShape),
    Polyline(&'a mut PolylineShape),
    Polygon(&'a mut PolygonShape),
    Path(&'a mut PathShape),
    Prefab(&'a mut PrefabShape),
    Slave(&'a mut SlaveShape),
}

impl ShapeMut<'_> {
    /// Ruft `f` für jede Node-Referenz auf.
    pub fn for_each_node_ref(&mut self, mut f: impl FnMut(&mut Reference<NodeId>)) {
        match self {
            ShapeMut::SingleNode(s) => f(&mut s.node),
            ShapeMut::Polyline(s) => {
                f(&mut s.node);
                f(&mut s.forward_node);
            }
            ShapeMut::Polygon(s) => s.nodes.iter_mut().for_each(f),
            ShapeMut::Path(s) => s.nodes.iter_mut().for_each(f),
            ShapeMut::Prefab(s) => s.nodes.iter_mut().for_each(f),
            ShapeMut::Slave(s) => f(&mut s.node),
        }
    }

    /// Ersetzt jede Referenz auf `old` durch `new`.
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) -> bool {
        let mut replaced = false;
        self.for_each_node_ref(|r| {
            if r.points_to(old) {
                *r = Reference::Resolved(new);
                replaced = true;
            }
        });
        replaced
    }
}
