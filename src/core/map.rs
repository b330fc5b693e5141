//! Die zentrale Map-Datenstruktur: Node- und Item-Arena, UID-Tabellen,
//! Sektoren und Spatial-Index.
//!
//! Alle Mutationen, die Positionen oder Referenzen verändern, laufen über
//! diese Struktur, damit Index und Sektor-Zuordnung konsistent bleiben.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use glam::{Vec2, Vec3};
use ts_map_primitives::Token;

use super::error::{TopologyError, TopologyResult};
use super::items::{Item, ItemData, StepSize};
use super::{
    propagation, Arena, Direction, FixedVec3, ItemId, Node, NodeId, Owner, Reference, Sector,
    SectorCoord, SpatialIndex, DEFAULT_SECTOR_SIZE,
};
use crate::binary::FORMAT_VERSION;
use crate::shared::EngineOptions;

/// Ein bei [`Map::validate`] gefundener Verstoß gegen die Graph-Invarianten.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    /// Item verweist auf einen Node, der nicht (mehr) existiert
    DanglingNode { item: u64 },
    /// Node verweist auf ein Item, das nicht (mehr) existiert
    DanglingItem { node: u64 },
    /// Item referenziert einen Node, dessen Slots das Item nicht enthalten
    MissingBackReference { item: u64, node: u64 },
    /// Node-Slot zeigt auf ein Item, das den Node nicht referenziert
    StaleSlot { node: u64, item: u64 },
    /// Node ohne Item-Referenz
    Orphan { node: u64 },
    /// Root-Item liegt nicht im Sektor seines Ankers
    WrongSector { item: u64 },
    /// Index-Position weicht von der Node-Position ab
    IndexMismatch { node: u64 },
    /// Referenz nach dem Laden noch unaufgelöst
    Unresolved { uid: u64 },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::DanglingNode { item } => {
                write!(f, "Item {item:#x} verweist auf einen geloeschten Node")
            }
            ValidationIssue::DanglingItem { node } => {
                write!(f, "Node {node:#x} verweist auf ein geloeschtes Item")
            }
            ValidationIssue::MissingBackReference { item, node } => {
                write!(f, "Node {node:#x} fuehrt Item {item:#x} in keinem Slot")
            }
            ValidationIssue::StaleSlot { node, item } => {
                write!(f, "Node {node:#x} zeigt auf Item {item:#x}, das ihn nicht referenziert")
            }
            ValidationIssue::Orphan { node } => write!(f, "Node {node:#x} ist verwaist"),
            ValidationIssue::WrongSector { item } => {
                write!(f, "Item {item:#x} liegt nicht im Sektor seines Ankers")
            }
            ValidationIssue::IndexMismatch { node } => {
                write!(f, "Spatial-Index und Node {node:#x} sind inkonsistent")
            }
            ValidationIssue::Unresolved { uid } => write!(f, "Referenz {uid:#x} unaufgeloest"),
        }
    }
}

/// Eine vollständige Karte.
#[derive(Debug, Clone)]
pub struct Map {
    name: String,
    sector_size: f32,
    /// Spiel-Kennung aus dem Datei-Header
    pub game_id: Token,
    nodes: Arena<Node>,
    items: Arena<Item>,
    node_uids: HashMap<u64, NodeId>,
    item_uids: HashMap<u64, ItemId>,
    sectors: BTreeMap<SectorCoord, Sector>,
    spatial_index: SpatialIndex,
    next_uid: u64,
    default_step_size: StepSize,
}

impl Map {
    /// Erstellt eine leere Karte mit Standard-Sektorgröße.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_sector_size(name, DEFAULT_SECTOR_SIZE)
    }

    pub fn with_sector_size(name: impl Into<String>, sector_size: f32) -> Self {
        Self {
            name: name.into(),
            sector_size,
            game_id: Token::EMPTY,
            nodes: Arena::new(),
            items: Arena::new(),
            node_uids: HashMap::new(),
            item_uids: HashMap::new(),
            sectors: BTreeMap::new(),
            spatial_index: SpatialIndex::empty(),
            next_uid: 1,
            default_step_size: StepSize::default(),
        }
    }

    /// Erstellt eine leere Karte nach den Engine-Optionen.
    pub fn with_options(name: impl Into<String>, options: &EngineOptions) -> Self {
        let mut map = Self::with_sector_size(name, options.sector_size);
        map.game_id = options.game_token();
        map.default_step_size = options.default_step_size;
        map
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sector_size(&self) -> f32 {
        self.sector_size
    }

    /// Schrittweite des Terrain-Gitters für neu angelegte Straßen.
    pub fn default_step_size(&self) -> StepSize {
        self.default_step_size
    }

    pub fn set_default_step_size(&mut self, step: StepSize) {
        self.default_step_size = step;
    }

    // ── Lesender Zugriff ────────────────────────────────────────────

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    pub fn node_by_uid(&self, uid: u64) -> Option<NodeId> {
        self.node_uids.get(&uid).copied()
    }

    pub fn item_by_uid(&self, uid: u64) -> Option<ItemId> {
        self.item_uids.get(&uid).copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &Item)> {
        self.items.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn sectors(&self) -> impl Iterator<Item = &Sector> {
        self.sectors.values()
    }

    pub fn sector(&self, coord: SectorCoord) -> Option<&Sector> {
        self.sectors.get(&coord)
    }

    /// Deskriptor-Daten eines Sektors bearbeiten.
    pub fn sector_mut(&mut self, coord: SectorCoord) -> Option<&mut Sector> {
        self.sectors.get_mut(&coord)
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.spatial_index
    }

    /// Sektor, in dem eine Weltposition liegt.
    pub fn sector_of(&self, position: Vec3) -> SectorCoord {
        SectorCoord::from_position(position, self.sector_size)
    }

    /// Alle Nodes im achsenparallelen Rechteck (X/Z, Ränder inklusive).
    pub fn nodes_in_rect(&self, min: Vec2, max: Vec2) -> Vec<NodeId> {
        self.spatial_index
            .within_rect(min, max)
            .into_iter()
            .filter_map(|uid| self.node_by_uid(uid))
            .collect()
    }

    /// Nächster Node zur Position (X/Z) samt Distanz.
    pub fn nearest_node(&self, position: Vec2) -> Option<(NodeId, f32)> {
        let hit = self.spatial_index.nearest(position)?;
        Some((self.node_by_uid(hit.node_uid)?, hit.distance))
    }

    /// Nächste freie UID (grösste vergebene + 1).
    pub fn allocate_uid(&mut self) -> u64 {
        let uid = self.next_uid;
        self.next_uid = self.next_uid.saturating_add(1);
        uid
    }

    /// Schreibzugriff auf Rotation und Flags eines Nodes.
    ///
    /// Position und Slots sind nur über [`Map::move_node`] und die
    /// Topologie-Operationen änderbar.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Schreibzugriff auf Header und typspezifische Daten eines Items.
    ///
    /// Node-Referenzen der Form dürfen hierüber nicht umgehängt werden.
    pub fn item_mut(&mut self, id: ItemId) -> Option<&mut Item> {
        self.items.get_mut(id)
    }

    // ── Fehlerbehaftete Zugriffe für Topologie-Operationen ────────────

    pub(crate) fn node_entry(&self, id: NodeId) -> TopologyResult<&Node> {
        self.nodes.get(id).ok_or(TopologyError::UnknownNode(id))
    }

    pub(crate) fn node_entry_mut(&mut self, id: NodeId) -> TopologyResult<&mut Node> {
        self.nodes.get_mut(id).ok_or(TopologyError::UnknownNode(id))
    }

    pub(crate) fn item_entry(&self, id: ItemId) -> TopologyResult<&Item> {
        self.items.get(id).ok_or(TopologyError::UnknownItem(id))
    }

    pub(crate) fn item_entry_mut(&mut self, id: ItemId) -> TopologyResult<&mut Item> {
        self.items.get_mut(id).ok_or(TopologyError::UnknownItem(id))
    }

    pub(crate) fn node_handles(&self) -> Vec<NodeId> {
        self.nodes.handles()
    }

    pub(crate) fn item_handles(&self) -> Vec<ItemId> {
        self.items.handles()
    }

    /// Kopie der UID-Tabellen für die Auflösungsphase.
    pub(crate) fn uid_snapshot(&self) -> (HashMap<u64, NodeId>, HashMap<u64, ItemId>) {
        (self.node_uids.clone(), self.item_uids.clone())
    }

    // ── Registrierung ─────────────────────────────────────────────

    /// Legt einen Node ab, registriert UID und Index.
    pub(crate) fn insert_node(&mut self, node: Node) -> NodeId {
        let uid = node.uid;
        let position = node.position();
        self.next_uid = self.next_uid.max(uid.saturating_add(1));
        let id = self.nodes.insert(node);
        self.node_uids.insert(uid, id);
        self.spatial_index.insert(uid, Vec2::new(position.x, position.z));
        id
    }

    /// Entfernt einen Node aus Arena, UID-Tabelle und Index.
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(id)?;
        self.node_uids.remove(&node.uid);
        self.spatial_index.remove(node.uid);
        Some(node)
    }

    /// Legt ein Item ab und registriert seine UID (ohne Sektor).
    pub(crate) fn insert_item(&mut self, item: Item) -> ItemId {
        let uid = item.uid;
        self.next_uid = self.next_uid.max(uid.saturating_add(1));
        let id = self.items.insert(item);
        self.item_uids.insert(uid, id);
        id
    }

    /// Entfernt ein Item aus Arena, UID-Tabelle und Sektor.
    pub(crate) fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        self.unplace_item(id);
        let item = self.items.remove(id)?;
        self.item_uids.remove(&item.uid);
        Some(item)
    }

    /// Erzeugt einen unverbundenen Node mit frischer UID.
    pub(crate) fn create_node(
        &mut self,
        position: Vec3,
        is_red: bool,
        owner: Owner,
    ) -> TopologyResult<NodeId> {
        let fixed = FixedVec3::from_vec3(position)?;
        Ok(self.create_node_at(fixed, is_red, owner))
    }

    /// Wie [`Map::create_node`], mit exakter Festkomma-Position.
    pub(crate) fn create_node_at(&mut self, fixed: FixedVec3, is_red: bool, owner: Owner) -> NodeId {
        let uid = self.allocate_uid();
        let mut node = Node::new(uid, fixed, is_red);
        node.owner = owner;
        let id = self.insert_node(node);
        if let Owner::Compound(compound) = owner {
            if let Some(ItemData::Compound(data)) = self.items.get_mut(compound).map(|i| &mut i.data) {
                data.nodes.push(id.into());
            }
        }
        id
    }

    /// Hängt ein fertiges Item mit aufgelösten Node-Referenzen ein.
    pub(crate) fn attach_item(&mut self, mut item: Item, owner: Owner) -> TopologyResult<ItemId> {
        for node in item.nodes() {
            self.node_entry(node)?;
        }
        if item.uid == 0 || self.item_uids.contains_key(&item.uid) {
            item.uid = self.allocate_uid();
        }
        item.owner = owner;
        let id = self.insert_item(item);
        match owner {
            Owner::Root => self.place_item(id),
            Owner::Compound(compound) => {
                if let Some(ItemData::Compound(data)) =
                    self.items.get_mut(compound).map(|i| &mut i.data)
                {
                    data.items.push(id.into());
                }
            }
        }
        Ok(id)
    }

    /// Ordnet ein Root-Item dem Sektor seines Ankers zu.
    pub(crate) fn place_item(&mut self, id: ItemId) {
        self.unplace_item(id);
        let Some(item) = self.items.get(id) else {
            return;
        };
        if item.owner != Owner::Root {
            return;
        }
        let Some(anchor) = item.shape().anchor().and_then(|r| r.resolved()) else {
            return;
        };
        let Some(position) = self.nodes.get(anchor).map(Node::position) else {
            return;
        };
        let coord = self.sector_of(position);
        let role = item.file_role();
        self.sectors
            .entry(coord)
            .or_insert_with(|| Sector::new(coord, FORMAT_VERSION))
            .insert(id, role);
        if let Some(item) = self.items.get_mut(id) {
            item.sector = Some(coord);
        }
    }

    /// Nimmt ein Item aus seinem Sektor.
    pub(crate) fn unplace_item(&mut self, id: ItemId) {
        let Some(item) = self.items.get_mut(id) else {
            return;
        };
        if let Some(coord) = item.sector.take() {
            if let Some(sector) = self.sectors.get_mut(&coord) {
                sector.remove(id);
            }
        }
    }

    /// Legt einen (ggf. leeren) Sektor mit Deskriptor an.
    pub(crate) fn ensure_sector(&mut self, coord: SectorCoord) -> &mut Sector {
        self.sectors
            .entry(coord)
            .or_insert_with(|| Sector::new(coord, FORMAT_VERSION))
    }

    /// Berechnet die Sektor-Menge eines Nodes aus seinen Items neu.
    pub(crate) fn refresh_node_sectors(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let sectors = node
            .items()
            .filter_map(|item| self.items.get(item))
            .filter_map(|item| item.sector)
            .collect();
        if let Some(node) = self.nodes.get_mut(id) {
            node.sectors = sectors;
        }
    }

    /// Setzt einen Slot und aktualisiert die Sektor-Menge des Nodes.
    pub(crate) fn link(
        &mut self,
        node: NodeId,
        direction: Direction,
        item: Option<ItemId>,
    ) -> TopologyResult<()> {
        self.node_entry_mut(node)?.set_item_in(direction, item);
        self.refresh_node_sectors(node);
        Ok(())
    }

    // ── Öffentliche Mutationen ────────────────────────────────────

    /// Verschiebt einen Node; Index, Sektoren und Rotationen ziehen nach.
    pub fn move_node(&mut self, id: NodeId, position: Vec3) -> TopologyResult<()> {
        let fixed = FixedVec3::from_vec3(position)?;
        let node = self.node_entry_mut(id)?;
        node.set_fixed_position(fixed);
        let uid = node.uid;
        let items: Vec<ItemId> = node.items().collect();
        let position = fixed.to_vec3();
        self.spatial_index
            .update(uid, Vec2::new(position.x, position.z));

        for item in &items {
            let is_anchor = self
                .items
                .get(*item)
                .and_then(|i| i.anchor_node())
                .is_some_and(|anchor| anchor == id);
            if is_anchor {
                self.place_item(*item);
                let nodes = self.items.get(*item).map(Item::nodes).unwrap_or_default();
                for node in nodes {
                    self.refresh_node_sectors(node);
                }
            }
        }
        propagation::recalculate_around_nodes(self, &[id]);
        Ok(())
    }

    /// Prüft alle Graph-Invarianten und liefert die gefundenen Verstöße.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for (item_id, item) in self.items.iter() {
            for reference in item.shape().node_refs() {
                let node_id = match reference {
                    Reference::Resolved(node) => node,
                    Reference::Unresolved(uid) => {
                        issues.push(ValidationIssue::Unresolved { uid });
                        continue;
                    }
                };
                match self.nodes.get(node_id) {
                    None => issues.push(ValidationIssue::DanglingNode { item: item.uid }),
                    Some(node) if node.slot_of(item_id).is_none() => {
                        issues.push(ValidationIssue::MissingBackReference {
                            item: item.uid,
                            node: node.uid,
                        })
                    }
                    Some(_) => {}
                }
            }
            if item.owner == Owner::Root {
                let expected = item
                    .shape()
                    .anchor()
                    .and_then(|r| r.resolved())
                    .and_then(|anchor| self.nodes.get(anchor))
                    .map(|node| self.sector_of(node.position()));
                let registered = item
                    .sector
                    .and_then(|coord| self.sectors.get(&coord))
                    .is_some_and(|sector| sector.contains(item_id));
                if expected != item.sector || !registered {
                    issues.push(ValidationIssue::WrongSector { item: item.uid });
                }
            }
        }

        for (node_id, node) in self.nodes.iter() {
            if node.is_orphaned() {
                issues.push(ValidationIssue::Orphan { node: node.uid });
            }
            for reference in [node.backward_item, node.forward_item].into_iter().flatten() {
                let item_id = match reference {
                    Reference::Resolved(item) => item,
                    Reference::Unresolved(uid) => {
                        issues.push(ValidationIssue::Unresolved { uid });
                        continue;
                    }
                };
                match self.items.get(item_id) {
                    None => issues.push(ValidationIssue::DanglingItem { node: node.uid }),
                    Some(item) => {
                        let referenced: HashSet<NodeId> = item
                            .shape()
                            .node_refs()
                            .iter()
                            .filter_map(|r| r.resolved())
                            .collect();
                        if !referenced.contains(&node_id) {
                            issues.push(ValidationIssue::StaleSlot {
                                node: node.uid,
                                item: item.uid,
                            });
                        }
                    }
                }
            }
            let position = node.position();
            if self.spatial_index.lookup(node.uid) != Some(Vec2::new(position.x, position.z)) {
                issues.push(ValidationIssue::IndexMismatch { node: node.uid });
            }
        }
        if self.spatial_index.len() != self.nodes.len() {
            issues.push(ValidationIssue::IndexMismatch { node: 0 });
        }

        issues
    }
}
