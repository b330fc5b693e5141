//! Datensätze für Items, Nodes und Zusatzdaten.
//!
//! Beim Lesen entstehen ausschließlich unaufgelöste Referenzen (nur UIDs);
//! der Loader löst sie nach dem Parsen aller Sektoren global auf. Beim
//! Schreiben werden aufgelöste Referenzen über die Karte in UIDs übersetzt.

use ts_map_primitives::Token;

use super::error::{FormatError, FormatResult};
use super::reader::BinaryReader;
use super::writer::BinaryWriter;
use crate::core::items::{
    BoundingBox, Company, Compound, Item, ItemData, ItemKind, MapArea, Model, Mover, PathShape,
    PolygonShape, PolylineShape, Prefab, PrefabCorner, PrefabShape, Road, Service,
    SingleNodeShape, SlaveShape, TerrainQuadData, Trigger, TriggerAction, MAX_VIEW_DISTANCE,
};
use crate::core::{ItemId, Map, Node, NodeId, Reference};

/// Kleinstmögliche Größe eines Item-Datensatzes (Header ohne Körper).
pub(crate) const MIN_ITEM_RECORD: usize = 4 + 8 + 24 + 4 + 1;
/// Größe eines Node-Datensatzes.
pub(crate) const NODE_RECORD: usize = 8 + 12 + 16 + 8 + 8 + 4;

/// Gelesenes Item; Compounds bringen ihre eingebetteten Kinder mit.
#[derive(Debug, Clone)]
pub struct ParsedItem {
    pub item: Item,
    pub children: Vec<Item>,
    pub child_nodes: Vec<Node>,
}

/// Zusatzdaten eines Items aus der `.data`-Datei.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Road {
        left: TerrainQuadData,
        right: TerrainQuadData,
    },
}

impl Payload {
    /// Überträgt die Zusatzdaten auf ein passendes Item.
    pub fn apply(self, data: &mut ItemData) -> bool {
        match (self, data) {
            (Payload::Road { left, right }, ItemData::Road(road)) => {
                road.left_terrain = left;
                road.right_terrain = right;
                true
            }
            _ => false,
        }
    }
}

// ── Referenzen ─────────────────────────────────────────────────────

fn read_uid(reader: &mut BinaryReader<'_>, field: &'static str) -> FormatResult<u64> {
    let uid = reader.read_u64()?;
    if uid == 0 || uid == u64::MAX {
        return Err(FormatError::InvalidValue { field, value: uid });
    }
    Ok(uid)
}

fn read_node_ref(reader: &mut BinaryReader<'_>) -> FormatResult<Reference<NodeId>> {
    Ok(Reference::Unresolved(read_uid(reader, "node uid")?))
}

fn read_item_ref(reader: &mut BinaryReader<'_>) -> FormatResult<Reference<ItemId>> {
    Ok(Reference::Unresolved(read_uid(reader, "item uid")?))
}

fn read_node_refs(reader: &mut BinaryReader<'_>) -> FormatResult<Vec<Reference<NodeId>>> {
    let count = reader.read_count(8)?;
    (0..count).map(|_| read_node_ref(reader)).collect()
}

fn read_tokens(reader: &mut BinaryReader<'_>) -> FormatResult<Vec<Token>> {
    let count = reader.read_count(8)?;
    (0..count).map(|_| reader.read_token()).collect()
}

fn node_uid(map: &Map, reference: Reference<NodeId>) -> FormatResult<u64> {
    match reference {
        Reference::Unresolved(uid) => Ok(uid),
        Reference::Resolved(id) => map
            .node(id)
            .map(|node| node.uid)
            .ok_or(FormatError::UnresolvedReference { kind: "node", uid: 0 }),
    }
}

fn item_uid(map: &Map, reference: Reference<ItemId>) -> FormatResult<u64> {
    match reference {
        Reference::Unresolved(uid) => Ok(uid),
        Reference::Resolved(id) => map
            .item(id)
            .map(|item| item.uid)
            .ok_or(FormatError::UnresolvedReference { kind: "item", uid: 0 }),
    }
}

fn write_node_refs(
    writer: &mut BinaryWriter,
    map: &Map,
    refs: &[Reference<NodeId>],
) -> FormatResult<()> {
    writer.write_count("node count", refs.len())?;
    for reference in refs {
        writer.write_u64(node_uid(map, *reference)?);
    }
    Ok(())
}

fn write_tokens(writer: &mut BinaryWriter, tokens: &[Token]) -> FormatResult<()> {
    writer.write_count("token count", tokens.len())?;
    for token in tokens {
        writer.write_token(*token);
    }
    Ok(())
}

// ── Nodes ──────────────────────────────────────────────────────────

pub fn read_node(reader: &mut BinaryReader<'_>) -> FormatResult<Node> {
    let uid = read_uid(reader, "node uid")?;
    let position = reader.read_fixed_vec3()?;
    let rotation = reader.read_quat()?;
    let backward = reader.read_u64()?;
    let forward = reader.read_u64()?;
    let flags = reader.read_flags()?;

    let mut node = Node::new(uid, position, false);
    node.rotation = rotation;
    node.backward_item = (backward != 0).then_some(Reference::Unresolved(backward));
    node.forward_item = (forward != 0).then_some(Reference::Unresolved(forward));
    node.flags = flags;
    Ok(node)
}

pub fn write_node(writer: &mut BinaryWriter, map: &Map, node: &Node) -> FormatResult<()> {
    writer.write_u64(node.uid);
    writer.write_fixed_vec3(node.fixed_position());
    writer.write_quat(node.rotation);
    for slot in [node.backward_item, node.forward_item] {
        let uid = match slot {
            Some(reference) => item_uid(map, reference)?,
            None => 0,
        };
        writer.write_u64(uid);
    }
    writer.write_flags(node.flags);
    Ok(())
}

// ── Items ──────────────────────────────────────────────────────────

pub fn read_item(reader: &mut BinaryReader<'_>) -> FormatResult<ParsedItem> {
    read_item_record(reader, false)
}

fn read_item_record(reader: &mut BinaryReader<'_>, nested: bool) -> FormatResult<ParsedItem> {
    let offset = reader.offset();
    let tag = reader.read_u32()?;
    let kind = ItemKind::from_tag(tag).ok_or(FormatError::UnknownItemType { tag, offset })?;
    let uid = read_uid(reader, "item uid")?;
    let mut bounding_box = BoundingBox::default();
    for value in bounding_box.min.iter_mut().chain(bounding_box.max.iter_mut()) {
        *value = reader.read_f32()?;
    }
    let flags = reader.read_flags()?;
    let view_distance = reader.read_u8()? as u16 * 10;

    let mut children = Vec::new();
    let mut child_nodes = Vec::new();
    let data = match kind {
        ItemKind::Road => {
            let shape = PolylineShape {
                node: read_node_ref(reader)?,
                forward_node: read_node_ref(reader)?,
                length: reader.read_f32()?,
            };
            let mut road = Road::new(shape, reader.read_token()?);
            road.flags = flags;
            road.variant = reader.read_token()?;
            road.left_edge = reader.read_token()?;
            road.right_edge = reader.read_token()?;
            road.terrain_material = reader.read_token()?;
            road.terrain_size = reader.read_u16()?;
            road.left_offset = reader.read_i16()?;
            road.right_offset = reader.read_i16()?;
            ItemData::Road(road)
        }
        ItemKind::Prefab => {
            let model = reader.read_token()?;
            let variant = reader.read_token()?;
            let look = reader.read_token()?;
            let origin = reader.read_u16()?;
            let nodes = read_node_refs(reader)?;
            if nodes.is_empty() || origin as usize >= nodes.len() {
                return Err(FormatError::InvalidValue {
                    field: "prefab origin",
                    value: origin as u64,
                });
            }
            let slave_count = reader.read_count(8)?;
            let slaves = (0..slave_count)
                .map(|_| read_item_ref(reader))
                .collect::<FormatResult<_>>()?;
            let corner_count = reader.read_count(10)?;
            let corners = (0..corner_count)
                .map(|_| {
                    Ok(PrefabCorner {
                        terrain_material: reader.read_token()?,
                        color_variant: reader.read_u16()?,
                    })
                })
                .collect::<FormatResult<_>>()?;
            ItemData::Prefab(Prefab {
                shape: PrefabShape {
                    nodes,
                    origin,
                    slaves,
                },
                flags,
                model,
                variant,
                look,
                corners,
            })
        }
        ItemKind::Model => {
            let shape = SingleNodeShape {
                node: read_node_ref(reader)?,
            };
            let mut model = Model::new(shape, reader.read_token()?);
            model.flags = flags;
            model.variant = reader.read_token()?;
            model.look = reader.read_token()?;
            for axis in model.scale.iter_mut() {
                *axis = reader.read_u16()?;
            }
            ItemData::Model(model)
        }
        ItemKind::Company => ItemData::Company(Company {
            shape: read_slave_shape(reader)?,
            flags,
            name: reader.read_token()?,
            city: reader.read_token()?,
        }),
        ItemKind::Service => ItemData::Service(Service {
            shape: read_slave_shape(reader)?,
            flags,
        }),
        ItemKind::Mover => {
            let model = reader.read_token()?;
            let look = reader.read_token()?;
            let tags = read_tokens(reader)?;
            let speed = reader.read_u16()?;
            let end_delay = reader.read_u16()?;
            let width = reader.read_u16()?;
            let count = reader.read_u16()?;
            let nodes = read_node_refs(reader)?;
            let length_count = reader.read_count(4)?;
            let lengths = (0..length_count)
                .map(|_| reader.read_f32())
                .collect::<FormatResult<Vec<_>>>()?;
            if nodes.len() < 2 || lengths.len() != nodes.len() - 1 {
                return Err(FormatError::InvalidValue {
                    field: "mover path",
                    value: nodes.len() as u64,
                });
            }
            ItemData::Mover(Mover {
                shape: PathShape { nodes, lengths },
                flags,
                model,
                look,
                tags,
                speed,
                end_delay,
                width,
                count,
            })
        }
        ItemKind::Trigger => {
            let nodes = read_node_refs(reader)?;
            let action_count = reader.read_count(12)?;
            let actions = (0..action_count)
                .map(|_| {
                    let name = reader.read_token()?;
                    let parameter_count = reader.read_count(4)?;
                    let parameters = (0..parameter_count)
                        .map(|_| reader.read_f32())
                        .collect::<FormatResult<_>>()?;
                    Ok(TriggerAction { name, parameters })
                })
                .collect::<FormatResult<_>>()?;
            ItemData::Trigger(Trigger {
                shape: PolygonShape { nodes },
                flags,
                actions,
                range: reader.read_u16()?,
            })
        }
        ItemKind::Compound => {
            if nested {
                return Err(FormatError::NestedCompound(uid));
            }
            let anchor = read_node_ref(reader)?;
            let item_count = reader.read_count(MIN_ITEM_RECORD)?;
            for _ in 0..item_count {
                children.push(read_item_record(reader, true)?.item);
            }
            let node_count = reader.read_count(NODE_RECORD)?;
            for _ in 0..node_count {
                child_nodes.push(read_node(reader)?);
            }
            ItemData::Compound(Compound {
                shape: SingleNodeShape { node: anchor },
                flags,
                items: children
                    .iter()
                    .map(|child| Reference::Unresolved(child.uid))
                    .collect(),
                nodes: child_nodes
                    .iter()
                    .map(|node| Reference::Unresolved(node.uid))
                    .collect(),
            })
        }
        ItemKind::MapArea => ItemData::MapArea(MapArea {
            shape: PolygonShape {
                nodes: read_node_refs(reader)?,
            },
            flags,
            material: reader.read_token()?,
        }),
    };

    let mut item = Item::new(uid, data);
    item.bounding_box = bounding_box;
    item.view_distance = view_distance;
    Ok(ParsedItem {
        item,
        children,
        child_nodes,
    })
}

fn read_slave_shape(reader: &mut BinaryReader<'_>) -> FormatResult<SlaveShape> {
    Ok(SlaveShape {
        node: read_node_ref(reader)?,
        prefab: read_item_ref(reader)?,
    })
}

pub fn write_item(writer: &mut BinaryWriter, map: &Map, item: &Item) -> FormatResult<()> {
    if item.uid == 0 || item.uid == u64::MAX {
        return Err(FormatError::InvalidValue {
            field: "item uid",
            value: item.uid,
        });
    }
    if item.view_distance() > MAX_VIEW_DISTANCE {
        return Err(FormatError::ValueOutOfRange {
            field: "view distance",
            value: item.view_distance() as u64,
        });
    }
    writer.write_u32(item.kind().tag());
    writer.write_u64(item.uid);
    for value in item.bounding_box.min.iter().chain(item.bounding_box.max.iter()) {
        writer.write_f32(*value);
    }
    writer.write_flags(item.data.flags());
    writer.write_u8((item.view_distance() / 10) as u8);

    match &item.data {
        ItemData::Road(road) => {
            writer.write_u64(node_uid(map, road.shape.node)?);
            writer.write_u64(node_uid(map, road.shape.forward_node)?);
            writer.write_f32(road.shape.length);
            writer.write_token(road.look);
            writer.write_token(road.variant);
            writer.write_token(road.left_edge);
            writer.write_token(road.right_edge);
            writer.write_token(road.terrain_material);
            writer.write_u16(road.terrain_size);
            writer.write_i16(road.left_offset);
            writer.write_i16(road.right_offset);
        }
        ItemData::Prefab(prefab) => {
            writer.write_token(prefab.model);
            writer.write_token(prefab.variant);
            writer.write_token(prefab.look);
            writer.write_u16(prefab.shape.origin);
            write_node_refs(writer, map, &prefab.shape.nodes)?;
            writer.write_count("slave count", prefab.shape.slaves.len())?;
            for slave in &prefab.shape.slaves {
                writer.write_u64(item_uid(map, *slave)?);
            }
            writer.write_count("corner count", prefab.corners.len())?;
            for corner in &prefab.corners {
                writer.write_token(corner.terrain_material);
                writer.write_u16(corner.color_variant);
            }
        }
        ItemData::Model(model) => {
            writer.write_u64(node_uid(map, model.shape.node)?);
            writer.write_token(model.model);
            writer.write_token(model.variant);
            writer.write_token(model.look);
            for axis in model.scale {
                writer.write_u16(axis);
            }
        }
        ItemData::Company(company) => {
            write_slave_shape(writer, map, &company.shape)?;
            writer.write_token(company.name);
            writer.write_token(company.city);
        }
        ItemData::Service(service) => write_slave_shape(writer, map, &service.shape)?,
        ItemData::Mover(mover) => {
            writer.write_token(mover.model);
            writer.write_token(mover.look);
            write_tokens(writer, &mover.tags)?;
            writer.write_u16(mover.speed);
            writer.write_u16(mover.end_delay);
            writer.write_u16(mover.width);
            writer.write_u16(mover.count);
            write_node_refs(writer, map, &mover.shape.nodes)?;
            writer.write_count("length count", mover.shape.lengths.len())?;
            for length in &mover.shape.lengths {
                writer.write_f32(*length);
            }
        }
        ItemData::Trigger(trigger) => {
            write_node_refs(writer, map, &trigger.shape.nodes)?;
            writer.write_count("action count", trigger.actions.len())?;
            for action in &trigger.actions {
                writer.write_token(action.name);
                writer.write_count("parameter count", action.parameters.len())?;
                for parameter in &action.parameters {
                    writer.write_f32(*parameter);
                }
            }
            writer.write_u16(trigger.range);
        }
        ItemData::Compound(compound) => {
            writer.write_u64(node_uid(map, compound.shape.node)?);
            writer.write_count("child item count", compound.items.len())?;
            for child in &compound.items {
                let child = child
                    .resolved()
                    .and_then(|id| map.item(id))
                    .ok_or(FormatError::UnresolvedReference {
                        kind: "compound item",
                        uid: child.unresolved_uid().unwrap_or(0),
                    })?;
                if child.kind() == ItemKind::Compound {
                    return Err(FormatError::NestedCompound(child.uid));
                }
                write_item(writer, map, child)?;
            }
            writer.write_count("child node count", compound.nodes.len())?;
            for node in &compound.nodes {
                let node = node
                    .resolved()
                    .and_then(|id| map.node(id))
                    .ok_or(FormatError::UnresolvedReference {
                        kind: "compound node",
                        uid: node.unresolved_uid().unwrap_or(0),
                    })?;
                write_node(writer, map, node)?;
            }
        }
        ItemData::MapArea(area) => {
            write_node_refs(writer, map, &area.shape.nodes)?;
            writer.write_token(area.material);
        }
    }
    Ok(())
}

fn write_slave_shape(writer: &mut BinaryWriter, map: &Map, shape: &SlaveShape) -> FormatResult<()> {
    writer.write_u64(node_uid(map, shape.node)?);
    writer.write_u64(item_uid(map, shape.prefab)?);
    Ok(())
}

// ── Zusatzdaten ────────────────────────────────────────────────────

fn read_terrain(reader: &mut BinaryReader<'_>) -> FormatResult<TerrainQuadData> {
    let columns = reader.read_u16()?;
    let rows = reader.read_u16()?;
    let materials = read_tokens(reader)?;
    let cells = reader.take(columns as usize * rows as usize)?.to_vec();
    TerrainQuadData::from_raw(columns, rows, materials, cells).ok_or(FormatError::InvalidValue {
        field: "terrain grid",
        value: columns as u64 * rows as u64,
    })
}

fn write_terrain(writer: &mut BinaryWriter, terrain: &TerrainQuadData) -> FormatResult<()> {
    writer.write_u16(terrain.columns());
    writer.write_u16(terrain.rows());
    write_tokens(writer, &terrain.materials)?;
    writer.write_bytes(terrain.cells());
    Ok(())
}

/// Liest die Zusatzdaten eines Items; der Aufbau hängt vom Typ ab.
pub fn read_payload(reader: &mut BinaryReader<'_>, kind: ItemKind) -> FormatResult<Payload> {
    match kind {
        ItemKind::Road => Ok(Payload::Road {
            left: read_terrain(reader)?,
            right: read_terrain(reader)?,
        }),
        other => Err(FormatError::InvalidValue {
            field: "payload item type",
            value: other.tag() as u64,
        }),
    }
}

/// Schreibt die Zusatzdaten; `false`, wenn der Typ keine hat.
pub fn write_payload(writer: &mut BinaryWriter, data: &ItemData) -> FormatResult<bool> {
    match data {
        ItemData::Road(road) => {
            write_terrain(writer, &road.left_terrain)?;
            write_terrain(writer, &road.right_terrain)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}
