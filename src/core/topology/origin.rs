//! Ursprungs-Node eines Prefabs umsetzen.

use crate::core::error::{TopologyError, TopologyResult};
use crate::core::items::ItemData;
use crate::core::{ItemId, Map};

use super::chain::wrong_shape;
use super::recolor;

/// Macht den Node an `index` zum Ursprung (Anker) des Prefabs.
///
/// Schlägt fehl, wenn der Index ausserhalb liegt oder der Ziel-Node bereits
/// mit einem anderen Item verbunden ist.
pub fn change_origin(map: &mut Map, prefab: ItemId, index: usize) -> TopologyResult<()> {
    let entry = map.item_entry(prefab)?;
    let ItemData::Prefab(data) = &entry.data else {
        return Err(wrong_shape(entry, "prefab"));
    };
    let len = data.shape.nodes.len();
    let Some(target) = data.shape.nodes.get(index).map(|r| r.handle()) else {
        return Err(TopologyError::IndexOutOfRange { index, len });
    };
    let prefab_uid = entry.uid;
    let target_node = map.node_entry(target)?;
    if target_node.items().any(|item| item != prefab) {
        return Err(TopologyError::OriginOccupied {
            prefab: prefab_uid,
            node: target_node.uid,
        });
    }
    let origin = u16::try_from(index).map_err(|_| TopologyError::IndexOutOfRange { index, len })?;

    let nodes = {
        let entry = map.item_entry_mut(prefab)?;
        if let ItemData::Prefab(data) = &mut entry.data {
            data.shape.origin = origin;
        }
        entry.nodes()
    };
    map.place_item(prefab);
    for node in nodes {
        recolor(map, node);
        map.refresh_node_sectors(node);
    }
    log::debug!("Prefab {prefab_uid:#x}: Ursprung auf Node-Index {index} gesetzt");
    Ok(())
}
