//! Globale Auflösungsphase: ersetzt UIDs durch Arena-Handles.
//!
//! Läuft erst, wenn alle Sektoren geparst und registriert sind, da Items
//! über Sektorgrenzen hinweg auf Nodes und Items verweisen.

use std::collections::{HashMap, HashSet};

use super::error::{FormatError, FormatResult};
use crate::core::{Handle, ItemData, ItemId, Map, Reference};

/// Ergebnis der Auflösung.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOutcome {
    /// Verworfene Referenzen (nur im nachsichtigen Modus)
    pub dropped_references: usize,
    /// UIDs entfernter Items, deren Form nicht auflösbar war
    pub removed_items: Vec<u64>,
}

struct Resolver {
    strict: bool,
    error: Option<FormatError>,
    dropped: usize,
}

impl Resolver {
    fn miss(&mut self, kind: &'static str, uid: u64) {
        if self.strict {
            self.error
                .get_or_insert(FormatError::UnresolvedReference { kind, uid });
        } else {
            log::warn!("Referenz auf {kind} {uid:#x} nicht gefunden, wird verworfen");
            self.dropped += 1;
        }
    }

    /// Löst eine Referenz auf; `false`, wenn die UID unbekannt ist.
    fn resolve<T>(
        &mut self,
        reference: &mut Reference<Handle<T>>,
        table: &HashMap<u64, Handle<T>>,
        kind: &'static str,
    ) -> bool {
        match *reference {
            Reference::Resolved(_) => true,
            Reference::Unresolved(uid) => match table.get(&uid) {
                Some(handle) => {
                    *reference = Reference::Resolved(*handle);
                    true
                }
                None => {
                    self.miss(kind, uid);
                    false
                }
            },
        }
    }
}

/// Löst alle Referenzen der Karte auf.
///
/// Strikt: der erste unbekannte Verweis bricht mit
/// [`FormatError::UnresolvedReference`] ab. Nachsichtig: tote Slots und
/// Listeneinträge werden verworfen, Items mit unvollständiger Form entfernt.
pub fn resolve_references(map: &mut Map, strict: bool) -> FormatResult<ResolveOutcome> {
    let (node_uids, item_uids) = map.uid_snapshot();
    let mut resolver = Resolver {
        strict,
        error: None,
        dropped: 0,
    };

    for id in map.node_handles() {
        let Some(node) = map.node_mut(id) else {
            continue;
        };
        for slot in [&mut node.backward_item, &mut node.forward_item] {
            let missing = match slot {
                Some(reference) => !resolver.resolve(reference, &item_uids, "item"),
                None => false,
            };
            if missing {
                *slot = None;
            }
        }
    }

    let mut broken = Vec::new();
    for id in map.item_handles() {
        let Some(item) = map.item_mut(id) else {
            continue;
        };
        let mut complete = true;
        item.data.shape_mut().for_each_node_ref(|reference| {
            complete &= resolver.resolve(reference, &node_uids, "node");
        });
        match &mut item.data {
            ItemData::Prefab(prefab) => prefab
                .shape
                .slaves
                .retain_mut(|r| resolver.resolve(r, &item_uids, "prefab slave")),
            ItemData::Company(company) => {
                complete &= resolver.resolve(&mut company.shape.prefab, &item_uids, "prefab");
            }
            ItemData::Service(service) => {
                complete &= resolver.resolve(&mut service.shape.prefab, &item_uids, "prefab");
            }
            ItemData::Compound(compound) => {
                compound
                    .items
                    .retain_mut(|r| resolver.resolve(r, &item_uids, "compound item"));
                compound
                    .nodes
                    .retain_mut(|r| resolver.resolve(r, &node_uids, "compound node"));
            }
            _ => {}
        }
        if !complete {
            broken.push(id);
        }
    }

    if let Some(error) = resolver.error {
        return Err(error);
    }

    let mut outcome = ResolveOutcome {
        dropped_references: resolver.dropped,
        removed_items: Vec::new(),
    };
    while !broken.is_empty() {
        for id in broken.drain(..) {
            if let Some(item) = map.remove_item(id) {
                log::warn!(
                    "{} {:#x} verweist auf fehlende Nodes und wird entfernt",
                    item.kind().name(),
                    item.uid
                );
                outcome.removed_items.push(item.uid);
            }
        }
        broken = purge_dead_item_refs(map);
    }
    Ok(outcome)
}

/// Entfernt Verweise auf gelöschte Items und liefert Items, die dadurch
/// unvollständig geworden sind (Slaves ohne Prefab).
fn purge_dead_item_refs(map: &mut Map) -> Vec<ItemId> {
    let alive: HashSet<ItemId> = map.items().map(|(id, _)| id).collect();
    let is_alive = |r: &Reference<ItemId>| r.resolved().is_some_and(|id| alive.contains(&id));

    for id in map.node_handles() {
        if let Some(node) = map.node_mut(id) {
            for slot in [&mut node.backward_item, &mut node.forward_item] {
                if slot.as_ref().is_some_and(|r| !is_alive(r)) {
                    *slot = None;
                }
            }
        }
    }

    let mut broken = Vec::new();
    for id in map.item_handles() {
        let Some(item) = map.item_mut(id) else {
            continue;
        };
        match &mut item.data {
            ItemData::Prefab(prefab) => prefab.shape.slaves.retain(is_alive),
            ItemData::Compound(compound) => compound.items.retain(is_alive),
            ItemData::Company(company) if !is_alive(&company.shape.prefab) => broken.push(id),
            ItemData::Service(service) if !is_alive(&service.shape.prefab) => broken.push(id),
            _ => {}
        }
    }
    broken
}
