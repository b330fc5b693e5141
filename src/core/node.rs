//! Node: Festkomma-Position, Rotation und zwei Item-Slots.

use std::collections::BTreeSet;

use glam::{Quat, Vec3};
use ts_map_primitives::FlagField;

use super::error::{check_range, TopologyResult};
use super::{Direction, ItemId, Reference, SectorCoord};

/// Festkomma-Skalierung der Positionen (1/256 Meter).
pub const POSITION_SCALE: f32 = 256.0;

/// Grösster darstellbarer Koordinatenbetrag in Metern.
pub const MAX_COORDINATE: f32 = i32::MAX as f32 / POSITION_SCALE;

const FLAG_RED: u32 = 0;
const FLAG_COUNTRY_BORDER: u32 = 1;
const BYTE_FORWARD_COUNTRY: u32 = 1;
const BYTE_BACKWARD_COUNTRY: u32 = 2;
const FLAG_CURVE_LOCATOR: u32 = 24;
const FLAG_FREE_ROTATION: u32 = 25;

/// Position in Festkomma-Darstellung, exakt wie auf der Platte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FixedVec3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl FixedVec3 {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Wandelt eine Weltposition um; nicht darstellbare Werte sind ein Fehler.
    pub fn from_vec3(position: Vec3) -> TopologyResult<Self> {
        let max = MAX_COORDINATE as f64;
        check_range("position.x", position.x as f64, -max, max)?;
        check_range("position.y", position.y as f64, -max, max)?;
        check_range("position.z", position.z as f64, -max, max)?;
        Ok(Self {
            x: (position.x * POSITION_SCALE).round() as i32,
            y: (position.y * POSITION_SCALE).round() as i32,
            z: (position.z * POSITION_SCALE).round() as i32,
        })
    }

    /// Weltposition in Metern.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(
            self.x as f32 / POSITION_SCALE,
            self.y as f32 / POSITION_SCALE,
            self.z as f32 / POSITION_SCALE,
        )
    }
}

/// Besitzer eines Nodes oder Items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Owner {
    /// Direkt in der Karte
    #[default]
    Root,
    /// Kind eines Compound-Items
    Compound(ItemId),
}

/// Punkt im Straßengraphen.
///
/// Ein Node verweist auf höchstens ein Item in jeder Richtung. Rot ("Anker")
/// markiert den Node, über den ein Item sich selbst verankert.
#[derive(Debug, Clone)]
pub struct Node {
    /// Eindeutige Kennung (nie 0)
    pub uid: u64,
    position: FixedVec3,
    /// Ausrichtung; `rotation * NEG_Z` ist die Vorwärtsrichtung
    pub rotation: Quat,
    pub backward_item: Option<Reference<ItemId>>,
    pub forward_item: Option<Reference<ItemId>>,
    pub flags: FlagField,
    pub(crate) owner: Owner,
    pub(crate) sectors: BTreeSet<SectorCoord>,
}

impl Node {
    /// Erstellt einen unverbundenen Node.
    pub fn new(uid: u64, position: FixedVec3, is_red: bool) -> Self {
        let mut node = Self {
            uid,
            position,
            rotation: Quat::IDENTITY,
            backward_item: None,
            forward_item: None,
            flags: FlagField::default(),
            owner: Owner::Root,
            sectors: BTreeSet::new(),
        };
        node.set_red(is_red);
        node
    }

    /// Weltposition in Metern.
    pub fn position(&self) -> Vec3 {
        self.position.to_vec3()
    }

    /// Position in Festkomma-Darstellung.
    pub fn fixed_position(&self) -> FixedVec3 {
        self.position
    }

    /// Nur über [`crate::core::Map::move_node`], damit der Spatial-Index stimmt.
    pub(crate) fn set_fixed_position(&mut self, position: FixedVec3) {
        self.position = position;
    }

    /// Vorwärtsrichtung aus der Rotation.
    pub fn direction(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn is_red(&self) -> bool {
        self.flags.get(FLAG_RED)
    }

    pub fn set_red(&mut self, red: bool) {
        self.flags.set(FLAG_RED, red);
    }

    pub fn is_country_border(&self) -> bool {
        self.flags.get(FLAG_COUNTRY_BORDER)
    }

    pub fn set_country_border(&mut self, value: bool) {
        self.flags.set(FLAG_COUNTRY_BORDER, value);
    }

    /// Länder-ID in Vorwärtsrichtung.
    pub fn forward_country(&self) -> u8 {
        self.flags.get_byte(BYTE_FORWARD_COUNTRY)
    }

    pub fn set_forward_country(&mut self, country: u8) {
        self.flags.set_byte(BYTE_FORWARD_COUNTRY, country);
    }

    /// Länder-ID in Rückwärtsrichtung.
    pub fn backward_country(&self) -> u8 {
        self.flags.get_byte(BYTE_BACKWARD_COUNTRY)
    }

    pub fn set_backward_country(&mut self, country: u8) {
        self.flags.set_byte(BYTE_BACKWARD_COUNTRY, country);
    }

    pub fn is_curve_locator(&self) -> bool {
        self.flags.get(FLAG_CURVE_LOCATOR)
    }

    pub fn set_curve_locator(&mut self, value: bool) {
        self.flags.set(FLAG_CURVE_LOCATOR, value);
    }

    /// Rotation wird bei der Neuberechnung nicht überschrieben.
    pub fn has_free_rotation(&self) -> bool {
        self.flags.get(FLAG_FREE_ROTATION)
    }

    pub fn set_free_rotation(&mut self, value: bool) {
        self.flags.set(FLAG_FREE_ROTATION, value);
    }

    /// Aufgelöstes Item in Vorwärtsrichtung.
    pub fn forward(&self) -> Option<ItemId> {
        self.forward_item.map(|r| r.handle())
    }

    /// Aufgelöstes Item in Rückwärtsrichtung.
    pub fn backward(&self) -> Option<ItemId> {
        self.backward_item.map(|r| r.handle())
    }

    /// Item im angegebenen Slot.
    pub fn item_in(&self, direction: Direction) -> Option<ItemId> {
        match direction {
            Direction::Backward => self.backward(),
            Direction::Forward => self.forward(),
        }
    }

    pub(crate) fn set_item_in(&mut self, direction: Direction, item: Option<ItemId>) {
        let reference = item.map(Reference::Resolved);
        match direction {
            Direction::Backward => self.backward_item = reference,
            Direction::Forward => self.forward_item = reference,
        }
    }

    /// Slot, in dem `item` steht.
    pub fn slot_of(&self, item: ItemId) -> Option<Direction> {
        if self.forward() == Some(item) {
            Some(Direction::Forward)
        } else if self.backward() == Some(item) {
            Some(Direction::Backward)
        } else {
            None
        }
    }

    /// Alle referenzierten Items (0 bis 2).
    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.backward().into_iter().chain(self.forward())
    }

    /// Kein Item verweist mehr auf diesen Node.
    pub fn is_orphaned(&self) -> bool {
        self.backward_item.is_none() && self.forward_item.is_none()
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Sektoren der Root-Items, die diesen Node referenzieren.
    pub fn sectors(&self) -> impl Iterator<Item = SectorCoord> + '_ {
        self.sectors.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fixed_position_roundtrip() {
        let fixed = FixedVec3::from_vec3(Vec3::new(10.5, -3.25, 1000.0)).unwrap();
        assert_eq!(fixed, FixedVec3::new(2688, -832, 256_000));
        assert_eq!(fixed.to_vec3(), Vec3::new(10.5, -3.25, 1000.0));
    }

    #[test]
    fn test_fixed_position_rejects_out_of_range() {
        assert!(FixedVec3::from_vec3(Vec3::new(1.0e8, 0.0, 0.0)).is_err());
        assert!(FixedVec3::from_vec3(Vec3::new(f32::NAN, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_flag_accessors_use_documented_bits() {
        let mut node = Node::new(1, FixedVec3::default(), true);
        node.set_forward_country(7);
        node.set_backward_country(9);
        node.set_free_rotation(true);
        node.set_country_border(true);

        assert!(node.is_red());
        assert_eq!(
            node.flags.bits(),
            1 | (1 << 1) | (7 << 8) | (9 << 16) | (1 << 25)
        );
        assert!(!node.is_curve_locator());
    }

    #[test]
    fn test_default_direction_is_negative_z() {
        let node = Node::new(1, FixedVec3::default(), false);
        let dir = node.direction();
        assert_relative_eq!(dir.z, -1.0);
        assert!(node.is_orphaned());
    }
}
