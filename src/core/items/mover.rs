//! Mover: animiertes Modell, das einem Pfad folgt.

use glam::Vec3;
use ts_map_primitives::{FlagField, Token};

use super::{ItemData, PathShape};
use crate::core::container::ItemContainer;
use crate::core::error::{check_range, TopologyResult};
use crate::core::{propagation, topology, ItemId, Map, NodeId};

const FLAG_CURVED_PATH: u32 = 0;
const FLAG_ACTIVE_DAY: u32 = 1;
const FLAG_ACTIVE_NIGHT: u32 = 2;
const FLAG_FOLLOW_DIRECTION: u32 = 3;
const FLAG_USE_SOUND: u32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Mover {
    pub shape: PathShape,
    pub flags: FlagField,
    pub model: Token,
    pub look: Token,
    pub tags: Vec<Token>,
    /// m/s ×100
    pub(crate) speed: u16,
    /// Sekunden ×10
    pub(crate) end_delay: u16,
    /// Meter ×100
    pub(crate) width: u16,
    pub count: u16,
}

impl Mover {
    pub fn add<C: ItemContainer + ?Sized>(
        container: &mut C,
        positions: &[Vec3],
        model: Token,
    ) -> TopologyResult<ItemId> {
        topology::add_path(container, positions, |shape| {
            let mut flags = FlagField::default();
            flags.set(FLAG_ACTIVE_DAY, true);
            flags.set(FLAG_ACTIVE_NIGHT, true);
            ItemData::Mover(Mover {
                shape,
                flags,
                model,
                look: Token::EMPTY,
                tags: Vec::new(),
                speed: 100,
                end_delay: 0,
                width: 0,
                count: 1,
            })
        })
    }

    /// Hängt einen Pfadpunkt an das Ende.
    pub fn append(map: &mut Map, mover: ItemId, position: Vec3) -> TopologyResult<NodeId> {
        topology::append_path_node(map, mover, position)
    }

    /// Setzt einen Pfadpunkt an den Anfang.
    pub fn prepend(map: &mut Map, mover: ItemId, position: Vec3) -> TopologyResult<NodeId> {
        topology::prepend_path_node(map, mover, position)
    }

    /// Position nach `distance` Metern entlang des Pfades; `None` hinter dem Ende.
    pub fn position_at(map: &Map, mover: ItemId, distance: f32) -> Option<Vec3> {
        propagation::point_at_distance(map, mover, distance)
    }

    /// Gesamtlänge aus den gespeicherten Segmentlängen.
    pub fn total_length(&self) -> f32 {
        self.shape.lengths.iter().sum()
    }

    /// Segmentlängen werden über die Spline-Bogenlänge statt gerade gemessen.
    pub fn use_curved_path(&self) -> bool {
        self.flags.get(FLAG_CURVED_PATH)
    }

    pub fn set_use_curved_path(&mut self, value: bool) {
        self.flags.set(FLAG_CURVED_PATH, value);
    }

    pub fn active_during_day(&self) -> bool {
        self.flags.get(FLAG_ACTIVE_DAY)
    }

    pub fn set_active_during_day(&mut self, value: bool) {
        self.flags.set(FLAG_ACTIVE_DAY, value);
    }

    pub fn active_during_night(&self) -> bool {
        self.flags.get(FLAG_ACTIVE_NIGHT)
    }

    pub fn set_active_during_night(&mut self, value: bool) {
        self.flags.set(FLAG_ACTIVE_NIGHT, value);
    }

    pub fn follow_direction(&self) -> bool {
        self.flags.get(FLAG_FOLLOW_DIRECTION)
    }

    pub fn set_follow_direction(&mut self, value: bool) {
        self.flags.set(FLAG_FOLLOW_DIRECTION, value);
    }

    pub fn use_sound(&self) -> bool {
        self.flags.get(FLAG_USE_SOUND)
    }

    pub fn set_use_sound(&mut self, value: bool) {
        self.flags.set(FLAG_USE_SOUND, value);
    }

    pub fn speed(&self) -> f32 {
        self.speed as f32 / 100.0
    }

    pub fn set_speed(&mut self, meters_per_second: f32) -> TopologyResult<()> {
        check_range("speed", meters_per_second as f64, 0.0, u16::MAX as f64 / 100.0)?;
        self.speed = (meters_per_second * 100.0).round() as u16;
        Ok(())
    }

    pub fn end_delay(&self) -> f32 {
        self.end_delay as f32 / 10.0
    }

    pub fn set_end_delay(&mut self, seconds: f32) -> TopologyResult<()> {
        check_range("end_delay", seconds as f64, 0.0, u16::MAX as f64 / 10.0)?;
        self.end_delay = (seconds * 10.0).round() as u16;
        Ok(())
    }

    pub fn width(&self) -> f32 {
        self.width as f32 / 100.0
    }

    pub fn set_width(&mut self, meters: f32) -> TopologyResult<()> {
        check_range("width", meters as f64, 0.0, u16::MAX as f64 / 100.0)?;
        self.width = (meters * 100.0).round() as u16;
        Ok(())
    }
}
