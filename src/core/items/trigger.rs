//! Trigger: offene oder geschlossene Fläche mit Aktionen.

use glam::Vec3;
use ts_map_primitives::{FlagField, Token};

use super::{ItemData, PolygonShape};
use crate::core::container::ItemContainer;
use crate::core::error::{check_range, TopologyResult};
use crate::core::{topology, ItemId};

const FLAG_PARTIAL_ACTIVATION: u32 = 0;
const FLAG_CLOSED: u32 = 1;
const FLAG_ONE_TIME: u32 = 2;
const FLAG_MANUAL: u32 = 3;

/// Aktion, die beim Auslösen ausgeführt wird.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerAction {
    pub name: Token,
    pub parameters: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub shape: PolygonShape,
    pub flags: FlagField,
    pub actions: Vec<TriggerAction>,
    /// Auslöseradius in Dezimetern (×10)
    pub(crate) range: u16,
}

impl Trigger {
    /// Legt einen Trigger an; `closed` verbindet den letzten mit dem ersten Punkt.
    pub fn add<C: ItemContainer + ?Sized>(
        container: &mut C,
        positions: &[Vec3],
        closed: bool,
    ) -> TopologyResult<ItemId> {
        topology::add_polygon(container, positions, 2, |shape| {
            let mut flags = FlagField::default();
            flags.set(FLAG_CLOSED, closed);
            ItemData::Trigger(Trigger {
                shape,
                flags,
                actions: Vec::new(),
                range: 0,
            })
        })
    }

    pub fn is_closed(&self) -> bool {
        self.flags.get(FLAG_CLOSED)
    }

    pub fn set_closed(&mut self, value: bool) {
        self.flags.set(FLAG_CLOSED, value);
    }

    pub fn partial_activation(&self) -> bool {
        self.flags.get(FLAG_PARTIAL_ACTIVATION)
    }

    pub fn set_partial_activation(&mut self, value: bool) {
        self.flags.set(FLAG_PARTIAL_ACTIVATION, value);
    }

    pub fn one_time(&self) -> bool {
        self.flags.get(FLAG_ONE_TIME)
    }

    pub fn set_one_time(&mut self, value: bool) {
        self.flags.set(FLAG_ONE_TIME, value);
    }

    pub fn is_manual(&self) -> bool {
        self.flags.get(FLAG_MANUAL)
    }

    pub fn set_manual(&mut self, value: bool) {
        self.flags.set(FLAG_MANUAL, value);
    }

    pub fn range(&self) -> f32 {
        self.range as f32 / 10.0
    }

    pub fn set_range(&mut self, meters: f32) -> TopologyResult<()> {
        check_range("range", meters as f64, 0.0, u16::MAX as f64 / 10.0)?;
        self.range = (meters * 10.0).round() as u16;
        Ok(())
    }
}
