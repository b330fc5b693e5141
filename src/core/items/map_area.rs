//! Kartenfläche: geschlossenes Polygon für die UI-Karte.

use glam::Vec3;
use ts_map_primitives::{FlagField, Token};

use super::{ItemData, PolygonShape};
use crate::core::container::ItemContainer;
use crate::core::error::TopologyResult;
use crate::core::{topology, ItemId};

const FLAG_DRAW_OVER: u32 = 0;
const COLOR_START: u32 = 1;
const COLOR_BITS: u32 = 3;
const FLAG_SECRET: u32 = 4;

/// Füllfarbe einer Kartenfläche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapAreaColor {
    #[default]
    Road,
    Light,
    Dark,
    Green,
    Nothing,
}

impl MapAreaColor {
    fn from_bits(bits: u32) -> Self {
        match bits {
            1 => MapAreaColor::Light,
            2 => MapAreaColor::Dark,
            3 => MapAreaColor::Green,
            4 => MapAreaColor::Nothing,
            _ => MapAreaColor::Road,
        }
    }

    fn bits(self) -> u32 {
        match self {
            MapAreaColor::Road => 0,
            MapAreaColor::Light => 1,
            MapAreaColor::Dark => 2,
            MapAreaColor::Green => 3,
            MapAreaColor::Nothing => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapArea {
    pub shape: PolygonShape,
    pub flags: FlagField,
    pub material: Token,
}

impl MapArea {
    /// Legt eine Fläche aus mindestens drei Eckpunkten an.
    pub fn add<C: ItemContainer + ?Sized>(
        container: &mut C,
        positions: &[Vec3],
    ) -> TopologyResult<ItemId> {
        topology::add_polygon(container, positions, 3, |shape| {
            ItemData::MapArea(MapArea {
                shape,
                flags: FlagField::default(),
                material: Token::EMPTY,
            })
        })
    }

    pub fn draw_over(&self) -> bool {
        self.flags.get(FLAG_DRAW_OVER)
    }

    pub fn set_draw_over(&mut self, value: bool) {
        self.flags.set(FLAG_DRAW_OVER, value);
    }

    pub fn color(&self) -> MapAreaColor {
        MapAreaColor::from_bits(self.flags.get_bit_string(COLOR_START, COLOR_BITS))
    }

    pub fn set_color(&mut self, color: MapAreaColor) -> TopologyResult<()> {
        self.flags.set_bit_string(COLOR_START, COLOR_BITS, color.bits())?;
        Ok(())
    }

    pub fn is_secret(&self) -> bool {
        self.flags.get(FLAG_SECRET)
    }

    pub fn set_secret(&mut self, value: bool) {
        self.flags.set(FLAG_SECRET, value);
    }
}
