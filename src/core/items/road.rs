//! Straßensegment (Polyline) mit Terrain-Gitter als Zusatzdaten.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use ts_map_primitives::{FlagField, Token};

use super::{Item, ItemData, PolylineShape};
use crate::core::container::ItemContainer;
use crate::core::error::{check_range, TopologyError, TopologyResult};
use crate::core::{topology, ItemId, Map};

const FLAG_HIDDEN_IN_UI_MAP: u32 = 0;
const FLAG_SECRET: u32 = 1;
const FLAG_LEFT_HAND_TRAFFIC: u32 = 2;
const FLAG_NO_BOUNDARY: u32 = 3;
const TRANSITION_START: u32 = 4;
const TRANSITION_BITS: u32 = 2;
const FLAG_STRAIGHT: u32 = 6;
const FLAG_GPS_AVOID: u32 = 7;
const FLAG_NO_AI_VEHICLES: u32 = 8;
const FLAG_WATER_REFLECTION: u32 = 9;
const STEP_SIZE_START: u32 = 12;
const STEP_SIZE_BITS: u32 = 2;

/// Übergang des Straßenbelags am Segmentende.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoadTransition {
    #[default]
    Standard,
    Smooth,
    Sharp,
    Ramp,
}

impl RoadTransition {
    fn from_bits(bits: u32) -> Self {
        match bits {
            1 => RoadTransition::Smooth,
            2 => RoadTransition::Sharp,
            3 => RoadTransition::Ramp,
            _ => RoadTransition::Standard,
        }
    }

    fn bits(self) -> u32 {
        match self {
            RoadTransition::Standard => 0,
            RoadTransition::Smooth => 1,
            RoadTransition::Sharp => 2,
            RoadTransition::Ramp => 3,
        }
    }
}

/// Auflösung des Terrain-Gitters entlang der Straße.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSize {
    #[default]
    Meters4,
    Meters2,
    Meters12,
    Meters16,
}

impl StepSize {
    fn from_bits(bits: u32) -> Self {
        match bits {
            1 => StepSize::Meters2,
            2 => StepSize::Meters12,
            3 => StepSize::Meters16,
            _ => StepSize::Meters4,
        }
    }

    fn bits(self) -> u32 {
        match self {
            StepSize::Meters4 => 0,
            StepSize::Meters2 => 1,
            StepSize::Meters12 => 2,
            StepSize::Meters16 => 3,
        }
    }

    pub fn meters(self) -> f32 {
        match self {
            StepSize::Meters2 => 2.0,
            StepSize::Meters4 => 4.0,
            StepSize::Meters12 => 12.0,
            StepSize::Meters16 => 16.0,
        }
    }

    /// Spaltenzahl des Terrain-Gitters für eine Segmentlänge.
    pub fn columns_for(self, length: f32) -> u16 {
        ((length / self.meters()).ceil() as u16).max(1)
    }
}

/// Terrain-Gitter einer Straßenseite.
///
/// Zellen liegen spaltenweise: `cells[column * rows + row]` ist ein Index in
/// `materials`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TerrainQuadData {
    columns: u16,
    rows: u16,
    pub materials: Vec<Token>,
    cells: Vec<u8>,
}

impl TerrainQuadData {
    /// Leeres Gitter der angegebenen Größe.
    pub fn new(columns: u16, rows: u16) -> Self {
        Self {
            columns,
            rows,
            materials: Vec::new(),
            cells: vec![0; columns as usize * rows as usize],
        }
    }

    /// Gitter aus Rohdaten; `None` wenn die Zellenzahl nicht passt.
    pub fn from_raw(columns: u16, rows: u16, materials: Vec<Token>, cells: Vec<u8>) -> Option<Self> {
        (cells.len() == columns as usize * rows as usize).then_some(Self {
            columns,
            rows,
            materials,
            cells,
        })
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn cell(&self, column: u16, row: u16) -> Option<u8> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.cells
            .get(column as usize * self.rows as usize + row as usize)
            .copied()
    }

    pub fn set_cell(&mut self, column: u16, row: u16, material: u8) -> TopologyResult<()> {
        if column >= self.columns {
            return Err(TopologyError::IndexOutOfRange {
                index: column as usize,
                len: self.columns as usize,
            });
        }
        if row >= self.rows {
            return Err(TopologyError::IndexOutOfRange {
                index: row as usize,
                len: self.rows as usize,
            });
        }
        let index = column as usize * self.rows as usize + row as usize;
        self.cells[index] = material;
        Ok(())
    }

    /// Ändert die Gittergröße; überlappende Zellen bleiben erhalten.
    pub fn resize(&mut self, columns: u16, rows: u16) {
        if columns == self.columns && rows == self.rows {
            return;
        }
        let mut cells = vec![0; columns as usize * rows as usize];
        for column in 0..columns.min(self.columns) {
            for row in 0..rows.min(self.rows) {
                cells[column as usize * rows as usize + row as usize] =
                    self.cells[column as usize * self.rows as usize + row as usize];
            }
        }
        self.columns = columns;
        self.rows = rows;
        self.cells = cells;
    }
}

/// Straßensegment.
#[derive(Debug, Clone, PartialEq)]
pub struct Road {
    pub shape: PolylineShape,
    pub flags: FlagField,
    pub look: Token,
    pub variant: Token,
    pub left_edge: Token,
    pub right_edge: Token,
    pub terrain_material: Token,
    /// Terrain-Breite in Dezimetern (×10)
    pub(crate) terrain_size: u16,
    /// Seitenversatz in Zentimetern (×100)
    pub(crate) left_offset: i16,
    pub(crate) right_offset: i16,
    pub left_terrain: TerrainQuadData,
    pub right_terrain: TerrainQuadData,
}

impl Road {
    pub fn new(shape: PolylineShape, look: Token) -> Self {
        Self {
            shape,
            flags: FlagField::default(),
            look,
            variant: Token::EMPTY,
            left_edge: Token::EMPTY,
            right_edge: Token::EMPTY,
            terrain_material: Token::EMPTY,
            terrain_size: 0,
            left_offset: 0,
            right_offset: 0,
            left_terrain: TerrainQuadData::default(),
            right_terrain: TerrainQuadData::default(),
        }
    }

    /// Legt ein Straßensegment von `start` nach `end` an.
    pub fn add<C: ItemContainer + ?Sized>(
        container: &mut C,
        start: Vec3,
        end: Vec3,
        look: Token,
    ) -> TopologyResult<ItemId> {
        let flags = Road::default_flags(container.map_mut().default_step_size())?;
        topology::add_polyline(container, start, end, |shape| {
            let mut road = Road::new(shape, look);
            road.flags = flags;
            ItemData::Road(road)
        })
    }

    /// Hängt ein Segment an das Ende von `road`.
    ///
    /// Mit `clone_settings` übernimmt das neue Segment alle Einstellungen
    /// (außer den Terrain-Zellen), sonst nur den Look und die Standard-Schrittweite
    /// der Karte.
    pub fn append(
        map: &mut Map,
        road: ItemId,
        position: Vec3,
        clone_settings: bool,
    ) -> TopologyResult<ItemId> {
        let flags = Road::default_flags(map.default_step_size())?;
        topology::append_polyline(map, road, position, |source, shape| {
            Road::derive(source, shape, clone_settings, flags)
        })
    }

    /// Setzt ein Segment vor den Anfang von `road`.
    pub fn prepend(
        map: &mut Map,
        road: ItemId,
        position: Vec3,
        clone_settings: bool,
    ) -> TopologyResult<ItemId> {
        let flags = Road::default_flags(map.default_step_size())?;
        topology::prepend_polyline(map, road, position, |source, shape| {
            Road::derive(source, shape, clone_settings, flags)
        })
    }

    /// Flags eines neuen Segments: nur die Schrittweite ist gesetzt.
    fn default_flags(step: StepSize) -> TopologyResult<FlagField> {
        let mut flags = FlagField::default();
        flags.set_bit_string(STEP_SIZE_START, STEP_SIZE_BITS, step.bits())?;
        Ok(flags)
    }

    fn derive(
        source: &Item,
        shape: PolylineShape,
        clone_settings: bool,
        flags: FlagField,
    ) -> ItemData {
        let look = match &source.data {
            ItemData::Road(road) if clone_settings => {
                let mut copy = road.clone();
                copy.shape = shape;
                copy.left_terrain = TerrainQuadData::default();
                copy.right_terrain = TerrainQuadData::default();
                return ItemData::Road(copy);
            }
            ItemData::Road(road) => road.look,
            _ => Token::EMPTY,
        };
        let mut road = Road::new(shape, look);
        road.flags = flags;
        ItemData::Road(road)
    }

    pub fn length(&self) -> f32 {
        self.shape.length
    }

    pub fn is_hidden_in_ui_map(&self) -> bool {
        self.flags.get(FLAG_HIDDEN_IN_UI_MAP)
    }

    pub fn set_hidden_in_ui_map(&mut self, value: bool) {
        self.flags.set(FLAG_HIDDEN_IN_UI_MAP, value);
    }

    pub fn is_secret(&self) -> bool {
        self.flags.get(FLAG_SECRET)
    }

    pub fn set_secret(&mut self, value: bool) {
        self.flags.set(FLAG_SECRET, value);
    }

    pub fn left_hand_traffic(&self) -> bool {
        self.flags.get(FLAG_LEFT_HAND_TRAFFIC)
    }

    pub fn set_left_hand_traffic(&mut self, value: bool) {
        self.flags.set(FLAG_LEFT_HAND_TRAFFIC, value);
    }

    pub fn no_boundary(&self) -> bool {
        self.flags.get(FLAG_NO_BOUNDARY)
    }

    pub fn set_no_boundary(&mut self, value: bool) {
        self.flags.set(FLAG_NO_BOUNDARY, value);
    }

    /// Gerades Segment: Länge ist die Sehnenlänge.
    pub fn is_straight(&self) -> bool {
        self.flags.get(FLAG_STRAIGHT)
    }

    pub fn set_straight(&mut self, value: bool) {
        self.flags.set(FLAG_STRAIGHT, value);
    }

    pub fn gps_avoid(&self) -> bool {
        self.flags.get(FLAG_GPS_AVOID)
    }

    pub fn set_gps_avoid(&mut self, value: bool) {
        self.flags.set(FLAG_GPS_AVOID, value);
    }

    pub fn no_ai_vehicles(&self) -> bool {
        self.flags.get(FLAG_NO_AI_VEHICLES)
    }

    pub fn set_no_ai_vehicles(&mut self, value: bool) {
        self.flags.set(FLAG_NO_AI_VEHICLES, value);
    }

    pub fn water_reflection(&self) -> bool {
        self.flags.get(FLAG_WATER_REFLECTION)
    }

    pub fn set_water_reflection(&mut self, value: bool) {
        self.flags.set(FLAG_WATER_REFLECTION, value);
    }

    pub fn transition(&self) -> RoadTransition {
        RoadTransition::from_bits(self.flags.get_bit_string(TRANSITION_START, TRANSITION_BITS))
    }

    pub fn set_transition(&mut self, transition: RoadTransition) -> TopologyResult<()> {
        self.flags
            .set_bit_string(TRANSITION_START, TRANSITION_BITS, transition.bits())?;
        Ok(())
    }

    pub fn step_size(&self) -> StepSize {
        StepSize::from_bits(self.flags.get_bit_string(STEP_SIZE_START, STEP_SIZE_BITS))
    }

    /// Setzt die Schrittweite und passt die Terrain-Gitter an.
    pub fn set_step_size(&mut self, step: StepSize) -> TopologyResult<()> {
        self.flags
            .set_bit_string(STEP_SIZE_START, STEP_SIZE_BITS, step.bits())?;
        self.update_terrain_grid();
        Ok(())
    }

    /// Terrain-Breite in Metern.
    pub fn terrain_size(&self) -> f32 {
        self.terrain_size as f32 / 10.0
    }

    /// Setzt die Terrain-Breite (0 bis 6553.5 m, 0.1-m-Raster).
    pub fn set_terrain_size(&mut self, meters: f32) -> TopologyResult<()> {
        check_range("terrain_size", meters as f64, 0.0, u16::MAX as f64 / 10.0)?;
        self.terrain_size = (meters * 10.0).round() as u16;
        self.update_terrain_grid();
        Ok(())
    }

    pub fn left_offset(&self) -> f32 {
        self.left_offset as f32 / 100.0
    }

    pub fn set_left_offset(&mut self, meters: f32) -> TopologyResult<()> {
        self.left_offset = encode_offset("left_offset", meters)?;
        Ok(())
    }

    pub fn right_offset(&self) -> f32 {
        self.right_offset as f32 / 100.0
    }

    pub fn set_right_offset(&mut self, meters: f32) -> TopologyResult<()> {
        self.right_offset = encode_offset("right_offset", meters)?;
        Ok(())
    }

    /// Zeilen des Terrain-Gitters aus Terrain-Breite und Schrittweite.
    pub fn terrain_rows(&self) -> u16 {
        if self.terrain_size == 0 {
            return 0;
        }
        ((self.terrain_size() / self.step_size().meters()).ceil() as u16).max(1)
    }

    /// Spalten des Terrain-Gitters aus Länge und Schrittweite.
    pub fn terrain_columns(&self) -> u16 {
        self.step_size().columns_for(self.shape.length)
    }

    /// Passt beide Terrain-Gitter an Länge, Breite und Schrittweite an.
    pub fn update_terrain_grid(&mut self) {
        let columns = self.terrain_columns();
        let rows = self.terrain_rows();
        self.left_terrain.resize(columns, rows);
        self.right_terrain.resize(columns, rows);
    }
}

fn encode_offset(field: &'static str, meters: f32) -> TopologyResult<i16> {
    check_range(
        field,
        meters as f64,
        i16::MIN as f64 / 100.0,
        i16::MAX as f64 / 100.0,
    )?;
    Ok((meters * 100.0).round() as i16)
}
