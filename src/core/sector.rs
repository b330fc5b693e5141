//! Sektoren: räumliche Partition der Karte und Einheit der Dateiablage.

use std::fmt;
use std::sync::OnceLock;

use glam::Vec3;
use indexmap::IndexSet;
use regex::Regex;
use ts_map_primitives::{FlagField, Token};

use super::ItemId;

/// Standard-Kantenlänge eines Sektors in Metern.
pub const DEFAULT_SECTOR_SIZE: f32 = 4000.0;

/// Sektor-Koordinate (`floor(position / sector_size)` auf X und Z).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SectorCoord {
    pub x: i32,
    pub z: i32,
}

impl SectorCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Sektor, in dem `position` liegt.
    pub fn from_position(position: Vec3, sector_size: f32) -> Self {
        Self {
            x: (position.x / sector_size).floor() as i32,
            z: (position.z / sector_size).floor() as i32,
        }
    }

    /// Dateistamm, z.B. `sec+0001-0002`.
    pub fn file_stem(self) -> String {
        format!("sec{:+05}{:+05}", self.x, self.z)
    }

    /// Parst `sec+0001-0002.base` bzw. den reinen Dateistamm.
    pub fn parse_file_name(name: &str) -> Option<(Self, SectorFileKind)> {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        let pattern = PATTERN
            .get_or_init(|| Regex::new(r"^sec([+-]\d{4})([+-]\d{4})\.(base|aux|data|desc)$").ok())
            .as_ref()?;
        let caps = pattern.captures(name)?;
        let x = caps.get(1)?.as_str().parse().ok()?;
        let z = caps.get(2)?.as_str().parse().ok()?;
        let kind = SectorFileKind::from_extension(caps.get(3)?.as_str())?;
        Some((Self::new(x, z), kind))
    }
}

impl fmt::Display for SectorCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Die vier Dateien eines Sektors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectorFileKind {
    /// Haupt-Items und Nodes
    Base,
    /// Detail-Items (z.B. Deko-Modelle)
    Aux,
    /// Zusatzdaten einzelner Items
    Data,
    /// Sektor-Deskriptor
    Desc,
}

impl SectorFileKind {
    pub const ALL: [SectorFileKind; 4] = [
        SectorFileKind::Base,
        SectorFileKind::Aux,
        SectorFileKind::Data,
        SectorFileKind::Desc,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            SectorFileKind::Base => "base",
            SectorFileKind::Aux => "aux",
            SectorFileKind::Data => "data",
            SectorFileKind::Desc => "desc",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.extension() == ext)
    }

    /// Vollständiger Dateiname für einen Sektor.
    pub fn file_name(self, coord: SectorCoord) -> String {
        format!("{}.{}", coord.file_stem(), self.extension())
    }
}

/// In welche Item-Datei ein Item geschrieben wird.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemFileRole {
    Base,
    Aux,
}

/// Sektor-Grenzen in Festkomma (1/256 m), X/Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectorBounds {
    pub min_x: i32,
    pub min_z: i32,
    pub max_x: i32,
    pub max_z: i32,
}

/// Inhalt der `.desc`-Datei.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorDescriptor {
    pub version: u32,
    pub bounds: SectorBounds,
    pub flags: FlagField,
    pub climate: Token,
}

impl SectorDescriptor {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            bounds: SectorBounds::default(),
            flags: FlagField::default(),
            climate: Token::EMPTY,
        }
    }
}

/// Ein Sektor mit seinen Root-Items, getrennt nach Base- und Aux-Datei.
#[derive(Debug, Clone)]
pub struct Sector {
    pub coord: SectorCoord,
    pub descriptor: SectorDescriptor,
    base_items: IndexSet<ItemId>,
    aux_items: IndexSet<ItemId>,
}

impl Sector {
    pub fn new(coord: SectorCoord, version: u32) -> Self {
        Self {
            coord,
            descriptor: SectorDescriptor::new(version),
            base_items: IndexSet::new(),
            aux_items: IndexSet::new(),
        }
    }

    /// Items der Base-Datei in Einfügereihenfolge.
    pub fn base_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.base_items.iter().copied()
    }

    /// Items der Aux-Datei in Einfügereihenfolge.
    pub fn aux_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.aux_items.iter().copied()
    }

    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.base_items().chain(self.aux_items())
    }

    pub fn item_count(&self) -> usize {
        self.base_items.len() + self.aux_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.base_items.contains(&item) || self.aux_items.contains(&item)
    }

    pub(crate) fn insert(&mut self, item: ItemId, role: ItemFileRole) {
        match role {
            ItemFileRole::Base => self.base_items.insert(item),
            ItemFileRole::Aux => self.aux_items.insert(item),
        };
    }

    pub(crate) fn remove(&mut self, item: ItemId) -> bool {
        self.base_items.shift_remove(&item) || self.aux_items.shift_remove(&item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_from_position_uses_floor() {
        assert_eq!(
            SectorCoord::from_position(Vec3::new(10.0, 0.0, 10.0), DEFAULT_SECTOR_SIZE),
            SectorCoord::new(0, 0)
        );
        assert_eq!(
            SectorCoord::from_position(Vec3::new(-0.5, 0.0, 4000.0), DEFAULT_SECTOR_SIZE),
            SectorCoord::new(-1, 1)
        );
    }

    #[test]
    fn test_file_name_roundtrip() {
        let coord = SectorCoord::new(1, -2);
        let name = SectorFileKind::Base.file_name(coord);
        assert_eq!(name, "sec+0001-0002.base");
        assert_eq!(
            SectorCoord::parse_file_name(&name),
            Some((coord, SectorFileKind::Base))
        );
        assert_eq!(SectorCoord::parse_file_name("sec+0001-0002.pmd"), None);
        assert_eq!(SectorCoord::parse_file_name("readme.txt"), None);
    }
}
