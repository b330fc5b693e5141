//! Prefab-Slaves: Company und Service hängen an einem Master-Prefab.

use glam::Vec3;
use ts_map_primitives::{FlagField, Token};

use super::{Item, ItemData, SlaveShape};
use crate::core::container::ItemContainer;
use crate::core::error::{TopologyError, TopologyResult};
use crate::core::{Direction, ItemId};

const SERVICE_TYPE_START: u32 = 0;
const SERVICE_TYPE_BITS: u32 = 4;

/// Firma (Lieferziel/-quelle) an einem Prefab.
#[derive(Debug, Clone, PartialEq)]
pub struct Company {
    pub shape: SlaveShape,
    pub flags: FlagField,
    pub name: Token,
    pub city: Token,
}

/// Art eines Service-Punkts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceType {
    #[default]
    GasStation,
    Service,
    WeightStation,
    TruckDealer,
    Garage,
    Recruitment,
    Other(u8),
}

impl ServiceType {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => ServiceType::GasStation,
            1 => ServiceType::Service,
            2 => ServiceType::WeightStation,
            3 => ServiceType::TruckDealer,
            4 => ServiceType::Garage,
            5 => ServiceType::Recruitment,
            other => ServiceType::Other(other as u8),
        }
    }

    fn bits(self) -> u32 {
        match self {
            ServiceType::GasStation => 0,
            ServiceType::Service => 1,
            ServiceType::WeightStation => 2,
            ServiceType::TruckDealer => 3,
            ServiceType::Garage => 4,
            ServiceType::Recruitment => 5,
            ServiceType::Other(value) => value as u32,
        }
    }
}

/// Service-Punkt (Tankstelle, Werkstatt, ...) an einem Prefab.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub shape: SlaveShape,
    pub flags: FlagField,
}

impl Company {
    /// Legt eine Firma an `position` an und trägt sie beim Prefab ein.
    pub fn add<C: ItemContainer + ?Sized>(
        container: &mut C,
        prefab: ItemId,
        position: Vec3,
        name: Token,
    ) -> TopologyResult<ItemId> {
        add_slave(container, prefab, position, |shape| {
            ItemData::Company(Company {
                shape,
                flags: FlagField::default(),
                name,
                city: Token::EMPTY,
            })
        })
    }
}

impl Service {
    pub fn add<C: ItemContainer + ?Sized>(
        container: &mut C,
        prefab: ItemId,
        position: Vec3,
        service_type: ServiceType,
    ) -> TopologyResult<ItemId> {
        let mut flags = FlagField::default();
        flags.set_bit_string(SERVICE_TYPE_START, SERVICE_TYPE_BITS, service_type.bits())?;
        add_slave(container, prefab, position, |shape| {
            ItemData::Service(Service { shape, flags })
        })
    }

    pub fn service_type(&self) -> ServiceType {
        ServiceType::from_bits(self.flags.get_bit_string(SERVICE_TYPE_START, SERVICE_TYPE_BITS))
    }

    pub fn set_service_type(&mut self, service_type: ServiceType) -> TopologyResult<()> {
        self.flags
            .set_bit_string(SERVICE_TYPE_START, SERVICE_TYPE_BITS, service_type.bits())?;
        Ok(())
    }
}

fn add_slave<C, F>(container: &mut C, prefab: ItemId, position: Vec3, make: F) -> TopologyResult<ItemId>
where
    C: ItemContainer + ?Sized,
    F: FnOnce(SlaveShape) -> ItemData,
{
    let owner = container.owner();
    let map = container.map_mut();
    let master = map.item_entry(prefab)?;
    if !matches!(master.data, ItemData::Prefab(_)) {
        return Err(TopologyError::WrongShape {
            uid: master.uid,
            expected: "prefab",
        });
    }
    if master.owner() != owner {
        return Err(TopologyError::NotRootItem(master.uid));
    }

    let node = container.add_node(position, true)?;
    let data = make(SlaveShape {
        node: node.into(),
        prefab: prefab.into(),
    });
    let item = container.add_item(Item::new(0, data))?;
    let map = container.map_mut();
    map.link(node, Direction::Forward, Some(item))?;
    if let Some(ItemData::Prefab(master)) = map.item_mut(prefab).map(|i| &mut i.data) {
        master.shape.slaves.push(item.into());
    }
    Ok(item)
}
