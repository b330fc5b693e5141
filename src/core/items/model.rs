//! Einzelnes 3D-Modell an einem Node.

use glam::Vec3;
use ts_map_primitives::{FlagField, Token};

use super::{ItemData, SingleNodeShape};
use crate::core::container::ItemContainer;
use crate::core::error::{check_range, TopologyResult};
use crate::core::{topology, ItemId};

const FLAG_DETAIL: u32 = 0;
const FLAG_NO_COLLISION: u32 = 1;
const FLAG_NO_SHADOWS: u32 = 2;
const FLAG_MIRROR_REFLECTION: u32 = 3;
const COLOR_VARIANT_START: u32 = 4;
const COLOR_VARIANT_BITS: u32 = 3;

/// Grösster Skalierungsfaktor (u16 / 100).
pub const MAX_SCALE: f32 = u16::MAX as f32 / 100.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub shape: SingleNodeShape,
    pub flags: FlagField,
    pub model: Token,
    pub variant: Token,
    pub look: Token,
    /// Skalierung pro Achse (×100)
    pub(crate) scale: [u16; 3],
}

impl Model {
    pub fn new(shape: SingleNodeShape, model: Token) -> Self {
        Self {
            shape,
            flags: FlagField::default(),
            model,
            variant: Token::EMPTY,
            look: Token::EMPTY,
            scale: [100; 3],
        }
    }

    pub fn add<C: ItemContainer + ?Sized>(
        container: &mut C,
        position: Vec3,
        model: Token,
    ) -> TopologyResult<ItemId> {
        topology::add_single_node(container, position, |shape| {
            ItemData::Model(Model::new(shape, model))
        })
    }

    /// Detail-Modelle landen in der Aux-Datei des Sektors.
    pub fn is_detail(&self) -> bool {
        self.flags.get(FLAG_DETAIL)
    }

    pub fn set_detail(&mut self, value: bool) {
        self.flags.set(FLAG_DETAIL, value);
    }

    pub fn no_collision(&self) -> bool {
        self.flags.get(FLAG_NO_COLLISION)
    }

    pub fn set_no_collision(&mut self, value: bool) {
        self.flags.set(FLAG_NO_COLLISION, value);
    }

    pub fn no_shadows(&self) -> bool {
        self.flags.get(FLAG_NO_SHADOWS)
    }

    pub fn set_no_shadows(&mut self, value: bool) {
        self.flags.set(FLAG_NO_SHADOWS, value);
    }

    pub fn mirror_reflection(&self) -> bool {
        self.flags.get(FLAG_MIRROR_REFLECTION)
    }

    pub fn set_mirror_reflection(&mut self, value: bool) {
        self.flags.set(FLAG_MIRROR_REFLECTION, value);
    }

    /// Farbvariante (0..8).
    pub fn color_variant(&self) -> u8 {
        self.flags
            .get_bit_string(COLOR_VARIANT_START, COLOR_VARIANT_BITS) as u8
    }

    pub fn set_color_variant(&mut self, variant: u8) -> TopologyResult<()> {
        self.flags
            .set_bit_string(COLOR_VARIANT_START, COLOR_VARIANT_BITS, variant as u32)?;
        Ok(())
    }

    pub fn scale(&self) -> Vec3 {
        Vec3::new(
            self.scale[0] as f32 / 100.0,
            self.scale[1] as f32 / 100.0,
            self.scale[2] as f32 / 100.0,
        )
    }

    /// Setzt die Skalierung; jede Achse muss in 0..=655.35 liegen.
    pub fn set_scale(&mut self, scale: Vec3) -> TopologyResult<()> {
        for value in scale.to_array() {
            check_range("scale", value as f64, 0.0, MAX_SCALE as f64)?;
        }
        self.scale = scale.to_array().map(|v| (v * 100.0).round() as u16);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ItemFileRole, Map};

    #[test]
    fn test_detail_model_goes_to_aux() {
        let mut map = Map::new("test");
        let id = Model::add(&mut map, Vec3::new(5.0, 0.0, 5.0), Token::EMPTY).unwrap();
        assert_eq!(map.item(id).unwrap().file_role(), ItemFileRole::Base);

        let item = map.item_mut(id).unwrap();
        if let ItemData::Model(model) = &mut item.data {
            model.set_detail(true);
        }
        assert_eq!(item.file_role(), ItemFileRole::Aux);
    }

    #[test]
    fn test_scale_rejects_out_of_range() {
        let shape = SingleNodeShape {
            node: crate::core::Reference::Unresolved(1),
        };
        let mut model = Model::new(shape, Token::EMPTY);
        assert!(model.set_scale(Vec3::new(1.0, 700.0, 1.0)).is_err());
        assert_eq!(model.scale(), Vec3::ONE);
        model.set_scale(Vec3::new(1.5, 2.0, 0.25)).unwrap();
        assert_eq!(model.scale(), Vec3::new(1.5, 2.0, 0.25));
        assert!(model.set_color_variant(8).is_err());
        model.set_color_variant(5).unwrap();
        assert_eq!(model.color_variant(), 5);
    }
}
