//! Little-Endian-Schreiber in einen wachsenden Puffer.

use glam::Quat;
use ts_map_primitives::{FlagField, Token};

use super::error::{FormatError, FormatResult};
use crate::core::FixedVec3;

#[derive(Debug, Default)]
pub struct BinaryWriter {
    buffer: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_token(&mut self, token: Token) {
        self.write_u64(token.value());
    }

    pub fn write_flags(&mut self, flags: FlagField) {
        self.write_u32(flags.bits());
    }

    pub fn write_fixed_vec3(&mut self, position: FixedVec3) {
        self.write_i32(position.x);
        self.write_i32(position.y);
        self.write_i32(position.z);
    }

    pub fn write_quat(&mut self, rotation: Quat) {
        self.write_f32(rotation.x);
        self.write_f32(rotation.y);
        self.write_f32(rotation.z);
        self.write_f32(rotation.w);
    }

    /// Schreibt eine Anzahl als `u32`.
    pub fn write_count(&mut self, field: &'static str, count: usize) -> FormatResult<()> {
        let value = u32::try_from(count).map_err(|_| FormatError::ValueOutOfRange {
            field,
            value: count as u64,
        })?;
        self.write_u32(value);
        Ok(())
    }
}
