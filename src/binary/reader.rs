//! Little-Endian-Leser über einem Byte-Puffer.

use glam::Quat;
use ts_map_primitives::{FlagField, Token};

use super::error::{FormatError, FormatResult};
use crate::core::FixedVec3;

/// Sequenzieller Leser; jede Methode prüft die verbleibende Länge.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Fehler, wenn nach dem letzten Datensatz noch Bytes folgen.
    pub fn expect_end(&self) -> FormatResult<()> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(FormatError::TrailingData { count }),
        }
    }

    pub fn take(&mut self, count: usize) -> FormatResult<&'a [u8]> {
        if self.remaining() < count {
            return Err(FormatError::Truncated {
                offset: self.offset,
                needed: count,
            });
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> FormatResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> FormatResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> FormatResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn read_i16(&mut self) -> FormatResult<i16> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    pub fn read_u32(&mut self) -> FormatResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn read_i32(&mut self) -> FormatResult<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn read_u64(&mut self) -> FormatResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn read_f32(&mut self) -> FormatResult<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    pub fn read_token(&mut self) -> FormatResult<Token> {
        Ok(Token::from_raw(self.read_u64()?))
    }

    pub fn read_flags(&mut self) -> FormatResult<FlagField> {
        Ok(FlagField::new(self.read_u32()?))
    }

    pub fn read_fixed_vec3(&mut self) -> FormatResult<FixedVec3> {
        Ok(FixedVec3::new(
            self.read_i32()?,
            self.read_i32()?,
            self.read_i32()?,
        ))
    }

    /// Quaternion in der Reihenfolge x, y, z, w.
    pub fn read_quat(&mut self) -> FormatResult<Quat> {
        Ok(Quat::from_xyzw(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    /// Liest eine `u32`-Anzahl und prüft, dass `count * min_size` Bytes
    /// überhaupt noch vorhanden sind.
    pub fn read_count(&mut self, min_size: usize) -> FormatResult<usize> {
        let offset = self.offset;
        let count = self.read_u32()? as usize;
        let needed = count.saturating_mul(min_size.max(1));
        if needed > self.remaining() {
            return Err(FormatError::Truncated { offset, needed });
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_little_endian() {
        let data = [0x01, 0x02, 0xff, 0xff, 0xff, 0xff];
        let mut reader = BinaryReader::new(&data);
        assert_eq!(reader.read_u16().unwrap(), 0x0201);
        assert_eq!(reader.read_i32().unwrap(), -1);
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_truncated_read_reports_offset() {
        let data = [0u8; 3];
        let mut reader = BinaryReader::new(&data);
        reader.read_u8().unwrap();
        assert_eq!(
            reader.read_u32(),
            Err(FormatError::Truncated {
                offset: 1,
                needed: 4
            })
        );
    }

    #[test]
    fn test_count_larger_than_input_is_rejected() {
        let data = 1000u32.to_le_bytes();
        let mut reader = BinaryReader::new(&data);
        assert!(matches!(
            reader.read_count(8),
            Err(FormatError::Truncated { .. })
        ));
    }
}
