//! 32-Bit-Flagfeld mit Einzelbit-, Byte- und Bitstring-Zugriff.

use thiserror::Error;

/// Fehler beim Schreiben eines Bitstrings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlagFieldError {
    /// Bereich ragt über Bit 31 hinaus
    #[error("Bitbereich {start}+{length} liegt ausserhalb von 32 Bit")]
    OutOfBounds {
        /// Start-Bit
        start: u32,
        /// Anzahl Bits
        length: u32,
    },
    /// Wert passt nicht in die angegebene Bitbreite
    #[error("Wert {value} passt nicht in {length} Bit")]
    ValueTooLarge {
        /// Zu schreibender Wert
        value: u32,
        /// Verfügbare Bitbreite
        length: u32,
    },
}

/// Dichtes Flagfeld, wie es in Item- und Node-Records gespeichert wird.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FlagField(u32);

impl FlagField {
    /// Erstellt ein Flagfeld aus Rohbits.
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Gibt die Rohbits zurück.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Liest Bit `index` (0 = niederwertigstes Bit).
    pub fn get(self, index: u32) -> bool {
        debug_assert!(index < 32, "Bit-Index {index} ausserhalb des Flagfelds");
        (self.0 >> index) & 1 == 1
    }

    /// Setzt Bit `index`.
    pub fn set(&mut self, index: u32, value: bool) {
        debug_assert!(index < 32, "Bit-Index {index} ausserhalb des Flagfelds");
        if value {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
    }

    /// Liest Byte `index` (0..4).
    pub fn get_byte(self, index: u32) -> u8 {
        debug_assert!(index < 4);
        (self.0 >> (index * 8)) as u8
    }

    /// Schreibt Byte `index` (0..4).
    pub fn set_byte(&mut self, index: u32, value: u8) {
        debug_assert!(index < 4);
        let shift = index * 8;
        self.0 = (self.0 & !(0xFF << shift)) | ((value as u32) << shift);
    }

    /// Liest `length` Bits ab `start` als Zahl.
    pub fn get_bit_string(self, start: u32, length: u32) -> u32 {
        debug_assert!(start + length <= 32);
        (self.0 >> start) & mask(length)
    }

    /// Schreibt `value` in `length` Bits ab `start`.
    pub fn set_bit_string(
        &mut self,
        start: u32,
        length: u32,
        value: u32,
    ) -> Result<(), FlagFieldError> {
        if length == 0 || start + length > 32 {
            return Err(FlagFieldError::OutOfBounds { start, length });
        }
        let mask = mask(length);
        if value & !mask != 0 {
            return Err(FlagFieldError::ValueTooLarge { value, length });
        }
        self.0 = (self.0 & !(mask << start)) | (value << start);
        Ok(())
    }
}

impl From<u32> for FlagField {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

fn mask(length: u32) -> u32 {
    if length >= 32 {
        u32::MAX
    } else {
        (1u32 << length) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_bits() {
        let mut flags = FlagField::default();
        flags.set(0, true);
        flags.set(31, true);
        assert!(flags.get(0));
        assert!(flags.get(31));
        assert!(!flags.get(1));
        flags.set(0, false);
        assert_eq!(flags.bits(), 1 << 31);
    }

    #[test]
    fn test_bytes_do_not_overlap() {
        let mut flags = FlagField::new(0xFFFF_FFFF);
        flags.set_byte(1, 0x12);
        assert_eq!(flags.bits(), 0xFFFF_12FF);
        assert_eq!(flags.get_byte(1), 0x12);
        assert_eq!(flags.get_byte(2), 0xFF);
    }

    #[test]
    fn test_bit_string_roundtrip_and_overflow() {
        let mut flags = FlagField::default();
        flags.set_bit_string(4, 2, 3).unwrap();
        assert_eq!(flags.get_bit_string(4, 2), 3);
        assert_eq!(flags.bits(), 0b11_0000);

        assert_eq!(
            flags.set_bit_string(4, 2, 4),
            Err(FlagFieldError::ValueTooLarge { value: 4, length: 2 })
        );
        assert_eq!(
            flags.set_bit_string(30, 4, 1),
            Err(FlagFieldError::OutOfBounds { start: 30, length: 4 })
        );
        // unverändert nach Fehler
        assert_eq!(flags.get_bit_string(4, 2), 3);
    }

    #[test]
    fn test_full_width_bit_string() {
        let mut flags = FlagField::default();
        flags.set_bit_string(0, 32, u32::MAX).unwrap();
        assert_eq!(flags.get_bit_string(0, 32), u32::MAX);
    }
}
