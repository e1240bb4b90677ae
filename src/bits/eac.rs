//! The 64-bit EAC block used for ETC2 alpha and the R11/RG11 channels.
//!
//! Layout: 8-bit base, 4-bit multiplier, 4-bit table index, then sixteen 3-bit
//! selectors with the first wire pixel in the most significant bits.

use super::{field, put, wire_index};
use crate::tables::EAC_MODIFIERS;

/// How the stored values of an EAC block are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EacKind {
    /// 8-bit alpha
    Alpha,
    /// Unsigned 11-bit channel
    R11,
    /// Signed 11-bit channel
    SignedR11,
}

impl EacKind {
    pub(crate) fn for_channel(signed: bool) -> Self {
        if signed {
            EacKind::SignedR11
        } else {
            EacKind::R11
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EacBits {
    /// Base value; reinterpreted as `i8` for signed channels
    pub base: u8,
    pub multiplier: u8,
    pub table: u8,
    /// Per-pixel modifier selectors in raster order
    pub selectors: [u8; 16],
}

/// Reconstructed value of one pixel in the kind's native range.
pub(crate) fn eac_value(kind: EacKind, base: u8, multiplier: u8, modifier: i16) -> i32 {
    let modifier = i32::from(modifier);
    match kind {
        EacKind::Alpha => (i32::from(base) + modifier * i32::from(multiplier)).clamp(0, 255),
        EacKind::R11 => {
            let step = if multiplier == 0 { 1 } else { i32::from(multiplier) * 8 };
            (i32::from(base) * 8 + 4 + modifier * step).clamp(0, 2047)
        }
        EacKind::SignedR11 => {
            let base = i32::from((base as i8).max(-127));
            let step = if multiplier == 0 { 1 } else { i32::from(multiplier) * 8 };
            (base * 8 + modifier * step).clamp(-1023, 1023)
        }
    }
}

/// Maps a value in the kind's native range to the unit range.
pub(crate) fn eac_to_unit(kind: EacKind, value: i32) -> f32 {
    match kind {
        EacKind::Alpha => value as f32 / 255.0,
        EacKind::R11 => value as f32 / 2047.0,
        EacKind::SignedR11 => (value + 1023) as f32 / 2046.0,
    }
}

/// Rescales an 11-bit channel value to 8 bits, rounding to nearest.
pub(crate) fn eac_to_u8(kind: EacKind, value: i32) -> u8 {
    match kind {
        EacKind::Alpha => value.clamp(0, 255) as u8,
        EacKind::R11 => ((value.clamp(0, 2047) * 255 + 1023) / 2047) as u8,
        EacKind::SignedR11 => (((value.clamp(-1023, 1023) + 1023) * 255 + 1023) / 2046) as u8,
    }
}

impl EacBits {
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut v = 0u64;
        put(&mut v, 56, 8, self.base.into());
        put(&mut v, 52, 4, self.multiplier.into());
        put(&mut v, 48, 4, self.table.into());
        for (i, &s) in self.selectors.iter().enumerate() {
            put(&mut v, 45 - 3 * wire_index(i), 3, s.into());
        }
        v.to_be_bytes()
    }

    pub fn from_bytes(bytes: &[u8; 8]) -> Self {
        let v = u64::from_be_bytes(*bytes);
        let mut selectors = [0u8; 16];
        for (i, s) in selectors.iter_mut().enumerate() {
            *s = field(v, 45 - 3 * wire_index(i), 3) as u8;
        }
        EacBits {
            base: field(v, 56, 8) as u8,
            multiplier: field(v, 52, 4) as u8,
            table: field(v, 48, 4) as u8,
            selectors,
        }
    }

    /// Reconstructs the 16 values in raster order, in the kind's native range.
    pub(crate) fn decode(&self, kind: EacKind) -> [i32; 16] {
        let modifiers = &EAC_MODIFIERS[usize::from(self.table & 15)];
        let mut values = [0i32; 16];
        for (value, &s) in values.iter_mut().zip(&self.selectors) {
            *value = eac_value(kind, self.base, self.multiplier & 15, modifiers[usize::from(s & 7)]);
        }
        values
    }

    /// Reconstructs 8-bit values in raster order.
    pub(crate) fn decode_u8(&self, kind: EacKind) -> [u8; 16] {
        self.decode(kind).map(|v| eac_to_u8(kind, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let mut selectors = [0u8; 16];
        // raster pixel 0 is wire pixel 0, raster pixel 4 is wire pixel 1
        selectors[0] = 0b101;
        selectors[4] = 0b011;
        let bits = EacBits {
            base: 0xC8,
            multiplier: 0xA,
            table: 0x3,
            selectors,
        };
        assert_eq!(bits.to_bytes(), [0xC8, 0xA3, 0b1010_1100, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_round_trip_boundaries() {
        for (base, multiplier, table) in [(0, 0, 0), (255, 15, 15), (128, 1, 13), (1, 14, 7)] {
            let mut selectors = [0u8; 16];
            for (i, s) in selectors.iter_mut().enumerate() {
                *s = ((i * 5 + usize::from(base)) & 7) as u8;
            }
            let bits = EacBits {
                base,
                multiplier,
                table,
                selectors,
            };
            assert_eq!(EacBits::from_bytes(&bits.to_bytes()), bits);
        }
    }

    #[test]
    fn test_alpha_values() {
        assert_eq!(eac_value(EacKind::Alpha, 200, 10, 14), 255);
        assert_eq!(eac_value(EacKind::Alpha, 20, 3, -6), 2);
        assert_eq!(eac_value(EacKind::Alpha, 20, 15, -15), 0);
    }

    #[test]
    fn test_r11_values() {
        assert_eq!(eac_value(EacKind::R11, 0, 0, -3), 1);
        assert_eq!(eac_value(EacKind::R11, 100, 2, 5), 884);
        assert_eq!(eac_value(EacKind::R11, 255, 15, 14), 2047);
        assert_eq!(eac_value(EacKind::SignedR11, (-128i8) as u8, 0, 0), -1016);
        assert_eq!(eac_value(EacKind::SignedR11, (-127i8) as u8, 15, -15), -1023);
        assert_eq!(eac_value(EacKind::SignedR11, 127, 15, 14), 1023);
    }

    #[test]
    fn test_to_u8() {
        assert_eq!(eac_to_u8(EacKind::R11, 0), 0);
        assert_eq!(eac_to_u8(EacKind::R11, 2047), 255);
        assert_eq!(eac_to_u8(EacKind::SignedR11, -1023), 0);
        assert_eq!(eac_to_u8(EacKind::SignedR11, 1023), 255);
        assert_eq!(eac_to_u8(EacKind::SignedR11, 0), 128);
    }
}
