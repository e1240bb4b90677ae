//! Colour representations shared by the encoder and decoder.
//!
//! Pixels are stored as 8-bit RGBA ([`Rgba8`]) and converted to
//! [`ColorFloatRgba`] in the unit range for error computation.

/// An 8-bit RGBA pixel, the storage form of source and decoded images.
pub type Rgba8 = [u8; 4];

/// A colour with floating point channels in the range `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColorFloatRgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorFloatRgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Converts an 8-bit pixel to unit range.
    pub fn from_rgba8(rgba: Rgba8) -> Self {
        Self {
            r: f32::from(rgba[0]) / 255.0,
            g: f32::from(rgba[1]) / 255.0,
            b: f32::from(rgba[2]) / 255.0,
            a: f32::from(rgba[3]) / 255.0,
        }
    }

    /// Builds a colour from 8-bit RGB with an explicit unit-range alpha.
    pub(crate) fn from_rgb8(rgb: [u8; 3], a: f32) -> Self {
        Self {
            r: f32::from(rgb[0]) / 255.0,
            g: f32::from(rgb[1]) / 255.0,
            b: f32::from(rgb[2]) / 255.0,
            a,
        }
    }

    /// Rounds each channel to the nearest 8-bit level, clamping out-of-range values.
    pub fn to_rgba8(self) -> Rgba8 {
        [
            unit_to_u8(self.r),
            unit_to_u8(self.g),
            unit_to_u8(self.b),
            unit_to_u8(self.a),
        ]
    }

    /// RGB on the 8-bit scale, the domain the block quantizers work in.
    pub(crate) fn rgb255(&self) -> [f32; 3] {
        [self.r * 255.0, self.g * 255.0, self.b * 255.0]
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v > 0.0 {
        v.min(1.0)
    } else {
        0.0
    }
}

/// Rounds a unit-range value to the nearest 8-bit level.
pub fn unit_to_u8(v: f32) -> u8 {
    libm::roundf(clamp_unit(v) * 255.0) as u8
}

/// Expands an n-bit channel (4 to 8 bits) to 8 bits by bit replication.
pub(crate) fn expand_bits(value: u8, bits: u32) -> u8 {
    debug_assert!((4..=8).contains(&bits));
    let v = u32::from(value) & ((1 << bits) - 1);
    ((v << (8 - bits)) | (v >> (2 * bits - 8))) as u8
}

/// Expands a colour triple of n-bit channels to 8 bits.
pub(crate) fn expand_rgb(rgb: [u8; 3], bits: u32) -> [u8; 3] {
    [
        expand_bits(rgb[0], bits),
        expand_bits(rgb[1], bits),
        expand_bits(rgb[2], bits),
    ]
}

/// Nearest n-bit level for a value on the 8-bit scale.
pub(crate) fn quantize_bits(value: f32, bits: u32) -> u8 {
    let max = ((1u32 << bits) - 1) as f32;
    let q = libm::roundf(value * max / 255.0);
    if q > 0.0 {
        q.min(max) as u8
    } else {
        0
    }
}

/// Quantizes an 8-bit-scale RGB triple to n bits per channel.
pub(crate) fn quantize_rgb(rgb: [f32; 3], bits: u32) -> [u8; 3] {
    [
        quantize_bits(rgb[0], bits),
        quantize_bits(rgb[1], bits),
        quantize_bits(rgb[2], bits),
    ]
}

/// Adds a signed offset to every channel, saturating at the 8-bit range.
pub(crate) fn offset_rgb(rgb: [u8; 3], offset: i16) -> [u8; 3] {
    let add = |c: u8| (i16::from(c) + offset).clamp(0, 255) as u8;
    [add(rgb[0]), add(rgb[1]), add(rgb[2])]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_round_trip() {
        for v in 0..=255u8 {
            let c = ColorFloatRgba::from_rgba8([v, 255 - v, v / 2, 255]);
            assert_eq!(c.to_rgba8(), [v, 255 - v, v / 2, 255]);
        }
    }

    #[test]
    fn test_to_rgba8_clamps() {
        let c = ColorFloatRgba::new(-0.5, 1.5, f32::NAN, 0.5);
        assert_eq!(c.to_rgba8(), [0, 255, 0, 128]);
    }

    #[test]
    fn test_expand_bits() {
        assert_eq!(expand_bits(0xF, 4), 0xFF);
        assert_eq!(expand_bits(0x8, 4), 0x88);
        assert_eq!(expand_bits(31, 5), 255);
        assert_eq!(expand_bits(16, 5), 132);
        assert_eq!(expand_bits(63, 6), 255);
        assert_eq!(expand_bits(1, 6), 4);
        assert_eq!(expand_bits(127, 7), 255);
        assert_eq!(expand_bits(64, 7), 129);
    }

    #[test]
    fn test_quantize_bits() {
        assert_eq!(quantize_bits(0.0, 5), 0);
        assert_eq!(quantize_bits(255.0, 5), 31);
        assert_eq!(quantize_bits(300.0, 4), 15);
        assert_eq!(quantize_bits(-3.0, 6), 0);
        assert_eq!(quantize_bits(136.0, 4), 8);
    }

    #[test]
    fn test_offset_rgb_saturates() {
        assert_eq!(offset_rgb([250, 3, 100], 8), [255, 11, 108]);
        assert_eq!(offset_rgb([250, 3, 100], -8), [242, 0, 92]);
    }
}
