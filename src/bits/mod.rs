//! Bit-exact block layouts.
//!
//! [`EncodingBits`] holds the parameters of one compressed block, one variant
//! per layout. It knows nothing about source pixels or error metrics; it only
//! serializes, parses and reconstructs.

mod colour;
mod eac;

pub use colour::{ColourBits, ColourFamily, MalformedBlock};
pub use eac::EacBits;

pub(crate) use colour::{decode_planar, differential_second, h_distance_index, h_paints, modified, t_paints, HALVES};
pub(crate) use eac::{eac_to_unit, eac_value, EacKind};

use crate::color::Rgba8;
use crate::format::{EncodingBitsFormat, Format};

fn field(v: u64, lsb: u32, width: u32) -> u64 {
    (v >> lsb) & ((1 << width) - 1)
}

fn put(v: &mut u64, lsb: u32, width: u32, value: u64) {
    *v |= (value & ((1 << width) - 1)) << lsb;
}

/// Bit position of a raster-order pixel in the column-major wire order.
fn wire_index(i: usize) -> u32 {
    ((i % 4) * 4 + i / 4) as u32
}

/// The differential flag of a colour block, reused as the punch-through opaque bit.
const OPAQUE_BIT: u8 = 0b10;

fn word(block: &[u8], offset: usize) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&block[offset..offset + 8]);
    bytes
}

/// Parameters of one compressed block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodingBits {
    /// ETC1, RGB8 and SRGB8
    Rgb8(ColourBits),
    /// RGB8A1 and SRGB8A1
    Rgb8A1 { opaque: bool, colour: ColourBits },
    /// RGBA8 and SRGBA8: EAC alpha followed by colour
    Rgba8 { alpha: EacBits, colour: ColourBits },
    /// R11 and SIGNED_R11
    R11(EacBits),
    /// RG11 and SIGNED_RG11
    Rg11 { red: EacBits, green: EacBits },
}

impl EncodingBits {
    pub fn layout(&self) -> EncodingBitsFormat {
        match self {
            EncodingBits::Rgb8(_) => EncodingBitsFormat::Rgb8,
            EncodingBits::Rgb8A1 { .. } => EncodingBitsFormat::Rgb8A1,
            EncodingBits::Rgba8 { .. } => EncodingBitsFormat::Rgba8,
            EncodingBits::R11(_) => EncodingBitsFormat::R11,
            EncodingBits::Rg11 { .. } => EncodingBitsFormat::Rg11,
        }
    }

    /// Serializes the block into the front of `output`.
    ///
    /// # Panics
    ///
    /// If `output` is shorter than the block size of [`EncodingBits::layout`].
    pub fn write_to(&self, output: &mut [u8]) {
        assert!(output.len() >= self.layout().block_size());
        match self {
            EncodingBits::Rgb8(colour) => output[..8].copy_from_slice(&colour.to_bytes()),
            EncodingBits::Rgb8A1 { opaque, colour } => {
                let mut bytes = colour.to_bytes();
                if *opaque {
                    bytes[3] |= OPAQUE_BIT;
                } else {
                    bytes[3] &= !OPAQUE_BIT;
                }
                output[..8].copy_from_slice(&bytes);
            }
            EncodingBits::Rgba8 { alpha, colour } => {
                output[..8].copy_from_slice(&alpha.to_bytes());
                output[8..16].copy_from_slice(&colour.to_bytes());
            }
            EncodingBits::R11(red) => output[..8].copy_from_slice(&red.to_bytes()),
            EncodingBits::Rg11 { red, green } => {
                output[..8].copy_from_slice(&red.to_bytes());
                output[8..16].copy_from_slice(&green.to_bytes());
            }
        }
    }

    /// Parses one block of `format` from the front of `block`.
    ///
    /// # Panics
    ///
    /// If `block` is shorter than [`Format::block_size`].
    pub fn from_bytes(format: Format, block: &[u8]) -> Result<Self, MalformedBlock> {
        assert!(block.len() >= format.block_size());
        let family = if format == Format::Etc1 {
            ColourFamily::Etc1
        } else {
            ColourFamily::Etc2
        };
        Ok(match format.encoding_bits_format() {
            EncodingBitsFormat::Rgb8 => EncodingBits::Rgb8(ColourBits::from_bytes(&word(block, 0), family)?),
            EncodingBitsFormat::Rgb8A1 => {
                let bytes = word(block, 0);
                EncodingBits::Rgb8A1 {
                    opaque: bytes[3] & OPAQUE_BIT != 0,
                    colour: ColourBits::from_bytes(&bytes, ColourFamily::PunchThrough)?,
                }
            }
            EncodingBitsFormat::Rgba8 => EncodingBits::Rgba8 {
                alpha: EacBits::from_bytes(&word(block, 0)),
                colour: ColourBits::from_bytes(&word(block, 8), family)?,
            },
            EncodingBitsFormat::R11 => EncodingBits::R11(EacBits::from_bytes(&word(block, 0))),
            EncodingBitsFormat::Rg11 => EncodingBits::Rg11 {
                red: EacBits::from_bytes(&word(block, 0)),
                green: EacBits::from_bytes(&word(block, 8)),
            },
        })
    }

    /// Reconstructs the 16 pixels of the block as RGBA8, in raster order.
    ///
    /// Channels the format does not carry are filled with 0, alpha with 255.
    pub fn decode(&self, format: Format) -> [Rgba8; 16] {
        match self {
            EncodingBits::Rgb8(colour) => colour.decode(false),
            EncodingBits::Rgb8A1 { opaque, colour } => colour.decode(!opaque),
            EncodingBits::Rgba8 { alpha, colour } => {
                let mut rgba = colour.decode(false);
                for (pixel, a) in rgba.iter_mut().zip(alpha.decode_u8(EacKind::Alpha)) {
                    pixel[3] = a;
                }
                rgba
            }
            EncodingBits::R11(red) => {
                let kind = EacKind::for_channel(format.is_signed());
                red.decode_u8(kind).map(|r| [r, 0, 0, 255])
            }
            EncodingBits::Rg11 { red, green } => {
                let kind = EacKind::for_channel(format.is_signed());
                let reds = red.decode_u8(kind);
                let greens = green.decode_u8(kind);
                let mut rgba = [[0u8, 0, 0, 255]; 16];
                for (i, pixel) in rgba.iter_mut().enumerate() {
                    pixel[0] = reds[i];
                    pixel[1] = greens[i];
                }
                rgba
            }
        }
    }
}

/// Decodes one block of `format`, substituting opaque black for malformed bits.
pub(crate) fn decode_block(format: Format, block: &[u8]) -> Result<[Rgba8; 16], [Rgba8; 16]> {
    EncodingBits::from_bytes(format, block)
        .map(|bits| bits.decode(format))
        .map_err(|MalformedBlock| [[0, 0, 0, 255]; 16])
}
