use crate::error::Error;
use alloc::string::ToString;
use core::fmt;
use core::str::FromStr;

/// Compressed texture formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// ETC1: colour only, individual and differential modes
    Etc1,

    /// ETC2 RGB, a superset of ETC1 adding the T, H and planar modes
    Rgb8,
    #[default]
    Srgb8,

    /// ETC2 RGB with an EAC alpha block
    Rgba8,
    Srgba8,

    /// EAC single channel, 11 bits
    R11,
    SignedR11,

    /// EAC dual channel, 11 bits each
    Rg11,
    SignedRg11,

    /// ETC2 RGB with punch-through (1-bit) alpha
    Rgb8A1,
    Srgb8A1,
}

/// Bit layout of one compressed block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EncodingBitsFormat {
    /// 64-bit ETC1/ETC2 colour block
    Rgb8,
    /// 64-bit EAC alpha block followed by a 64-bit colour block
    Rgba8,
    /// One 64-bit EAC block
    R11,
    /// Two 64-bit EAC blocks, red then green
    Rg11,
    /// 64-bit colour block whose differential flag holds the opaque bit
    Rgb8A1,
}

impl EncodingBitsFormat {
    /// Returns how many bytes a 4x4 block of pixels compresses into.
    pub const fn block_size(self) -> usize {
        match self {
            EncodingBitsFormat::Rgb8 | EncodingBitsFormat::R11 | EncodingBitsFormat::Rgb8A1 => 8,
            EncodingBitsFormat::Rgba8 | EncodingBitsFormat::Rg11 => 16,
        }
    }
}

impl Format {
    pub const ALL: [Format; 11] = [
        Format::Etc1,
        Format::Rgb8,
        Format::Srgb8,
        Format::Rgba8,
        Format::Srgba8,
        Format::R11,
        Format::SignedR11,
        Format::Rg11,
        Format::SignedRg11,
        Format::Rgb8A1,
        Format::Srgb8A1,
    ];

    /// The block layout used by this format.
    pub const fn encoding_bits_format(self) -> EncodingBitsFormat {
        match self {
            Format::Etc1 | Format::Rgb8 | Format::Srgb8 => EncodingBitsFormat::Rgb8,
            Format::Rgba8 | Format::Srgba8 => EncodingBitsFormat::Rgba8,
            Format::R11 | Format::SignedR11 => EncodingBitsFormat::R11,
            Format::Rg11 | Format::SignedRg11 => EncodingBitsFormat::Rg11,
            Format::Rgb8A1 | Format::Srgb8A1 => EncodingBitsFormat::Rgb8A1,
        }
    }

    /// Returns how many bytes a 4x4 block of pixels compresses into.
    pub const fn block_size(self) -> usize {
        self.encoding_bits_format().block_size()
    }

    /// Whether the 11-bit channels are signed.
    pub const fn is_signed(self) -> bool {
        matches!(self, Format::SignedR11 | Format::SignedRg11)
    }

    /// Whether the format has RGB colour (as opposed to one or two EAC channels).
    pub const fn has_colour(self) -> bool {
        !matches!(
            self.encoding_bits_format(),
            EncodingBitsFormat::R11 | EncodingBitsFormat::Rg11
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            Format::Etc1 => "ETC1",
            Format::Rgb8 => "RGB8",
            Format::Srgb8 => "SRGB8",
            Format::Rgba8 => "RGBA8",
            Format::Srgba8 => "SRGBA8",
            Format::R11 => "R11",
            Format::SignedR11 => "SIGNED_R11",
            Format::Rg11 => "RG11",
            Format::SignedRg11 => "SIGNED_RG11",
            Format::Rgb8A1 => "RGB8A1",
            Format::Srgb8A1 => "SRGB8A1",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownFormat(s.to_string()))
    }
}
