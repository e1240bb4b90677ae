// Copyright (c) 2024 The etcblock developers
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to	deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
// OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY
// CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE
// SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! A pure Rust ETC1/ETC2/EAC texture compressor and decompressor.
//!
//! ETC formats are laid out in 4x4 pixel blocks of the following types:
//! * ETC1: colour, 8 bytes
//! * RGB8 / SRGB8: ETC2 colour with the T, H and planar modes, 8 bytes
//! * RGBA8 / SRGBA8: EAC alpha followed by ETC2 colour, 16 bytes
//! * RGB8A1 / SRGB8A1: ETC2 colour with punch-through alpha, 8 bytes
//! * R11 / SIGNED_R11: one EAC channel, 8 bytes
//! * RG11 / SIGNED_RG11: two EAC channels, 16 bytes
//!
//! [`Image`] drives encoding and decoding of a whole raster and keeps the
//! statistics of the last call. [`compress`] and [`decompress`] are one-shot
//! wrappers around it.
//!
//! ```
//! use etcblock::{compress, compressed_size, decompress, Format, Params};
//!
//! let rgba = [[0u8, 0, 0, 255]; 16].concat();
//! let mut blocks = vec![0u8; compressed_size(Format::Etc1, 4, 4)];
//! compress(Format::Etc1, &rgba, 4, 4, Params::default(), &mut blocks)?;
//!
//! let mut decoded = vec![0u8; rgba.len()];
//! decompress(Format::Etc1, &blocks, 4, 4, &mut decoded)?;
//! assert_eq!(decoded, rgba);
//! # Ok::<(), etcblock::Error>(())
//! ```

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod bits;
mod block;
mod color;
mod error;
mod format;
mod image;
mod metric;
mod status;
mod tables;

pub use crate::bits::{ColourBits, ColourFamily, EacBits, EncodingBits, MalformedBlock};
pub use crate::color::{unit_to_u8, ColorFloatRgba, Rgba8};
pub use crate::error::Error;
pub use crate::format::{EncodingBitsFormat, Format};
pub use crate::image::Image;
pub use crate::metric::{ErrorMetric, REC709_WEIGHTS};
pub use crate::status::EncodingStatus;

/// Effort used by [`Params::default`]
pub const EFFORT_DEFAULT: f32 = 40.0;

/// Defines how the blocks of an image are searched
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Strategy {
    /// Every block once at the requested effort
    SinglePass,

    /// Every block at effort 0, then the worst `block_percent` of the blocks
    /// re-encoded at increasing effort
    MultiPass { block_percent: f32 },
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::SinglePass
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Params {
    /// Search depth from 0 (fastest) to 100 (best quality)
    pub effort: f32,

    /// Distance used to rank candidate encodings (defaults to Rec. 709 weights)
    pub error_metric: ErrorMetric,

    /// Single or multi pass encoding
    pub strategy: Strategy,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            effort: EFFORT_DEFAULT,
            error_metric: ErrorMetric::default(),
            strategy: Strategy::default(),
        }
    }
}

/// Returns number of blocks needed for an image of given dimension
fn num_blocks(size: usize) -> usize {
    size / 4 + usize::from(size % 4 != 0)
}

/// Rounds an image dimension up to the next multiple of the block size,
/// saturating at `usize::MAX`
pub fn extended_dimension(size: usize) -> usize {
    num_blocks(size).saturating_mul(4)
}

/// Computes the amount of space in bytes needed for an image of given size,
/// accounting for padding to a multiple of 4x4 pixels
///
/// Saturates at `usize::MAX` for dimensions whose block grid cannot be
/// addressed; [`compress`] rejects those with [`Error::DimensionsTooLarge`].
///
/// * `format` - The target format
/// * `width`  - Width of the uncompressed image
/// * `height` - Height of the uncompressed image
pub fn compressed_size(format: Format, width: usize, height: usize) -> usize {
    num_blocks(width)
        .saturating_mul(num_blocks(height))
        .saturating_mul(format.block_size())
}

/// Compresses an image in memory
///
/// * `format` - The target format
/// * `rgba`   - The uncompressed pixel data, row-major RGBA8
/// * `width`  - The width of the source image
/// * `height` - The height of the source image
/// * `params` - Additional compressor parameters
/// * `output` - Output buffer for the compressed image. Ensure that this has
///   at least as much space available as [`compressed_size`] suggests.
///
/// Returns the non-fatal conditions raised while encoding.
pub fn compress(
    format: Format,
    rgba: &[u8],
    width: usize,
    height: usize,
    params: Params,
    output: &mut [u8],
) -> Result<EncodingStatus, Error> {
    let mut image = Image::new(format, rgba, width, height, params.error_metric)?;
    match params.strategy {
        Strategy::SinglePass => image.encode_singlepass(params.effort, output),
        Strategy::MultiPass { block_percent } => image.encode(block_percent, params.effort, output),
    }
}

/// Decompresses an image in memory
///
/// * `format` - The format of the compressed data
/// * `data`   - The compressed image data
/// * `width`  - The width of the source image
/// * `height` - The height of the source image
/// * `output` - Space to store the decompressed image, `width * height * 4` bytes
pub fn decompress(
    format: Format,
    data: &[u8],
    width: usize,
    height: usize,
    output: &mut [u8],
) -> Result<EncodingStatus, Error> {
    Image::without_source(format, width, height)?.decode(data, output)
}

//--------------------------------------------------------------------------------
// Unit tests
//--------------------------------------------------------------------------------
