//! Per-tile mode search.

mod colour;
mod eac;

use crate::bits::{ColourFamily, EacKind, EncodingBits};
use crate::color::{ColorFloatRgba, Rgba8};
use crate::format::{EncodingBitsFormat, Format};
use crate::metric::ErrorMetric;
use crate::status::EncodingStatus;

/// How much of the candidate space the encoder visits.
///
/// Each field only grows with effort, so a higher effort always evaluates a
/// superset of the candidates of a lower one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SearchDepth {
    /// Radius around the quantized half-block average for individual and differential bases
    pub base_radius: i32,
    /// Whether the T and H modes are tried at all
    pub two_colour_modes: bool,
    /// Radius of the neighbourhood search around each T/H colour
    pub two_colour_radius: i32,
    /// Coordinate refinement of the planar fit
    pub refine_planar: bool,
    /// Radius around the estimated EAC base
    pub eac_base_radius: i32,
    /// Spread around the estimated EAC multiplier, `None` to try them all
    pub eac_multiplier_radius: Option<i32>,
}

impl SearchDepth {
    pub(crate) fn from_effort(effort: f32) -> Self {
        SearchDepth {
            base_radius: if effort < 25.0 {
                0
            } else if effort < 75.0 {
                1
            } else {
                2
            },
            two_colour_modes: effort >= 50.0,
            two_colour_radius: if effort >= 75.0 { 1 } else { 0 },
            refine_planar: effort >= 25.0,
            eac_base_radius: if effort < 25.0 {
                0
            } else if effort < 75.0 {
                2
            } else {
                4
            },
            eac_multiplier_radius: if effort < 25.0 {
                Some(0)
            } else if effort < 75.0 {
                Some(2)
            } else {
                None
            },
        }
    }
}

/// The best encoding found for one block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct BlockEncoding {
    pub bits: EncodingBits,
    pub error: f32,
    pub status: EncodingStatus,
}

/// A 4x4 tile of source pixels in raster order.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Block4x4 {
    rgba: [Rgba8; 16],
    pixels: [ColorFloatRgba; 16],
}

impl Block4x4 {
    pub(crate) fn new(rgba: [Rgba8; 16]) -> Self {
        Block4x4 {
            rgba,
            pixels: rgba.map(ColorFloatRgba::from_rgba8),
        }
    }

    /// Searches the modes of `format` for the encoding with the lowest error.
    pub(crate) fn encode(&self, format: Format, metric: ErrorMetric, effort: f32) -> BlockEncoding {
        let depth = SearchDepth::from_effort(effort);
        let family = if format == Format::Etc1 {
            ColourFamily::Etc1
        } else {
            ColourFamily::Etc2
        };

        let (bits, error) = match format.encoding_bits_format() {
            EncodingBitsFormat::Rgb8 => {
                let fit = colour::encode(&self.pixels, metric, family, &depth);
                (EncodingBits::Rgb8(fit.bits), fit.error)
            }
            EncodingBitsFormat::Rgb8A1 => {
                let fit = colour::encode(&self.pixels, metric, ColourFamily::PunchThrough, &depth);
                let opaque = !fit.non_opaque;
                (
                    EncodingBits::Rgb8A1 {
                        opaque,
                        colour: fit.bits,
                    },
                    fit.error,
                )
            }
            EncodingBitsFormat::Rgba8 => {
                let fit = colour::encode(&self.pixels, metric, family, &depth);
                let (alpha, alpha_error) = eac::encode(&self.channel(3), EacKind::Alpha, metric, &depth);
                (
                    EncodingBits::Rgba8 {
                        alpha,
                        colour: fit.bits,
                    },
                    fit.error + alpha_error,
                )
            }
            EncodingBitsFormat::R11 => {
                let kind = EacKind::for_channel(format.is_signed());
                let (red, error) = eac::encode(&self.channel(0), kind, metric, &depth);
                (EncodingBits::R11(red), error)
            }
            EncodingBitsFormat::Rg11 => {
                let kind = EacKind::for_channel(format.is_signed());
                let (red, red_error) = eac::encode(&self.channel(0), kind, metric, &depth);
                let (green, green_error) = eac::encode(&self.channel(1), kind, metric, &depth);
                (EncodingBits::Rg11 { red, green }, red_error + green_error)
            }
        };

        BlockEncoding {
            bits,
            error,
            status: self.source_status(format),
        }
    }

    fn channel(&self, c: usize) -> [f32; 16] {
        self.pixels.map(|p| match c {
            0 => p.r,
            1 => p.g,
            2 => p.b,
            _ => p.a,
        })
    }

    /// Warnings about source content the format cannot represent.
    fn source_status(&self, format: Format) -> EncodingStatus {
        let mut status = EncodingStatus::SUCCESS;
        match format.encoding_bits_format() {
            EncodingBitsFormat::Rgb8 => {
                if self.rgba.iter().any(|p| p[3] < 255) {
                    status |= EncodingStatus::SOME_NON_OPAQUE_PIXELS;
                }
            }
            EncodingBitsFormat::Rgb8A1 => {
                if self.rgba.iter().any(|p| p[3] > 0 && p[3] < 255) {
                    status |= EncodingStatus::SOME_TRANSLUCENT_PIXELS;
                }
            }
            EncodingBitsFormat::Rgba8 => {}
            EncodingBitsFormat::R11 => {
                if self.rgba.iter().any(|p| p[1] != 0) {
                    status |= EncodingStatus::SOME_GREEN_VALUES_ARE_NOT_ZERO;
                }
                if self.rgba.iter().any(|p| p[2] != 0) {
                    status |= EncodingStatus::SOME_BLUE_VALUES_ARE_NOT_ZERO;
                }
            }
            EncodingBitsFormat::Rg11 => {
                if self.rgba.iter().any(|p| p[2] != 0) {
                    status |= EncodingStatus::SOME_BLUE_VALUES_ARE_NOT_ZERO;
                }
            }
        }
        status
    }
}
