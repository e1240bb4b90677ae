//! The 64-bit ETC1/ETC2 colour block.
//!
//! The block is handled as a big-endian `u64`. The upper 32 bits hold the mode
//! parameters, the lower 32 bits the selector planes: most significant selector
//! bits in bits 31..16 and least significant in bits 15..0.

use super::{field, put, wire_index};
use crate::color::{expand_bits, expand_rgb, offset_rgb, Rgba8};
use crate::tables::{DISTANCES, MODIFIERS};

/// Decoder rules that apply to a colour block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColourFamily {
    /// Individual and differential modes only
    Etc1,
    /// Adds T, H and planar modes in place of overflowing differential blocks
    Etc2,
    /// ETC2 without individual mode; the differential flag is the opaque bit
    PunchThrough,
}

/// A colour block whose bits cannot be decoded under its family's rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MalformedBlock;

/// Parameters of one colour block, one variant per mode.
///
/// Selectors are stored per pixel in raster order (`y * 4 + x`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColourBits {
    /// Two 4-bit base colours, one per half.
    Individual {
        flip: bool,
        colours: [[u8; 3]; 2],
        tables: [u8; 2],
        selectors: [u8; 16],
    },
    /// A 5-bit base colour for the first half and a signed 3-bit delta to the second.
    Differential {
        flip: bool,
        base: [u8; 3],
        delta: [i8; 3],
        tables: [u8; 2],
        selectors: [u8; 16],
    },
    /// Two 4-bit colours; the second is spread by a distance.
    T {
        colours: [[u8; 3]; 2],
        distance: u8,
        selectors: [u8; 16],
    },
    /// Two 4-bit colours, both spread by a distance.
    ///
    /// `distance` holds the two stored bits. The low bit of the distance index is
    /// implied by the colour order: set when the first colour is not smaller.
    H {
        colours: [[u8; 3]; 2],
        distance: u8,
        selectors: [u8; 16],
    },
    /// Origin, horizontal and vertical colours at 6/7/6 bits.
    Planar {
        origin: [u8; 3],
        horizontal: [u8; 3],
        vertical: [u8; 3],
    },
}

/// Pixels of the two halves, in raster order.
///
/// Indexed by the flip bit: unflipped blocks split into left and right 2x4
/// columns, flipped blocks into top and bottom 4x2 rows.
pub(crate) const HALVES: [[[usize; 8]; 2]; 2] = [
    [[0, 1, 4, 5, 8, 9, 12, 13], [2, 3, 6, 7, 10, 11, 14, 15]],
    [[0, 1, 2, 3, 4, 5, 6, 7], [8, 9, 10, 11, 12, 13, 14, 15]],
];

const PLANAR_BITS: [u32; 3] = [6, 7, 6];

fn sign_extend3(v: u64) -> i32 {
    let v = v as i32;
    if v & 4 != 0 {
        v - 8
    } else {
        v
    }
}

/// Whether the 5-bit field at `lsb` plus the 3-bit delta below it leaves 0..=31.
fn overflows(v: u64, lsb: u32) -> bool {
    let sum = field(v, lsb, 5) as i32 + sign_extend3(field(v, lsb - 3, 3));
    !(0..=31).contains(&sum)
}

/// Fills the don't-care bits in `free` so that the differential sum of the
/// channel at `lsb` overflows exactly when `overflow` is requested.
fn settle(v: &mut u64, lsb: u32, free: u64, overflow: bool) {
    let fixed = *v & !free;
    let mut subset = 0u64;
    loop {
        *v = fixed | subset;
        if overflows(*v, lsb) == overflow || subset == free {
            return;
        }
        subset = subset.wrapping_sub(free) & free;
    }
}

fn pack_selectors(selectors: &[u8; 16]) -> u64 {
    selectors
        .iter()
        .enumerate()
        .fold(0u64, |bits, (i, &s)| {
            let k = wire_index(i);
            bits | (u64::from((s >> 1) & 1) << (16 + k)) | (u64::from(s & 1) << k)
        })
}

fn unpack_selectors(v: u64) -> [u8; 16] {
    let mut selectors = [0u8; 16];
    for (i, s) in selectors.iter_mut().enumerate() {
        let k = wire_index(i);
        *s = ((field(v, 16 + k, 1) << 1) | field(v, k, 1)) as u8;
    }
    selectors
}

fn pack12(rgb: [u8; 3]) -> u16 {
    (u16::from(rgb[0]) << 8) | (u16::from(rgb[1]) << 4) | u16::from(rgb[2])
}

/// Full 3-bit H-mode distance index for a stored pair of distance bits.
pub(crate) fn h_distance_index(colours: &[[u8; 3]; 2], distance: u8) -> usize {
    let order = pack12(colours[0]) >= pack12(colours[1]);
    (usize::from(distance & 3) << 1) | usize::from(order)
}

impl ColourBits {
    /// Serializes the block. Non-individual modes set the differential flag.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut v = 0u64;
        match *self {
            ColourBits::Individual {
                flip,
                colours,
                tables,
                selectors,
            } => {
                for c in 0..3 {
                    put(&mut v, 60 - 8 * c as u32, 4, colours[0][c].into());
                    put(&mut v, 56 - 8 * c as u32, 4, colours[1][c].into());
                }
                put(&mut v, 37, 3, tables[0].into());
                put(&mut v, 34, 3, tables[1].into());
                put(&mut v, 32, 1, flip.into());
                v |= pack_selectors(&selectors);
            }
            ColourBits::Differential {
                flip,
                base,
                delta,
                tables,
                selectors,
            } => {
                for c in 0..3 {
                    put(&mut v, 59 - 8 * c as u32, 5, base[c].into());
                    put(&mut v, 56 - 8 * c as u32, 3, (delta[c] as u8).into());
                }
                put(&mut v, 37, 3, tables[0].into());
                put(&mut v, 34, 3, tables[1].into());
                put(&mut v, 33, 1, 1);
                put(&mut v, 32, 1, flip.into());
                v |= pack_selectors(&selectors);
            }
            ColourBits::T {
                colours,
                distance,
                selectors,
            } => {
                let [c1, c2] = colours;
                put(&mut v, 59, 2, u64::from(c1[0] >> 2));
                put(&mut v, 56, 2, u64::from(c1[0] & 3));
                put(&mut v, 52, 4, c1[1].into());
                put(&mut v, 48, 4, c1[2].into());
                put(&mut v, 44, 4, c2[0].into());
                put(&mut v, 40, 4, c2[1].into());
                put(&mut v, 36, 4, c2[2].into());
                put(&mut v, 34, 2, u64::from(distance >> 1));
                put(&mut v, 33, 1, 1);
                put(&mut v, 32, 1, u64::from(distance & 1));
                v |= pack_selectors(&selectors);
                settle(&mut v, 59, 0b1110_0100 << 56, true);
            }
            ColourBits::H {
                colours,
                distance,
                selectors,
            } => {
                let [c1, c2] = colours;
                put(&mut v, 59, 4, c1[0].into());
                put(&mut v, 56, 3, u64::from(c1[1] >> 1));
                put(&mut v, 52, 1, u64::from(c1[1] & 1));
                put(&mut v, 51, 1, u64::from(c1[2] >> 3));
                put(&mut v, 47, 3, u64::from(c1[2] & 7));
                put(&mut v, 43, 4, c2[0].into());
                put(&mut v, 39, 4, c2[1].into());
                put(&mut v, 35, 4, c2[2].into());
                put(&mut v, 34, 1, u64::from((distance >> 1) & 1));
                put(&mut v, 33, 1, 1);
                put(&mut v, 32, 1, u64::from(distance & 1));
                v |= pack_selectors(&selectors);
                settle(&mut v, 59, 1 << 63, false);
                settle(&mut v, 51, 0b1110_0100 << 48, true);
            }
            ColourBits::Planar {
                origin,
                horizontal,
                vertical,
            } => {
                put(&mut v, 57, 6, origin[0].into());
                put(&mut v, 56, 1, u64::from(origin[1] >> 6));
                put(&mut v, 49, 6, u64::from(origin[1] & 63));
                put(&mut v, 48, 1, u64::from(origin[2] >> 5));
                put(&mut v, 43, 2, u64::from((origin[2] >> 3) & 3));
                put(&mut v, 39, 3, u64::from(origin[2] & 7));
                put(&mut v, 34, 5, u64::from(horizontal[0] >> 1));
                put(&mut v, 33, 1, 1);
                put(&mut v, 32, 1, u64::from(horizontal[0] & 1));
                put(&mut v, 25, 7, horizontal[1].into());
                put(&mut v, 19, 6, horizontal[2].into());
                put(&mut v, 13, 6, vertical[0].into());
                put(&mut v, 6, 7, vertical[1].into());
                put(&mut v, 0, 6, vertical[2].into());
                settle(&mut v, 59, 1 << 63, false);
                settle(&mut v, 51, 1 << 55, false);
                settle(&mut v, 43, 0b1110_0100 << 40, true);
            }
        }
        v.to_be_bytes()
    }

    /// Parses a block under the rules of `family`.
    pub fn from_bytes(bytes: &[u8; 8], family: ColourFamily) -> Result<Self, MalformedBlock> {
        let v = u64::from_be_bytes(*bytes);
        let flip = field(v, 32, 1) == 1;
        let tables = [field(v, 37, 3) as u8, field(v, 34, 3) as u8];
        let differential = family == ColourFamily::PunchThrough || field(v, 33, 1) == 1;

        if !differential {
            let mut colours = [[0u8; 3]; 2];
            for c in 0..3 {
                colours[0][c] = field(v, 60 - 8 * c as u32, 4) as u8;
                colours[1][c] = field(v, 56 - 8 * c as u32, 4) as u8;
            }
            return Ok(ColourBits::Individual {
                flip,
                colours,
                tables,
                selectors: unpack_selectors(v),
            });
        }

        let overflow = [overflows(v, 59), overflows(v, 51), overflows(v, 43)];
        if family == ColourFamily::Etc1 {
            if overflow.contains(&true) {
                return Err(MalformedBlock);
            }
        } else if overflow[0] {
            let c1 = [
                ((field(v, 59, 2) << 2) | field(v, 56, 2)) as u8,
                field(v, 52, 4) as u8,
                field(v, 48, 4) as u8,
            ];
            let c2 = [
                field(v, 44, 4) as u8,
                field(v, 40, 4) as u8,
                field(v, 36, 4) as u8,
            ];
            return Ok(ColourBits::T {
                colours: [c1, c2],
                distance: ((field(v, 34, 2) << 1) | field(v, 32, 1)) as u8,
                selectors: unpack_selectors(v),
            });
        } else if overflow[1] {
            let c1 = [
                field(v, 59, 4) as u8,
                ((field(v, 56, 3) << 1) | field(v, 52, 1)) as u8,
                ((field(v, 51, 1) << 3) | field(v, 47, 3)) as u8,
            ];
            let c2 = [
                field(v, 43, 4) as u8,
                field(v, 39, 4) as u8,
                field(v, 35, 4) as u8,
            ];
            return Ok(ColourBits::H {
                colours: [c1, c2],
                distance: ((field(v, 34, 1) << 1) | field(v, 32, 1)) as u8,
                selectors: unpack_selectors(v),
            });
        } else if overflow[2] {
            return Ok(ColourBits::Planar {
                origin: [
                    field(v, 57, 6) as u8,
                    ((field(v, 56, 1) << 6) | field(v, 49, 6)) as u8,
                    ((field(v, 48, 1) << 5) | (field(v, 43, 2) << 3) | field(v, 39, 3)) as u8,
                ],
                horizontal: [
                    ((field(v, 34, 5) << 1) | field(v, 32, 1)) as u8,
                    field(v, 25, 7) as u8,
                    field(v, 19, 6) as u8,
                ],
                vertical: [
                    field(v, 13, 6) as u8,
                    field(v, 6, 7) as u8,
                    field(v, 0, 6) as u8,
                ],
            });
        }

        let mut base = [0u8; 3];
        let mut delta = [0i8; 3];
        for c in 0..3 {
            base[c] = field(v, 59 - 8 * c as u32, 5) as u8;
            delta[c] = sign_extend3(field(v, 56 - 8 * c as u32, 3)) as i8;
        }
        Ok(ColourBits::Differential {
            flip,
            base,
            delta,
            tables,
            selectors: unpack_selectors(v),
        })
    }

    /// Reconstructs the 16 pixels in raster order.
    ///
    /// `non_opaque` applies the punch-through rules of a block whose opaque bit is
    /// clear: selector 2 is transparent black and the differential selector 0
    /// leaves the base colour unmodified.
    pub fn decode(&self, non_opaque: bool) -> [Rgba8; 16] {
        match *self {
            ColourBits::Individual {
                flip,
                colours,
                tables,
                selectors,
            } => {
                let bases = [expand_rgb(colours[0], 4), expand_rgb(colours[1], 4)];
                decode_halves(flip, bases, tables, &selectors, non_opaque)
            }
            ColourBits::Differential {
                flip,
                base,
                delta,
                tables,
                selectors,
            } => {
                let second = differential_second(base, delta);
                let bases = [expand_rgb(base, 5), expand_rgb(second, 5)];
                decode_halves(flip, bases, tables, &selectors, non_opaque)
            }
            ColourBits::T {
                colours,
                distance,
                selectors,
            } => {
                let paints = t_paints(&colours, usize::from(distance & 7));
                decode_paints(&paints, &selectors, non_opaque)
            }
            ColourBits::H {
                colours,
                distance,
                selectors,
            } => {
                let paints = h_paints(&colours, h_distance_index(&colours, distance));
                decode_paints(&paints, &selectors, non_opaque)
            }
            ColourBits::Planar {
                origin,
                horizontal,
                vertical,
            } => decode_planar(origin, horizontal, vertical),
        }
    }
}

/// 5-bit base colour of the second half, clamped for out-of-range deltas.
pub(crate) fn differential_second(base: [u8; 3], delta: [i8; 3]) -> [u8; 3] {
    let add = |c: usize| (i16::from(base[c]) + i16::from(delta[c])).clamp(0, 31) as u8;
    [add(0), add(1), add(2)]
}

/// Colour a half-block selector produces, or `None` for the transparent selector.
pub(crate) fn modified(base: [u8; 3], table: u8, selector: u8, non_opaque: bool) -> Option<[u8; 3]> {
    let selector = usize::from(selector & 3);
    if non_opaque {
        match selector {
            0 => return Some(base),
            2 => return None,
            _ => {}
        }
    }
    Some(offset_rgb(base, MODIFIERS[usize::from(table & 7)][selector]))
}

/// Paint colours of the T mode: `c1, c2 + d, c2, c2 - d`.
pub(crate) fn t_paints(colours: &[[u8; 3]; 2], distance: usize) -> [[u8; 3]; 4] {
    let c1 = expand_rgb(colours[0], 4);
    let c2 = expand_rgb(colours[1], 4);
    let d = DISTANCES[distance & 7];
    [c1, offset_rgb(c2, d), c2, offset_rgb(c2, -d)]
}

/// Paint colours of the H mode: `c1 + d, c1 - d, c2 + d, c2 - d`.
pub(crate) fn h_paints(colours: &[[u8; 3]; 2], distance: usize) -> [[u8; 3]; 4] {
    let c1 = expand_rgb(colours[0], 4);
    let c2 = expand_rgb(colours[1], 4);
    let d = DISTANCES[distance & 7];
    [
        offset_rgb(c1, d),
        offset_rgb(c1, -d),
        offset_rgb(c2, d),
        offset_rgb(c2, -d),
    ]
}

fn opaque(rgb: [u8; 3]) -> Rgba8 {
    [rgb[0], rgb[1], rgb[2], 255]
}

fn decode_halves(
    flip: bool,
    bases: [[u8; 3]; 2],
    tables: [u8; 2],
    selectors: &[u8; 16],
    non_opaque: bool,
) -> [Rgba8; 16] {
    let mut rgba = [[0u8; 4]; 16];
    for (half, pixels) in HALVES[usize::from(flip)].iter().enumerate() {
        for &i in pixels {
            rgba[i] = match modified(bases[half], tables[half], selectors[i], non_opaque) {
                Some(rgb) => opaque(rgb),
                None => [0; 4],
            };
        }
    }
    rgba
}

fn decode_paints(paints: &[[u8; 3]; 4], selectors: &[u8; 16], non_opaque: bool) -> [Rgba8; 16] {
    let mut rgba = [[0u8; 4]; 16];
    for (pixel, &s) in rgba.iter_mut().zip(selectors) {
        let s = usize::from(s & 3);
        *pixel = if non_opaque && s == 2 {
            [0; 4]
        } else {
            opaque(paints[s])
        };
    }
    rgba
}

pub(crate) fn decode_planar(origin: [u8; 3], horizontal: [u8; 3], vertical: [u8; 3]) -> [Rgba8; 16] {
    let mut o = [0i32; 3];
    let mut h = [0i32; 3];
    let mut v = [0i32; 3];
    for c in 0..3 {
        o[c] = i32::from(expand_bits(origin[c], PLANAR_BITS[c]));
        h[c] = i32::from(expand_bits(horizontal[c], PLANAR_BITS[c]));
        v[c] = i32::from(expand_bits(vertical[c], PLANAR_BITS[c]));
    }

    let mut rgba = [[0u8; 4]; 16];
    for (i, pixel) in rgba.iter_mut().enumerate() {
        let x = (i % 4) as i32;
        let y = (i / 4) as i32;
        for c in 0..3 {
            let value = (x * (h[c] - o[c]) + y * (v[c] - o[c]) + 4 * o[c] + 2) >> 2;
            pixel[c] = value.clamp(0, 255) as u8;
        }
        pixel[3] = 255;
    }
    rgba
}
