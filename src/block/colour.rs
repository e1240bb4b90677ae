//! Mode search for the ETC1/ETC2 colour block.
//!
//! Once base colours and a table (or distance) are fixed, every pixel picks its
//! selector independently, so the search only enumerates base parameters and
//! lets `Fitter::assign` settle the selectors.

use alloc::vec::Vec;

use super::SearchDepth;
use crate::bits::{
    decode_planar, differential_second, h_distance_index, h_paints, modified, t_paints, ColourBits, ColourFamily,
    HALVES,
};
use crate::color::{expand_rgb, quantize_bits, quantize_rgb, ColorFloatRgba};
use crate::metric::ErrorMetric;

/// Best colour block found and whether it uses the punch-through transparent rules.
pub(crate) struct ColourFit {
    pub bits: ColourBits,
    pub error: f32,
    pub non_opaque: bool,
}

struct Candidate {
    bits: ColourBits,
    error: f32,
}

/// Replaces `best` only on a strictly lower error, so earlier modes win ties.
fn keep(best: &mut Candidate, candidate: Candidate) {
    if candidate.error < best.error {
        *best = candidate;
    }
}

/// Fit of one half-block for a fixed base colour.
#[derive(Clone, Copy)]
struct HalfFit {
    base: [u8; 3],
    table: u8,
    error: f32,
    selectors: [u8; 16],
}

const ALL_PIXELS: [usize; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

const PLANAR_BITS: [u32; 3] = [6, 7, 6];

/// Colour triples within `radius` of `centre` (clamped to `0..=max`), centre first.
fn neighbours(centre: [u8; 3], radius: i32, max: u8) -> Vec<[u8; 3]> {
    let range = |c: u8| (i32::from(c) - radius).max(0)..=(i32::from(c) + radius).min(i32::from(max));
    let mut out = Vec::with_capacity(((2 * radius + 1) as usize).pow(3));
    out.push(centre);
    for r in range(centre[0]) {
        for g in range(centre[1]) {
            for b in range(centre[2]) {
                let candidate = [r as u8, g as u8, b as u8];
                if candidate != centre {
                    out.push(candidate);
                }
            }
        }
    }
    out
}

/// Second differential base closest to `target` that `first` can reach.
fn second_near(first: [u8; 3], target: [u8; 3]) -> [u8; 3] {
    let step = |c: usize| (i16::from(first[c]) + (i16::from(target[c]) - i16::from(first[c])).clamp(-4, 3)) as u8;
    [step(0), step(1), step(2)]
}

/// First differential base closest to `target` that can reach `second`.
fn first_near(second: [u8; 3], target: [u8; 3]) -> [u8; 3] {
    let step = |c: usize| (i16::from(second[c]) - (i16::from(second[c]) - i16::from(target[c])).clamp(-4, 3)) as u8;
    [step(0), step(1), step(2)]
}

fn distance_sq(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    d[0] * d[0] + d[1] * d[1] + d[2] * d[2]
}

struct Fitter<'a> {
    pixels: &'a [ColorFloatRgba; 16],
    metric: ErrorMetric,
    transparent: [bool; 16],
    non_opaque: bool,
}

impl Fitter<'_> {
    fn pixel_error(&self, i: usize, rgb: [u8; 3]) -> f32 {
        let source = &self.pixels[i];
        self.metric.distance(source, &ColorFloatRgba::from_rgb8(rgb, source.a))
    }

    /// Pixels that must take the transparent selector.
    fn forced(&self, i: usize) -> bool {
        self.non_opaque && self.transparent[i]
    }

    /// Assigns each pixel the paint with the lowest error and returns the total.
    ///
    /// Forced pixels take selector 2 at no cost; under punch-through rules no other
    /// pixel may use it.
    fn assign(&self, indices: &[usize], paints: &[[u8; 3]; 4], selectors: &mut [u8; 16]) -> f32 {
        let mut total = 0.0;
        for &i in indices {
            if self.forced(i) {
                selectors[i] = 2;
                continue;
            }
            let mut best = (0u8, f32::MAX);
            for (s, paint) in paints.iter().enumerate() {
                if self.non_opaque && s == 2 {
                    continue;
                }
                let error = self.pixel_error(i, *paint);
                if error < best.1 {
                    best = (s as u8, error);
                }
            }
            selectors[i] = best.0;
            total += best.1;
        }
        total
    }

    /// Mean RGB (8-bit scale) of the non-forced pixels among `indices`.
    fn average(&self, indices: &[usize]) -> [f32; 3] {
        let mut sum = [0.0f32; 3];
        let mut count = 0;
        for &i in indices.iter().filter(|&&i| !self.forced(i)) {
            let rgb = self.pixels[i].rgb255();
            for c in 0..3 {
                sum[c] += rgb[c];
            }
            count += 1;
        }
        if count == 0 {
            return sum;
        }
        sum.map(|s| s / count as f32)
    }

    fn fit_half(&self, pixels: &[usize; 8], base: [u8; 3], bits: u32) -> HalfFit {
        let expanded = expand_rgb(base, bits);
        let mut best = HalfFit {
            base,
            table: 0,
            error: f32::MAX,
            selectors: [0; 16],
        };
        let mut selectors = [0u8; 16];
        for table in 0..8u8 {
            // the transparent selector has no colour, any placeholder is never picked
            let paints: [[u8; 3]; 4] =
                core::array::from_fn(|s| modified(expanded, table, s as u8, self.non_opaque).unwrap_or(expanded));
            let error = self.assign(pixels, &paints, &mut selectors);
            if error < best.error {
                best.table = table;
                best.error = error;
                best.selectors = selectors;
            }
        }
        best
    }

    fn fit_halves(&self, flip: bool, bits: u32, radius: i32) -> [Vec<HalfFit>; 2] {
        let max = ((1u32 << bits) - 1) as u8;
        let halves = &HALVES[usize::from(flip)];
        [0, 1].map(|h| {
            let centre = quantize_rgb(self.average(&halves[h]), bits);
            neighbours(centre, radius, max)
                .into_iter()
                .map(|base| self.fit_half(&halves[h], base, bits))
                .collect()
        })
    }

    fn merge_selectors(flip: bool, first: &HalfFit, second: &HalfFit) -> [u8; 16] {
        let mut selectors = first.selectors;
        for &i in &HALVES[usize::from(flip)][1] {
            selectors[i] = second.selectors[i];
        }
        selectors
    }

    fn individual(&self, flip: bool, radius: i32) -> Candidate {
        let [first, second] = self.fit_halves(flip, 4, radius);
        let pick = |fits: &[HalfFit]| {
            fits.iter()
                .fold(fits[0], |best, fit| if fit.error < best.error { *fit } else { best })
        };
        let (a, b) = (pick(&first), pick(&second));
        Candidate {
            bits: ColourBits::Individual {
                flip,
                colours: [a.base, b.base],
                tables: [a.table, b.table],
                selectors: Self::merge_selectors(flip, &a, &b),
            },
            error: a.error + b.error,
        }
    }

    fn differential(&self, flip: bool, radius: i32) -> Candidate {
        let halves = &HALVES[usize::from(flip)];
        let [first, second] = self.fit_halves(flip, 5, radius);
        let (c0, c1) = (first[0].base, second[0].base);

        // pairs derived from the two centres stay valid whatever the averages are
        let fallbacks = [
            (first[0], self.fit_half(&halves[1], second_near(c0, c1), 5)),
            (self.fit_half(&halves[0], first_near(c1, c0), 5), second[0]),
        ];

        let valid = |a: &HalfFit, b: &HalfFit| {
            (0..3).all(|c| (-4..=3).contains(&(i16::from(b.base[c]) - i16::from(a.base[c]))))
        };
        let mut best = fallbacks[0];
        for (a, b) in fallbacks.iter().skip(1) {
            if a.error + b.error < best.0.error + best.1.error {
                best = (*a, *b);
            }
        }
        for a in &first {
            for b in &second {
                if a.error + b.error < best.0.error + best.1.error && valid(a, b) {
                    best = (*a, *b);
                }
            }
        }

        let (a, b) = best;
        let delta: [i8; 3] = core::array::from_fn(|c| (i16::from(b.base[c]) - i16::from(a.base[c])) as i8);
        debug_assert_eq!(differential_second(a.base, delta), b.base);
        Candidate {
            bits: ColourBits::Differential {
                flip,
                base: a.base,
                delta,
                tables: [a.table, b.table],
                selectors: Self::merge_selectors(flip, &a, &b),
            },
            error: a.error + b.error,
        }
    }

    fn planar_error(&self, origin: [u8; 3], horizontal: [u8; 3], vertical: [u8; 3]) -> f32 {
        decode_planar(origin, horizontal, vertical)
            .iter()
            .enumerate()
            .map(|(i, p)| self.pixel_error(i, [p[0], p[1], p[2]]))
            .sum()
    }

    /// Least-squares plane through the block, optionally refined one step at a time.
    fn planar(&self, refine: bool) -> Candidate {
        let mut mean = [0.0f32; 3];
        let mut slope_x = [0.0f32; 3];
        let mut slope_y = [0.0f32; 3];
        for (i, pixel) in self.pixels.iter().enumerate() {
            let x = (i % 4) as f32 - 1.5;
            let y = (i / 4) as f32 - 1.5;
            let rgb = pixel.rgb255();
            for c in 0..3 {
                mean[c] += rgb[c] / 16.0;
                slope_x[c] += x * rgb[c] / 20.0;
                slope_y[c] += y * rgb[c] / 20.0;
            }
        }

        let mut params = [[0u8; 3]; 3];
        for c in 0..3 {
            let origin = mean[c] - 1.5 * slope_x[c] - 1.5 * slope_y[c];
            params[0][c] = quantize_bits(origin, PLANAR_BITS[c]);
            params[1][c] = quantize_bits(origin + 4.0 * slope_x[c], PLANAR_BITS[c]);
            params[2][c] = quantize_bits(origin + 4.0 * slope_y[c], PLANAR_BITS[c]);
        }
        let mut error = self.planar_error(params[0], params[1], params[2]);

        if refine {
            for p in 0..3 {
                for c in 0..3 {
                    let max = (1u8 << PLANAR_BITS[c]) - 1;
                    for step in [-1i16, 1] {
                        let value = i16::from(params[p][c]) + step;
                        if !(0..=i16::from(max)).contains(&value) {
                            continue;
                        }
                        let mut trial = params;
                        trial[p][c] = value as u8;
                        let trial_error = self.planar_error(trial[0], trial[1], trial[2]);
                        if trial_error < error {
                            params = trial;
                            error = trial_error;
                        }
                    }
                }
            }
        }

        Candidate {
            bits: ColourBits::Planar {
                origin: params[0],
                horizontal: params[1],
                vertical: params[2],
            },
            error,
        }
    }

    /// Two colour clusters (8-bit scale) of the non-forced pixels.
    fn clusters(&self) -> [[f32; 3]; 2] {
        let members: Vec<usize> = (0..16).filter(|&i| !self.forced(i)).collect();
        let Some(&first) = members.first() else {
            return [[0.0; 3]; 2];
        };
        let rgb = |i: usize| self.pixels[i].rgb255();

        let mut seeds = (first, first);
        let mut widest = -1.0;
        for (n, &i) in members.iter().enumerate() {
            for &j in &members[n + 1..] {
                let d = distance_sq(rgb(i), rgb(j));
                if d > widest {
                    widest = d;
                    seeds = (i, j);
                }
            }
        }

        let mut centres = [rgb(seeds.0), rgb(seeds.1)];
        for _ in 0..2 {
            let mut sums = [[0.0f32; 3]; 2];
            let mut counts = [0usize; 2];
            for &i in &members {
                let colour = rgb(i);
                let k = usize::from(distance_sq(colour, centres[0]) > distance_sq(colour, centres[1]));
                for c in 0..3 {
                    sums[k][c] += colour[c];
                }
                counts[k] += 1;
            }
            for k in 0..2 {
                if counts[k] > 0 {
                    centres[k] = sums[k].map(|s| s / counts[k] as f32);
                }
            }
        }
        centres
    }

    fn eval_t(&self, colours: [[u8; 3]; 2]) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        let mut selectors = [0u8; 16];
        for distance in 0..8usize {
            let error = self.assign(&ALL_PIXELS, &t_paints(&colours, distance), &mut selectors);
            if best.as_ref().map_or(true, |b| error < b.error) {
                best = Some(Candidate {
                    bits: ColourBits::T {
                        colours,
                        distance: distance as u8,
                        selectors,
                    },
                    error,
                });
            }
        }
        best
    }

    fn eval_h(&self, colours: [[u8; 3]; 2]) -> Option<Candidate> {
        let swapped = [colours[1], colours[0]];
        let mut best: Option<Candidate> = None;
        let mut selectors = [0u8; 16];
        for index in 0..8usize {
            // the colour order encodes the low bit of the distance index
            let pair = if h_distance_index(&colours, 0) == index & 1 {
                colours
            } else {
                swapped
            };
            let stored = (index >> 1) as u8;
            if h_distance_index(&pair, stored) != index {
                continue;
            }
            let error = self.assign(&ALL_PIXELS, &h_paints(&pair, index), &mut selectors);
            if best.as_ref().map_or(true, |b| error < b.error) {
                best = Some(Candidate {
                    bits: ColourBits::H {
                        colours: pair,
                        distance: stored,
                        selectors,
                    },
                    error,
                });
            }
        }
        best
    }

    /// Evaluates a colour pair, then walks each colour's neighbourhood in turn.
    fn search_pair<F>(&self, colours: [[u8; 3]; 2], radius: i32, eval: F) -> Option<Candidate>
    where
        F: Fn(&Self, [[u8; 3]; 2]) -> Option<Candidate>,
    {
        let mut best = eval(self, colours);
        if radius == 0 {
            return best;
        }
        let mut pair = colours;
        for slot in 0..2 {
            for colour in neighbours(colours[slot], radius, 15).into_iter().skip(1) {
                let mut trial = pair;
                trial[slot] = colour;
                if let Some(candidate) = eval(self, trial) {
                    if best.as_ref().map_or(true, |b| candidate.error < b.error) {
                        pair = trial;
                        best = Some(candidate);
                    }
                }
            }
        }
        best
    }

    fn two_colour<F>(&self, radius: i32, eval: F) -> Option<Candidate>
    where
        F: Fn(&Self, [[u8; 3]; 2]) -> Option<Candidate> + Copy,
    {
        let [a, b] = self.clusters().map(|c| quantize_rgb(c, 4));
        let mut best: Option<Candidate> = None;
        for colours in [[a, b], [b, a]] {
            if let Some(candidate) = self.search_pair(colours, radius, eval) {
                if best.as_ref().map_or(true, |current| candidate.error < current.error) {
                    best = Some(candidate);
                }
            }
        }
        best
    }
}

/// Finds the colour block with the lowest error for `family`.
pub(crate) fn encode(
    pixels: &[ColorFloatRgba; 16],
    metric: ErrorMetric,
    family: ColourFamily,
    depth: &SearchDepth,
) -> ColourFit {
    let transparent: [bool; 16] = core::array::from_fn(|i| pixels[i].a < 0.5);
    let non_opaque = family == ColourFamily::PunchThrough && transparent.contains(&true);
    let fitter = Fitter {
        pixels,
        metric,
        transparent,
        non_opaque,
    };

    let mut best = fitter.differential(false, depth.base_radius);
    keep(&mut best, fitter.differential(true, depth.base_radius));

    if family != ColourFamily::PunchThrough {
        for flip in [false, true] {
            keep(&mut best, fitter.individual(flip, depth.base_radius));
        }
    }

    if family != ColourFamily::Etc1 {
        if !non_opaque {
            keep(&mut best, fitter.planar(depth.refine_planar));
        }
        if depth.two_colour_modes {
            let radius = depth.two_colour_radius;
            if let Some(t) = fitter.two_colour(radius, Fitter::eval_t) {
                keep(&mut best, t);
            }
            if let Some(h) = fitter.two_colour(radius, Fitter::eval_h) {
                keep(&mut best, h);
            }
        }
    }

    ColourFit {
        bits: best.bits,
        error: best.error,
        non_opaque,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(rgba: [u8; 4]) -> [ColorFloatRgba; 16] {
        [ColorFloatRgba::from_rgba8(rgba); 16]
    }

    fn depth(effort: f32) -> SearchDepth {
        SearchDepth::from_effort(effort)
    }

    #[test]
    fn test_neighbours_centre_first_and_clamped() {
        let n = neighbours([0, 15, 7], 1, 15);
        assert_eq!(n[0], [0, 15, 7]);
        assert_eq!(n.len(), 2 * 2 * 3);
        assert!(n.iter().all(|c| c.iter().all(|&v| v <= 15)));
        assert_eq!(neighbours([3, 3, 3], 0, 31), [[3, 3, 3]]);
    }

    #[test]
    fn test_fallback_bases_stay_in_delta_range() {
        assert_eq!(second_near([0, 10, 31], [31, 10, 0]), [3, 10, 27]);
        assert_eq!(second_near([5, 5, 5], [6, 4, 5]), [6, 4, 5]);
        assert_eq!(first_near([31, 10, 0], [0, 10, 31]), [28, 10, 4]);
        assert_eq!(first_near([6, 4, 5], [5, 5, 5]), [5, 5, 5]);
    }

    #[test]
    fn test_black_block_is_exact() {
        for family in [ColourFamily::Etc1, ColourFamily::Etc2, ColourFamily::PunchThrough] {
            let fit = encode(&solid([0, 0, 0, 255]), ErrorMetric::Numeric, family, &depth(0.0));
            assert_eq!(fit.error, 0.0);
            assert!(!fit.non_opaque);
            assert_eq!(fit.bits.decode(false), [[0, 0, 0, 255]; 16]);
        }
    }

    #[test]
    fn test_mid_grey_needs_base_search() {
        let pixels = solid([136, 136, 136, 255]);
        let fit = encode(&pixels, ErrorMetric::Numeric, ColourFamily::Etc1, &depth(50.0));
        assert_eq!(fit.error, 0.0);
        assert_eq!(fit.bits.decode(false), [[136, 136, 136, 255]; 16]);
    }

    #[test]
    fn test_t_mode_reproduces_4bit_colour() {
        let pixels = solid([255, 0, 136, 255]);
        let fit = encode(&pixels, ErrorMetric::Numeric, ColourFamily::Etc2, &depth(50.0));
        assert_eq!(fit.error, 0.0);
        assert_eq!(fit.bits.decode(false), [[255, 0, 136, 255]; 16]);
    }

    #[test]
    fn test_planar_fits_gradient() {
        let mut pixels = [ColorFloatRgba::default(); 16];
        for (i, p) in pixels.iter_mut().enumerate() {
            let x = (i % 4) as u8;
            let y = (i / 4) as u8;
            *p = ColorFloatRgba::from_rgba8([x * 64, y * 64, 255 - x * 32 - y * 32, 255]);
        }
        let fit = encode(&pixels, ErrorMetric::Numeric, ColourFamily::Etc2, &depth(25.0));
        assert!(matches!(fit.bits, ColourBits::Planar { .. }));
        let decoded = fit.bits.decode(false);
        for (i, p) in decoded.iter().enumerate() {
            let source = pixels[i].to_rgba8();
            for c in 0..3 {
                assert!(p[c].abs_diff(source[c]) <= 4, "pixel {i}: {p:?} vs {source:?}");
            }
        }
    }

    #[test]
    fn test_punch_through_transparent_pixels() {
        let mut rgba = [[200u8, 40, 90, 255]; 16];
        for i in [0, 5, 10, 15] {
            rgba[i] = [0, 0, 0, 0];
        }
        let pixels = rgba.map(ColorFloatRgba::from_rgba8);
        for effort in [0.0, 50.0, 100.0] {
            let fit = encode(&pixels, ErrorMetric::Rec709, ColourFamily::PunchThrough, &depth(effort));
            assert!(fit.non_opaque);
            assert!(!matches!(fit.bits, ColourBits::Planar { .. } | ColourBits::Individual { .. }));
            let decoded = fit.bits.decode(true);
            for (i, p) in decoded.iter().enumerate() {
                assert_eq!(p[3] == 0, rgba[i][3] == 0, "pixel {i}");
            }
        }
    }

    #[test]
    fn test_distant_halves_stay_differential() {
        let mut rgba = [[0u8, 0, 0, 255]; 16];
        for i in HALVES[0][1] {
            rgba[i] = [255, 255, 255, 255];
        }
        let pixels = rgba.map(ColorFloatRgba::from_rgba8);
        let fitter = Fitter {
            pixels: &pixels,
            metric: ErrorMetric::Numeric,
            transparent: [false; 16],
            non_opaque: false,
        };
        let candidate = fitter.differential(false, 0);
        match candidate.bits {
            ColourBits::Differential { delta, .. } => assert!(delta.iter().all(|d| (-4..=3).contains(d))),
            other => panic!("unexpected mode {other:?}"),
        }
        // the individual mode handles this block exactly
        assert_eq!(fitter.individual(false, 0).error, 0.0);
    }
}
