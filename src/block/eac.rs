//! Base, multiplier and table search for EAC channels.

use super::SearchDepth;
use crate::bits::{eac_to_unit, eac_value, EacBits, EacKind};
use crate::metric::ErrorMetric;
use crate::tables::{EAC_MODIFIERS, EAC_ZERO_TABLE};

/// Storage range of the base and its scale on the kind's native range.
struct BaseRange {
    min: i32,
    max: i32,
    unit: f32,
    offset: f32,
}

impl BaseRange {
    fn of(kind: EacKind) -> Self {
        match kind {
            EacKind::Alpha => BaseRange {
                min: 0,
                max: 255,
                unit: 1.0,
                offset: 0.0,
            },
            EacKind::R11 => BaseRange {
                min: 0,
                max: 255,
                unit: 8.0,
                offset: 4.0,
            },
            EacKind::SignedR11 => BaseRange {
                min: -127,
                max: 127,
                unit: 8.0,
                offset: 0.0,
            },
        }
    }

    /// Nearest base for a value on the native range.
    fn nearest(&self, native: f32) -> i32 {
        (libm::roundf((native - self.offset) / self.unit) as i32).clamp(self.min, self.max)
    }
}

fn to_native(kind: EacKind, v: f32) -> f32 {
    match kind {
        EacKind::Alpha => v * 255.0,
        EacKind::R11 => v * 2047.0,
        EacKind::SignedR11 => v * 2046.0 - 1023.0,
    }
}

/// Evaluates one parameter set, choosing the closest modifier for every pixel.
fn evaluate(values: &[f32; 16], kind: EacKind, metric: ErrorMetric, base: i32, multiplier: u8, table: u8) -> (EacBits, f32) {
    // signed bases are stored as two's complement
    let base = base as i8 as u8;
    let levels = EAC_MODIFIERS[usize::from(table)].map(|m| eac_to_unit(kind, eac_value(kind, base, multiplier, m)));

    let mut selectors = [0u8; 16];
    let mut total = 0.0;
    for (selector, &v) in selectors.iter_mut().zip(values) {
        let mut best = (0u8, f32::MAX);
        for (s, &level) in levels.iter().enumerate() {
            let error = metric.channel_distance(v, level);
            if error < best.1 {
                best = (s as u8, error);
            }
        }
        *selector = best.0;
        total += best.1;
    }

    (
        EacBits {
            base,
            multiplier,
            table,
            selectors,
        },
        total,
    )
}

/// Finds the EAC block with the lowest error for one channel of unit-range values.
pub(crate) fn encode(values: &[f32; 16], kind: EacKind, metric: ErrorMetric, depth: &SearchDepth) -> (EacBits, f32) {
    let targets: [f32; 16] = core::array::from_fn(|i| to_native(kind, values[i]));
    let lo = targets.iter().copied().fold(f32::MAX, f32::min);
    let hi = targets.iter().copied().fold(f32::MIN, f32::max);
    let mean = targets.iter().sum::<f32>() / 16.0;
    let range = BaseRange::of(kind);

    // a flat block through the table holding a zero modifier
    let mut best = evaluate(values, kind, metric, range.nearest(mean), 1, EAC_ZERO_TABLE);

    for (table, modifiers) in EAC_MODIFIERS.iter().enumerate() {
        let low = f32::from(modifiers.iter().copied().min().unwrap_or(0));
        let high = f32::from(modifiers.iter().copied().max().unwrap_or(0));
        let estimate = libm::roundf((hi - lo) / ((high - low) * range.unit)).clamp(1.0, 15.0) as i32;

        let multipliers = match depth.eac_multiplier_radius {
            Some(radius) => (estimate - radius).max(1)..=(estimate + radius).min(15),
            None if kind == EacKind::Alpha => 1..=15,
            None => 0..=15,
        };

        for multiplier in multipliers {
            let step = if multiplier == 0 {
                1.0
            } else {
                multiplier as f32 * range.unit
            };
            let centre = range.nearest((lo + hi) / 2.0 - step * (low + high) / 2.0);
            let bases = (centre - depth.eac_base_radius).max(range.min)..=(centre + depth.eac_base_radius).min(range.max);
            for base in bases {
                let candidate = evaluate(values, kind, metric, base, multiplier as u8, table as u8);
                if candidate.1 < best.1 {
                    best = candidate;
                }
            }
        }
    }

    best
}
