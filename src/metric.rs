use crate::color::ColorFloatRgba;

/// Weights based on the perceived brightness of each colour channel (Rec. 709 luma)
pub const REC709_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Distance function used to rank candidate encodings.
///
/// The metric is chosen once per image and applied to every block, so errors of
/// different blocks and modes stay comparable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ErrorMetric {
    /// Unweighted squared distance over all channels
    Numeric,

    /// Squared channel distance weighted by Rec. 709 luma
    #[default]
    Rec709,

    /// Squared distance of alpha-premultiplied colour, so invisible pixels cost nothing
    Rgba,
}

impl ErrorMetric {
    /// Distance between two colours. Symmetric, and zero for identical colours.
    pub fn distance(self, a: &ColorFloatRgba, b: &ColorFloatRgba) -> f32 {
        let da = a.a - b.a;
        match self {
            ErrorMetric::Numeric => {
                let dr = a.r - b.r;
                let dg = a.g - b.g;
                let db = a.b - b.b;
                dr * dr + dg * dg + db * db + da * da
            }
            ErrorMetric::Rec709 => {
                let dr = a.r - b.r;
                let dg = a.g - b.g;
                let db = a.b - b.b;
                REC709_WEIGHTS[0] * dr * dr
                    + REC709_WEIGHTS[1] * dg * dg
                    + REC709_WEIGHTS[2] * db * db
                    + da * da
            }
            ErrorMetric::Rgba => {
                let dr = a.r * a.a - b.r * b.a;
                let dg = a.g * a.a - b.g * b.a;
                let db = a.b * a.a - b.b * b.a;
                dr * dr + dg * dg + db * db + da * da
            }
        }
    }

    /// Distance between two values of a single isolated channel.
    ///
    /// Used by the single and dual channel formats, where each channel is encoded
    /// on its own and only active channels are compared.
    pub fn channel_distance(self, a: f32, b: f32) -> f32 {
        let d = a - b;
        d * d
    }

    pub const fn name(self) -> &'static str {
        match self {
            ErrorMetric::Numeric => "NUMERIC",
            ErrorMetric::Rec709 => "REC709",
            ErrorMetric::Rgba => "RGBA",
        }
    }
}

impl core::fmt::Display for ErrorMetric {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METRICS: [ErrorMetric; 3] = [ErrorMetric::Numeric, ErrorMetric::Rec709, ErrorMetric::Rgba];

    #[test]
    fn test_identical_colours_have_zero_distance() {
        let c = ColorFloatRgba::new(0.2, 0.4, 0.6, 0.8);
        for metric in METRICS {
            assert_eq!(metric.distance(&c, &c), 0.0);
        }
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = ColorFloatRgba::new(0.1, 0.9, 0.3, 1.0);
        let b = ColorFloatRgba::new(0.7, 0.2, 0.5, 0.4);
        for metric in METRICS {
            assert_eq!(metric.distance(&a, &b), metric.distance(&b, &a));
            assert!(metric.distance(&a, &b) > 0.0);
        }
    }

    #[test]
    fn test_luma_weighting() {
        let black = ColorFloatRgba::new(0.0, 0.0, 0.0, 1.0);
        let green = ColorFloatRgba::new(0.0, 1.0, 0.0, 1.0);
        let blue = ColorFloatRgba::new(0.0, 0.0, 1.0, 1.0);
        let metric = ErrorMetric::Rec709;
        assert!(metric.distance(&black, &green) > metric.distance(&black, &blue));
        assert_eq!(
            ErrorMetric::Numeric.distance(&black, &green),
            ErrorMetric::Numeric.distance(&black, &blue)
        );
    }

    #[test]
    fn test_rgba_ignores_colour_of_transparent_pixels() {
        let a = ColorFloatRgba::new(1.0, 0.0, 0.0, 0.0);
        let b = ColorFloatRgba::new(0.0, 1.0, 1.0, 0.0);
        assert_eq!(ErrorMetric::Rgba.distance(&a, &b), 0.0);
        assert!(ErrorMetric::Numeric.distance(&a, &b) > 0.0);
    }

    #[test]
    fn test_channel_distance() {
        assert_eq!(ErrorMetric::Numeric.channel_distance(0.25, 0.75), 0.25);
        assert_eq!(ErrorMetric::Rec709.channel_distance(0.5, 0.5), 0.0);
    }
}
