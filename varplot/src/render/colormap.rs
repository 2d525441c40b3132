//! Viridis colormap sampled from a small anchor table with linear interpolation.

use plotters::style::RGBColor;

/// Viridis anchors at evenly spaced positions in [0, 1]
const VIRIDIS: [(u8, u8, u8); 9] = [
    (68, 1, 84),
    (71, 45, 123),
    (59, 82, 139),
    (44, 114, 142),
    (33, 145, 140),
    (40, 174, 128),
    (94, 201, 98),
    (173, 220, 48),
    (253, 231, 37),
];

/// Maps a scalar range onto viridis colors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Colormap {
    min: f64,
    max: f64,
    reversed: bool,
}

impl Colormap {
    pub fn viridis(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            reversed: false,
        }
    }

    /// Bright for low values, dark for high values
    pub fn viridis_r(min: f64, max: f64) -> Self {
        Self {
            reversed: true,
            ..Self::viridis(min, max)
        }
    }

    /// Colormap spanning the finite values of `values`; a degenerate range is widened by ±0.5
    pub fn spanning(values: impl IntoIterator<Item = f64>, reversed: bool) -> Self {
        let (mut min, mut max) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() || !max.is_finite() {
            min = 0.0;
            max = 1.0;
        } else if max - min < f64::EPSILON {
            min -= 0.5;
            max += 0.5;
        }
        Self { min, max, reversed }
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// Position of `value` in [0, 1], clamped; NaN maps to 0
    pub fn normalize(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return 0.0;
        }
        let t = ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        if self.reversed {
            1.0 - t
        } else {
            t
        }
    }

    pub fn color(&self, value: f64) -> RGBColor {
        sample(self.normalize(value))
    }
}

fn sample(t: f64) -> RGBColor {
    let scaled = t.clamp(0.0, 1.0) * (VIRIDIS.len() - 1) as f64;
    let lower = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - lower as f64;

    let (r0, g0, b0) = VIRIDIS[lower];
    let (r1, g1, b1) = VIRIDIS[lower + 1];
    let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * frac).round() as u8;

    RGBColor(lerp(r0, r1), lerp(g0, g1), lerp(b0, b1))
}
