//! Wavenumber intervals and the numeric kernels used for harmonization.
//!
//! This module provides:
//! - `WavenumberInterval` with the overlap test shared by band definition and harmonization
//! - Uniform grid construction (`linspace`)
//! - Linear interpolation that yields NaN outside the sampled range
//! - Trapezoidal integration over arbitrary abscissae
//! - Unit conversions for the harmonized output

use serde::{Deserialize, Serialize};

/// Speed of light in vacuum [m/s].
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Factor between raw cross-sections in cm² and stored cross-sections in m².
pub const CM2_PER_M2: f64 = 1.0e4;

/// A closed wavenumber interval `[min, max]` in cm⁻¹.
///
/// Serialized as a two-element array `[min, max]`, matching the band
/// configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct WavenumberInterval {
    pub min: f64,
    pub max: f64,
}

impl WavenumberInterval {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Width of the interval in cm⁻¹.
    #[inline]
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Length of the intersection with `other`, zero when disjoint or touching.
    pub fn overlap(&self, other: &WavenumberInterval) -> f64 {
        let lo = self.min.max(other.min);
        let hi = self.max.min(other.max);
        (hi - lo).max(0.0)
    }

    /// True when the intersection with `other` has nonzero length.
    #[inline]
    pub fn overlaps(&self, other: &WavenumberInterval) -> bool {
        self.min.max(other.min) < self.max.min(other.max)
    }

    /// True for finite bounds with `min < max`.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }

    /// Midpoint of the interval.
    #[inline]
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    /// True when `w` lies inside the closed interval.
    #[inline]
    pub fn contains(&self, w: f64) -> bool {
        self.min <= w && w <= self.max
    }
}

impl From<[f64; 2]> for WavenumberInterval {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<WavenumberInterval> for [f64; 2] {
    fn from(interval: WavenumberInterval) -> Self {
        [interval.min, interval.max]
    }
}

/// `count` evenly spaced values from `start` to `stop`, both inclusive.
///
/// A count of one yields `[start]`, a count of zero an empty vector. The last
/// element is set to `stop` exactly so grid edges compare equal to band edges.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            let mut grid: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
            grid[count - 1] = stop;
            grid
        }
    }
}

/// Linearly interpolate `ys` sampled at ascending `xs` onto `targets`.
///
/// Targets outside `[xs[0], xs[last]]` evaluate to NaN; no extrapolation is
/// performed. A single sample only defines its own abscissa.
pub fn interp_linear(xs: &[f64], ys: &[f64], targets: &[f64]) -> Vec<f64> {
    debug_assert_eq!(xs.len(), ys.len(), "xs and ys must have same length");

    let n = xs.len().min(ys.len());
    if n == 0 {
        return vec![f64::NAN; targets.len()];
    }
    let (lo, hi) = (xs[0], xs[n - 1]);

    targets
        .iter()
        .map(|&x| {
            if x.is_nan() || x < lo || x > hi {
                return f64::NAN;
            }
            if n == 1 {
                return ys[0];
            }
            // First index with xs[i] > x, bracketed to a valid segment
            let upper = xs[..n].partition_point(|&v| v <= x).clamp(1, n - 1);
            let (x0, x1) = (xs[upper - 1], xs[upper]);
            let (y0, y1) = (ys[upper - 1], ys[upper]);
            if x1 == x0 {
                return y1;
            }
            y0 + (y1 - y0) * (x - x0) / (x1 - x0)
        })
        .collect()
}

/// Trapezoidal integral of `ys` over `xs`.
pub fn trapz(ys: &[f64], xs: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len(), "xs and ys must have same length");

    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (x[1] - x[0]) * (y[0] + y[1]))
        .sum()
}

/// Convert a wavenumber in cm⁻¹ to a frequency in Hz.
#[inline]
pub fn wavenumber_to_frequency(wavenumber: f64) -> f64 {
    wavenumber * SPEED_OF_LIGHT * 100.0
}

/// Convert a cross-section in cm² to m².
#[inline]
pub fn cm2_to_m2(xsec: f64) -> f64 {
    xsec / CM2_PER_M2
}
