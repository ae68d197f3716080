//! Harmonization of raw measurements onto a shared grid per band.
//!
//! For each band, every overlapping measurement is linearly resampled onto a
//! uniform grid at the finest native step among those measurements. Values
//! outside a measurement's native range become zero, negative values are
//! clamped, and the resampling error is tracked as the relative difference
//! between the shared-grid and native-grid integrals over the band.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use thiserror::Error;

use crate::core::loaders::{HarmonizedSample, RawMeasurement};
use crate::core::transforms::{
    cm2_to_m2, interp_linear, linspace, trapz, wavenumber_to_frequency, WavenumberInterval,
};
use crate::core::writers::QualityRecord;

/// Errors that abort harmonization of a species.
#[derive(Debug, Error, PartialEq)]
pub enum HarmonizeError {
    #[error("band {band_index} [{min}, {max}]: no measurement overlaps the band")]
    NoCoverage { band_index: usize, min: f64, max: f64 },

    #[error("band {band_index}: invalid harmonization step {delta_w}")]
    InvalidStep { band_index: usize, delta_w: f64 },

    #[error("band {band_index}: grid of {points} point(s) cannot span the band")]
    DegenerateGrid { band_index: usize, points: usize },

    #[error(
        "band {band_index}: produced {produced} samples but only {expected} measurements overlap the band"
    )]
    InconsistentSampleCount {
        band_index: usize,
        produced: usize,
        expected: usize,
    },
}

/// Data-quality findings for one harmonized measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDiagnostics {
    /// Negative values in the raw measurement.
    pub negatives_raw: usize,
    /// Negative values after interpolation, before clamping.
    pub negatives_interpolated: usize,
    /// Grid points outside the measurement's native range.
    pub undefined_points: usize,
    /// Shared-grid integral over native-grid integral minus one.
    pub delta_int_relative: Option<f64>,
}

/// All harmonized measurements of one (species, band) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonizedBand {
    pub species: String,
    pub index: usize,
    pub band: WavenumberInterval,
    /// Harmonization step, the finest native step among overlapping measurements.
    pub delta_w: f64,
    /// Shared grid, without its first point when it duplicates the previous band edge.
    pub grid: Vec<f64>,
    pub samples: Vec<HarmonizedSample>,
    /// Diagnostics, parallel to `samples`.
    pub diagnostics: Vec<SampleDiagnostics>,
}

impl HarmonizedBand {
    /// One quality-report row per sample.
    pub fn quality_records(&self) -> Vec<QualityRecord> {
        self.samples
            .iter()
            .zip(&self.diagnostics)
            .map(|(sample, diag)| QualityRecord {
                species: self.species.clone(),
                band: self.index,
                band_min: self.band.min,
                band_max: self.band.max,
                delta_w: self.delta_w,
                grid_points: self.grid.len(),
                xscfile: sample.xscfile.clone(),
                temperature: sample.temperature,
                pressure: sample.pressure,
                native_step: sample.delta_wvn_rawdata,
                int_xsec_cm2_per_cm: sample.int_xsec,
                delta_int_relative: diag.delta_int_relative,
                negatives_raw: diag.negatives_raw,
                negatives_interpolated: diag.negatives_interpolated,
                undefined_points: diag.undefined_points,
            })
            .collect()
    }
}

/// Whether `measurement` takes part in harmonizing `band`.
///
/// Measurements with fewer than two samples have no native step and are left out.
fn contributes(band: &WavenumberInterval, measurement: &RawMeasurement) -> bool {
    band.overlaps(&measurement.interval()) && measurement.len() >= 2
}

/// Finest native step among measurements overlapping `band`, with their count.
///
/// Returns `None` when no usable measurement overlaps the band.
pub fn harmonization_step(
    band: &WavenumberInterval,
    measurements: &[&RawMeasurement],
) -> Option<(f64, usize)> {
    let steps: Vec<f64> = measurements
        .iter()
        .filter(|m| contributes(band, m))
        .map(|m| m.native_step())
        .collect();

    if steps.is_empty() {
        return None;
    }

    let delta_w = steps.iter().copied().fold(f64::INFINITY, f64::min);
    Some((delta_w, steps.len()))
}

/// Number of grid points for a band at step `delta_w`.
#[inline]
pub fn grid_size(band: &WavenumberInterval, delta_w: f64) -> usize {
    (band.width() / delta_w).round().max(0.0) as usize
}

/// Shared grid over `band`; drops the first point when it equals `previous_max`.
pub fn build_grid(band: &WavenumberInterval, delta_w: f64, previous_max: Option<f64>) -> Vec<f64> {
    let mut grid = linspace(band.min, band.max, grid_size(band, delta_w));

    if previous_max == Some(band.min) && !grid.is_empty() {
        grid.remove(0);
    }

    grid
}

/// Resample one measurement onto `grid` and record its quality metrics.
///
/// `grid` must be non-empty.
pub fn resample_measurement(
    measurement: &RawMeasurement,
    band: &WavenumberInterval,
    grid: &[f64],
) -> (HarmonizedSample, SampleDiagnostics) {
    let native_grid = measurement.native_grid();

    let negatives_raw = measurement.xsec.iter().filter(|&&v| v < 0.0).count();
    if negatives_raw > 0 {
        warn!(
            "{}: {} negative cross-sections encountered in data",
            measurement.xscfile, negatives_raw
        );
    }

    // NaN outside the native range
    let interpolated = interp_linear(&native_grid, &measurement.xsec, grid);
    let undefined_points = interpolated.iter().filter(|v| v.is_nan()).count();
    let cleared: Vec<f64> = interpolated
        .iter()
        .map(|&v| if v.is_nan() { 0.0 } else { v })
        .collect();

    let shared_integral = trapz(&cleared, grid);

    let windowed: Vec<f64> = native_grid
        .iter()
        .zip(&measurement.xsec)
        .map(|(&w, &x)| if band.min <= w && w < band.max { x } else { 0.0 })
        .collect();
    let native_integral = trapz(&windowed, &native_grid);

    let ratio = shared_integral / native_integral - 1.0;
    let delta_int_relative = if native_integral != 0.0 && ratio.is_finite() {
        Some(ratio)
    } else {
        None
    };

    let negatives_interpolated = cleared.iter().filter(|&&v| v < 0.0).count();
    if negatives_interpolated > 0 {
        warn!(
            "{}: {} negative cross-sections encountered after interpolation",
            measurement.xscfile, negatives_interpolated
        );
    }

    let xsec: Vec<f64> = cleared.iter().map(|&v| cm2_to_m2(v.max(0.0))).collect();

    let wmin = grid[0];
    let wmax = grid[grid.len() - 1];

    let sample = HarmonizedSample {
        xsec,
        wmin,
        wmax,
        fmin: wavenumber_to_frequency(wmin),
        fmax: wavenumber_to_frequency(wmax),
        temperature: measurement.temperature,
        pressure: measurement.pressure,
        xscfile: measurement.xscfile.clone(),
        species: measurement.species.clone(),
        int_xsec: native_integral,
        delta_int_xsec_relative: delta_int_relative,
        delta_wvn_rawdata: measurement.native_step(),
        wmin_rawdata: measurement.wmin,
        wmax_rawdata: measurement.wmax,
    };

    let diagnostics = SampleDiagnostics {
        negatives_raw,
        negatives_interpolated,
        undefined_points,
        delta_int_relative,
    };

    (sample, diagnostics)
}

/// Harmonize all measurements overlapping one band.
///
/// `previous_max` is the upper edge of the band processed before this one for
/// the same species; a grid point equal to it is not emitted again.
///
/// # Errors
///
/// - `NoCoverage` if no measurement overlaps the band
/// - `InvalidStep` if the finest native step is not a positive finite number
/// - `DegenerateGrid` if the band holds fewer than two grid points
/// - `InconsistentSampleCount` if more samples are produced than measurements
///   were found to overlap the band
pub fn harmonize_band(
    species: &str,
    index: usize,
    band: WavenumberInterval,
    measurements: &[&RawMeasurement],
    previous_max: Option<f64>,
) -> std::result::Result<HarmonizedBand, HarmonizeError> {
    let (delta_w, expected) =
        harmonization_step(&band, measurements).ok_or(HarmonizeError::NoCoverage {
            band_index: index,
            min: band.min,
            max: band.max,
        })?;

    if !(delta_w.is_finite() && delta_w > 0.0) {
        return Err(HarmonizeError::InvalidStep {
            band_index: index,
            delta_w,
        });
    }

    let points = grid_size(&band, delta_w);
    if points < 2 {
        return Err(HarmonizeError::DegenerateGrid {
            band_index: index,
            points,
        });
    }

    let grid = build_grid(&band, delta_w, previous_max);

    info!(
        "{} band {}: [{}, {}] dw = {:.5} cm⁻¹, N_wvn = {}",
        species,
        index,
        band.min,
        band.max,
        delta_w,
        grid.len()
    );

    let mut samples = Vec::with_capacity(expected);
    let mut diagnostics = Vec::with_capacity(expected);

    for (k, measurement) in measurements.iter().enumerate() {
        if !contributes(&band, measurement) {
            if band.overlaps(&measurement.interval()) {
                warn!(
                    "{}: skipped, {} sample(s) give no native step",
                    measurement.xscfile,
                    measurement.len()
                );
            }
            continue;
        }

        if samples.len() + 1 > expected {
            return Err(HarmonizeError::InconsistentSampleCount {
                band_index: index,
                produced: samples.len() + 1,
                expected,
            });
        }

        debug!(
            "species {} - band {} - observation {} ({})",
            species, index, k, measurement.xscfile
        );

        let (sample, diag) = resample_measurement(measurement, &band, &grid);

        if let Some(delta) = diag.delta_int_relative {
            debug!("{}: relative integration error {:.3e}", measurement.xscfile, delta);
        }

        samples.push(sample);
        diagnostics.push(diag);
    }

    Ok(HarmonizedBand {
        species: species.to_string(),
        index,
        band,
        delta_w,
        grid,
        samples,
        diagnostics,
    })
}

/// Harmonize every band of a species in order.
///
/// The upper edge of each band is carried into the next one so shared edge
/// points are emitted once. Each finished band is handed to `emit` before the
/// next one is started; the first error stops the species.
///
/// # Returns
///
/// The number of bands harmonized.
pub fn harmonize_species<F>(
    species: &str,
    bands: &[WavenumberInterval],
    measurements: &[&RawMeasurement],
    mut emit: F,
) -> Result<usize>
where
    F: FnMut(&HarmonizedBand) -> Result<()>,
{
    bands
        .iter()
        .enumerate()
        .try_fold(None, |previous_max: Option<f64>, (index, band)| {
            let harmonized = harmonize_band(species, index, *band, measurements, previous_max)
                .with_context(|| format!("Failed to harmonize {}", species))?;
            emit(&harmonized)?;
            Ok::<_, anyhow::Error>(Some(band.max))
        })?;

    Ok(bands.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::tests::measurement;
    use crate::processors::bands::{define_bands, BandChoice, SetCoverage};

    fn iv(min: f64, max: f64) -> WavenumberInterval {
        WavenumberInterval::new(min, max)
    }

    fn collect_species(
        bands: &[WavenumberInterval],
        measurements: &[&RawMeasurement],
    ) -> Vec<HarmonizedBand> {
        let mut out = Vec::new();
        harmonize_species("TEST", bands, measurements, |b| {
            out.push(b.clone());
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn test_adjacent_bands_drop_shared_edge() {
        let m1 = measurement(0.0, 100.0, 101, 1.0e-20);
        let m2 = measurement(100.0, 200.0, 101, 2.0e-20);
        let measurements = vec![&m1, &m2];

        let coverage: Vec<SetCoverage> = measurements
            .iter()
            .map(|m| SetCoverage::of_measurement(m))
            .collect();
        let bands = define_bands(&coverage, BandChoice::Suggested).unwrap().bands;
        assert_eq!(bands, vec![iv(0.0, 100.0), iv(100.0, 200.0)]);

        let result = collect_species(&bands, &measurements);
        assert_eq!(result.len(), 2);

        let first = &result[0];
        assert_eq!(first.delta_w, 1.0);
        assert_eq!(first.grid.len(), 100);
        assert_eq!(first.grid[0], 0.0);
        assert_eq!(first.grid[99], 100.0);
        assert_eq!(first.samples.len(), 1);

        let second = &result[1];
        assert_eq!(second.grid.len(), 99);
        assert!(second.grid[0] > 100.0);
        assert_eq!(second.grid[98], 200.0);
        assert_eq!(second.samples.len(), 1);
        assert_eq!(second.samples[0].wmax, 200.0);
        assert!(second.samples[0].wmin > 100.0);
        assert_eq!(second.samples[0].xscfile, m2.xscfile);
    }

    #[test]
    fn test_overlapping_measurements_share_finest_grid() {
        let coarse = measurement(0.0, 50.0, 51, 1.0);
        let fine = measurement(20.0, 70.0, 101, 2.0);

        let band = harmonize_band("TEST", 0, iv(0.0, 70.0), &[&coarse, &fine], None).unwrap();

        assert_eq!(band.delta_w, 0.5);
        assert_eq!(band.grid.len(), 140);
        assert_eq!(band.grid[0], 0.0);
        assert_eq!(band.grid[139], 70.0);
        assert_eq!(band.samples.len(), 2);

        for (w, &x) in band.grid.iter().zip(&band.samples[0].xsec) {
            if *w > 50.0 {
                assert_eq!(x, 0.0);
            } else {
                assert!((x - 1.0e-4).abs() < 1e-15);
            }
        }
        for (w, &x) in band.grid.iter().zip(&band.samples[1].xsec) {
            if *w < 20.0 {
                assert_eq!(x, 0.0);
            }
        }
        assert!(band.diagnostics[0].undefined_points > 0);
    }

    #[test]
    fn test_measurement_outside_band_is_ignored() {
        let inside = measurement(0.0, 100.0, 101, 1.0);
        let outside = measurement(200.0, 300.0, 1001, 1.0);

        let band =
            harmonize_band("TEST", 0, iv(0.0, 100.0), &[&inside, &outside], None).unwrap();

        assert_eq!(band.delta_w, 1.0);
        assert_eq!(band.samples.len(), 1);
        assert_eq!(band.samples[0].xscfile, inside.xscfile);
    }

    #[test]
    fn test_harmonization_step_only_from_overlapping() {
        let inside = measurement(0.0, 100.0, 101, 1.0);
        let touching = measurement(100.0, 110.0, 1001, 1.0);

        assert_eq!(
            harmonization_step(&iv(0.0, 100.0), &[&inside, &touching]),
            Some((1.0, 1))
        );
        assert_eq!(harmonization_step(&iv(500.0, 600.0), &[&inside]), None);
    }

    #[test]
    fn test_measurement_without_samples_is_skipped() {
        let good = measurement(0.0, 10.0, 11, 1.0);
        let empty = measurement(0.0, 10.0, 0, 1.0);
        let single = measurement(2.0, 8.0, 1, 1.0);

        let band =
            harmonize_band("TEST", 0, iv(0.0, 10.0), &[&empty, &good, &single], None).unwrap();

        assert_eq!(band.delta_w, 1.0);
        assert_eq!(band.samples.len(), 1);
        assert_eq!(band.samples[0].xscfile, good.xscfile);

        assert_eq!(
            harmonize_band("TEST", 1, iv(0.0, 10.0), &[&empty], None),
            Err(HarmonizeError::NoCoverage {
                band_index: 1,
                min: 0.0,
                max: 10.0
            })
        );
    }

    #[test]
    fn test_bands_separated_by_gap_keep_first_point() {
        let low = measurement(0.0, 10.0, 11, 1.0);
        let high = measurement(20.0, 30.0, 11, 1.0);

        let result = collect_species(&[iv(0.0, 10.0), iv(20.0, 30.0)], &[&low, &high]);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].grid.len(), 10);
        assert_eq!(result[1].grid.len(), 10);
        assert_eq!(result[1].grid[0], 20.0);
        assert_eq!(result[1].grid[9], 30.0);
        assert_eq!(result[1].samples[0].wmin, 20.0);
    }

    #[test]
    fn test_negative_values_are_clamped() {
        let mut m = measurement(0.0, 10.0, 11, 1.0e-20);
        m.xsec[3] = -5.0e-21;
        m.xsec[4] = -1.0e-21;

        let band = harmonize_band("TEST", 0, iv(0.0, 10.0), &[&m], None).unwrap();

        assert!(band.samples[0].xsec.iter().all(|&v| v >= 0.0));
        assert_eq!(band.diagnostics[0].negatives_raw, 2);
        assert!(band.diagnostics[0].negatives_interpolated > 0);
    }

    #[test]
    fn test_units_and_frequencies() {
        let m = measurement(1000.0, 1010.0, 11, 1.0e-20);
        let band = harmonize_band("TEST", 0, iv(1000.0, 1010.0), &[&m], None).unwrap();
        let sample = &band.samples[0];

        assert!(sample.xsec.iter().all(|&v| (v / 1.0e-24 - 1.0).abs() < 1e-9));
        assert_eq!(sample.fmin, 1000.0 * 299_792_458.0 * 100.0);
        assert_eq!(sample.fmax, 1010.0 * 299_792_458.0 * 100.0);
        assert_eq!(sample.delta_wvn_rawdata, 1.0);
        assert_eq!(sample.wmin_rawdata, 1000.0);
        assert_eq!(sample.wmax_rawdata, 1010.0);
    }

    #[test]
    fn test_integration_error_is_recorded() {
        let m = measurement(0.0, 50.0, 51, 1.0);
        let band = harmonize_band("TEST", 0, iv(0.0, 70.0), &[&m], None).unwrap();
        let sample = &band.samples[0];

        // Native integral of a constant 1 over [0, 50]
        assert!((sample.int_xsec - 50.0).abs() < 1e-9);
        let delta = sample.delta_int_xsec_relative.unwrap();
        assert!(delta.abs() < 0.02);
        assert_eq!(band.diagnostics[0].delta_int_relative, Some(delta));
    }

    #[test]
    fn test_zero_integral_has_no_relative_error() {
        let m = measurement(0.0, 10.0, 11, 0.0);
        let band = harmonize_band("TEST", 0, iv(0.0, 10.0), &[&m], None).unwrap();
        assert_eq!(band.samples[0].delta_int_xsec_relative, None);
    }

    #[test]
    fn test_harmonization_is_deterministic() {
        let a = measurement(0.0, 50.0, 51, 3.0e-19);
        let mut b = measurement(20.0, 70.0, 101, 1.0e-19);
        b.xsec.iter_mut().enumerate().for_each(|(i, v)| *v *= i as f64);

        let first = harmonize_band("TEST", 0, iv(0.0, 70.0), &[&a, &b], None).unwrap();
        let second = harmonize_band("TEST", 0, iv(0.0, 70.0), &[&a, &b], None).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_band_without_coverage_fails() {
        let m = measurement(0.0, 10.0, 11, 1.0);
        assert_eq!(
            harmonize_band("TEST", 2, iv(20.0, 30.0), &[&m], None),
            Err(HarmonizeError::NoCoverage {
                band_index: 2,
                min: 20.0,
                max: 30.0
            })
        );
    }

    #[test]
    fn test_degenerate_grid_fails() {
        let m = measurement(0.0, 10.0, 11, 1.0);
        assert_eq!(
            harmonize_band("TEST", 0, iv(0.0, 1.2), &[&m], None),
            Err(HarmonizeError::DegenerateGrid {
                band_index: 0,
                points: 1
            })
        );
    }

    #[test]
    fn test_species_stops_at_first_failing_band() {
        let m = measurement(0.0, 10.0, 11, 1.0);
        let bands = vec![iv(0.0, 10.0), iv(20.0, 30.0), iv(5.0, 10.0)];
        let mut emitted = Vec::new();

        let result = harmonize_species("TEST", &bands, &[&m], |b| {
            emitted.push(b.index);
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(emitted, vec![0]);
    }

    #[test]
    fn test_quality_records_follow_samples() {
        let a = measurement(0.0, 50.0, 51, 1.0);
        let b = measurement(20.0, 70.0, 101, 1.0);
        let band = harmonize_band("TEST", 3, iv(0.0, 70.0), &[&a, &b], None).unwrap();

        let records = band.quality_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].band, 3);
        assert_eq!(records[0].grid_points, 140);
        assert_eq!(records[1].native_step, 0.5);
        assert_eq!(records[1].xscfile, b.xscfile);
    }
}
