//! Overview plots of raw cross-section data with band overlays.
//!
//! Each species is rendered as one PNG: raw spectra on a logarithmic
//! cross-section axis, with the defined bands drawn as translucent rectangles.

use std::path::{Path, PathBuf};

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::PlotConfig;
use crate::core::loaders::SpeciesData;
use crate::core::transforms::WavenumberInterval;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("No spectra to plot for {0}")]
    EmptySpecies(String),

    #[error("Invalid cross-section range [{0}, {1}]")]
    InvalidRange(f64, f64),
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Maximum number of points drawn per spectrum.
const MAX_POINTS_PER_LINE: usize = 5000;

/// Line colors, one per measurement set.
const SET_COLORS: &[(u8, u8, u8)] = &[
    (55, 126, 184),  // Blue
    (228, 26, 28),   // Red
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (0, 206, 209),   // Turquoise
];

/// Band rectangle colors.
const BAND_COLORS: &[(u8, u8, u8)] = &[
    (255, 215, 0),   // Gold
    (0, 191, 255),   // Deep Sky Blue
    (50, 205, 50),   // Lime Green
    (255, 20, 147),  // Deep Pink
];

/// Renders a species' raw data together with band intervals.
pub trait OverviewPlotter {
    /// Plot `data` with `bands` overlaid, returning the written file.
    fn plot(&self, data: &SpeciesData, bands: &[WavenumberInterval]) -> Result<PathBuf>;
}

/// Writes `<dir>/<species>.png` overview images.
#[derive(Debug, Clone)]
pub struct PngOverviewPlotter {
    dir: PathBuf,
    config: PlotConfig,
}

impl PngOverviewPlotter {
    pub fn new<P: Into<PathBuf>>(dir: P, config: PlotConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
        }
    }
}

impl OverviewPlotter for PngOverviewPlotter {
    fn plot(&self, data: &SpeciesData, bands: &[WavenumberInterval]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.png", data.species));
        plot_species_overview(&path, data, bands, &self.config)?;
        Ok(path)
    }
}

/// Wavenumber range covered by all measurements, `None` without spectra.
fn wavenumber_bounds(data: &SpeciesData) -> Option<(f64, f64)> {
    let measurements = data.measurements();
    let lo = measurements
        .iter()
        .map(|m| m.wmin)
        .filter(|w| w.is_finite())
        .min_by(|a, b| a.total_cmp(b))?;
    let hi = measurements
        .iter()
        .map(|m| m.wmax)
        .filter(|w| w.is_finite())
        .max_by(|a, b| a.total_cmp(b))?;

    if (hi - lo).abs() < f64::EPSILON {
        Some((lo - 1.0, hi + 1.0))
    } else {
        Some((lo, hi))
    }
}

/// Plot the raw spectra of a species on a log axis with band rectangles.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `data` - Raw measurement sets of the species
/// * `bands` - Band intervals to overlay
/// * `config` - Image size and cross-section axis range
pub fn plot_species_overview(
    output_path: &Path,
    data: &SpeciesData,
    bands: &[WavenumberInterval],
    config: &PlotConfig,
) -> Result<()> {
    let (x_min, x_max) = wavenumber_bounds(data)
        .ok_or_else(|| VisualizationError::EmptySpecies(data.species.clone()))?;

    let (y_min, y_max) = (config.y_min, config.y_max);
    if !(y_min > 0.0 && y_max > y_min) {
        return Err(VisualizationError::InvalidRange(y_min, y_max));
    }

    let x_padding = (x_max - x_min) * 0.02;

    let root = BitMapBackend::new(output_path, (config.width, config.height)).into_drawing_area();

    root.fill(&WHITE)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min..y_max).log_scale(),
        )
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .draw()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    // Bands first so spectra stay visible on top
    chart
        .draw_series(bands.iter().enumerate().map(|(i, band)| {
            let c = BAND_COLORS[i % BAND_COLORS.len()];
            Rectangle::new(
                [(band.min, y_min), (band.max, y_max)],
                RGBColor(c.0, c.1, c.2).mix(0.25).filled(),
            )
        }))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    for (set_idx, set) in data.sets.iter().enumerate() {
        let c = SET_COLORS[set_idx % SET_COLORS.len()];
        let color = RGBColor(c.0, c.1, c.2);

        for measurement in &set.measurements {
            let n = measurement.len();
            let step = if n > MAX_POINTS_PER_LINE {
                n / MAX_POINTS_PER_LINE
            } else {
                1
            };

            // Values below the axis floor cannot be shown on a log scale
            let points: Vec<(f64, f64)> = measurement
                .native_grid()
                .into_iter()
                .zip(measurement.xsec.iter().copied())
                .step_by(step)
                .map(|(w, x)| (w, x.clamp(y_min, y_max)))
                .collect();

            chart
                .draw_series(LineSeries::new(points, color.stroke_width(1)))
                .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;
        }
    }

    root.present()
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    log::info!("Overview plot -> {}", output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::tests::measurement;
    use crate::core::loaders::MeasurementSet;
    use tempfile::tempdir;

    fn species() -> SpeciesData {
        SpeciesData::new(
            "TEST",
            vec![
                MeasurementSet::new(vec![measurement(700.0, 800.0, 101, 1.0e-19)]),
                MeasurementSet::new(vec![measurement(750.0, 900.0, 151, 0.0)]),
            ],
        )
    }

    #[test]
    fn test_wavenumber_bounds() {
        assert_eq!(wavenumber_bounds(&species()), Some((700.0, 900.0)));
        assert_eq!(wavenumber_bounds(&SpeciesData::new("EMPTY", vec![])), None);
    }

    #[test]
    fn test_empty_species_is_rejected() {
        let dir = tempdir().unwrap();
        let result = plot_species_overview(
            &dir.path().join("empty.png"),
            &SpeciesData::new("EMPTY", vec![]),
            &[],
            &PlotConfig::default(),
        );
        assert!(matches!(result, Err(VisualizationError::EmptySpecies(_))));
    }

    #[test]
    fn test_invalid_range_is_rejected() {
        let dir = tempdir().unwrap();
        let config = PlotConfig {
            y_min: 0.0,
            ..PlotConfig::default()
        };
        let result = plot_species_overview(&dir.path().join("x.png"), &species(), &[], &config);
        assert!(matches!(result, Err(VisualizationError::InvalidRange(_, _))));
    }

    #[test]
    fn test_png_plotter_writes_file() {
        let dir = tempdir().unwrap();
        let config = PlotConfig {
            width: 320,
            height: 200,
            ..PlotConfig::default()
        };
        let plotter = PngOverviewPlotter::new(dir.path().join("plots"), config);

        let bands = vec![
            WavenumberInterval::new(700.0, 750.0),
            WavenumberInterval::new(750.0, 900.0),
        ];
        let path = plotter.plot(&species(), &bands).unwrap();

        assert_eq!(path, dir.path().join("plots").join("TEST.png"));
        assert!(path.exists());
    }
}
