//! Data model and loaders for raw and harmonized cross-section files.
//!
//! This module provides:
//! - The raw measurement model (`RawMeasurement`, `MeasurementSet`, `SpeciesData`)
//! - The harmonized output record (`HarmonizedSample`)
//! - Gzip-compressed JSON readers for both
//! - `MeasurementSource`, the raw-data store abstraction, with a directory-backed implementation

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::transforms::{linspace, WavenumberInterval};

/// File suffix of raw and harmonized data files.
pub const GZ_JSON_SUFFIX: &str = ".json.gz";

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("No raw data for species '{0}'")]
    UnknownSpecies(String),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One physical cross-section measurement.
///
/// Values are in cm², sampled uniformly from `wmin` to `wmax` (cm⁻¹).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub xsec: Vec<f64>,
    pub wmin: f64,
    pub wmax: f64,
    pub temperature: f64,
    pub pressure: f64,
    pub xscfile: String,
    pub species: String,
}

impl RawMeasurement {
    /// Number of spectral samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.xsec.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xsec.is_empty()
    }

    /// Spectral window covered by the samples.
    #[inline]
    pub fn interval(&self) -> WavenumberInterval {
        WavenumberInterval::new(self.wmin, self.wmax)
    }

    /// Native spacing `(wmax - wmin) / (N - 1)`.
    ///
    /// Infinite or NaN for fewer than two samples.
    pub fn native_step(&self) -> f64 {
        (self.wmax - self.wmin) / (self.xsec.len() as f64 - 1.0)
    }

    /// Wavenumbers of the native samples.
    pub fn native_grid(&self) -> Vec<f64> {
        linspace(self.wmin, self.wmax, self.xsec.len())
    }
}

/// One raw measurement set: observations sharing a spectral window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementSet {
    pub measurements: Vec<RawMeasurement>,
}

impl MeasurementSet {
    pub fn new(measurements: Vec<RawMeasurement>) -> Self {
        Self { measurements }
    }

    /// Number of observations in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

/// All raw measurement sets of one species.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesData {
    pub species: String,
    pub sets: Vec<MeasurementSet>,
}

impl SpeciesData {
    pub fn new(species: impl Into<String>, sets: Vec<MeasurementSet>) -> Self {
        Self {
            species: species.into(),
            sets,
        }
    }

    /// All measurements of all sets, in file order.
    pub fn measurements(&self) -> Vec<&RawMeasurement> {
        self.sets
            .iter()
            .flat_map(|set| set.measurements.iter())
            .collect()
    }

    /// Total number of measurements across sets.
    pub fn num_measurements(&self) -> usize {
        self.sets.iter().map(MeasurementSet::len).sum()
    }
}

/// One measurement resampled onto the shared grid of a band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonizedSample {
    /// Resampled cross-sections [m²]; zero outside the source's native range.
    pub xsec: Vec<f64>,
    /// First grid wavenumber [cm⁻¹].
    pub wmin: f64,
    /// Last grid wavenumber [cm⁻¹].
    pub wmax: f64,
    /// First grid frequency [Hz].
    pub fmin: f64,
    /// Last grid frequency [Hz].
    pub fmax: f64,
    pub temperature: f64,
    pub pressure: f64,
    pub xscfile: String,
    pub species: String,
    /// Raw cross-section integrated over the band window [cm²/cm].
    #[serde(rename = "IntXsec_cm2_per_cm")]
    pub int_xsec: f64,
    /// Shared-grid integral over native-grid integral minus one.
    ///
    /// Absent when the native integral is zero or not finite.
    #[serde(rename = "DeltaIntXsec_relative")]
    pub delta_int_xsec_relative: Option<f64>,
    /// Native step of the source measurement [cm⁻¹].
    #[serde(rename = "DeltaWvnOfRawdata")]
    pub delta_wvn_rawdata: f64,
    #[serde(rename = "wmin_rawdata")]
    pub wmin_rawdata: f64,
    #[serde(rename = "wmax_rawdata")]
    pub wmax_rawdata: f64,
}

/// Read and deserialize a gzip-compressed JSON document.
pub fn read_gz_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let decoder = GzDecoder::new(BufReader::new(file));
    serde_json::from_reader(decoder).map_err(|e| LoaderError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Species name encoded in a data file name: everything before the first dot.
pub fn species_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let species = name.split('.').next()?;
    if species.is_empty() {
        None
    } else {
        Some(species.to_string())
    }
}

/// Load all measurement sets of one species from a `*.json.gz` file.
///
/// The species name is taken from the file name.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid JSON, or holds
/// no measurement sets.
pub fn load_species_file<P: AsRef<Path>>(path: P) -> Result<SpeciesData> {
    let path = path.as_ref();
    let sets: Vec<MeasurementSet> = read_gz_json(path)?;

    if sets.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let species = species_from_path(path).unwrap_or_else(|| {
        sets.iter()
            .flat_map(|s| s.measurements.first())
            .map(|m| m.species.clone())
            .next()
            .unwrap_or_default()
    });

    Ok(SpeciesData::new(species, sets))
}

/// Load a harmonized band file written by `writers::write_harmonized`.
pub fn load_harmonized<P: AsRef<Path>>(path: P) -> Result<Vec<HarmonizedSample>> {
    read_gz_json(path)
}

/// Find raw data files in `dir`, sorted by file name.
pub fn find_species_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(LoaderError::DirectoryNotFound(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| LoaderError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(GZ_JSON_SUFFIX))
                    .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Store of raw measurement data keyed by species name.
pub trait MeasurementSource {
    /// Species available in the store, in a stable order.
    fn species(&self) -> Result<Vec<String>>;

    /// Load all measurement sets of `species`.
    fn load(&self, species: &str) -> Result<SpeciesData>;
}

/// Directory of `<species>.*.json.gz` files.
#[derive(Debug, Clone)]
pub struct GzJsonSource {
    dir: PathBuf,
}

impl GzJsonSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `(species, path)` pairs, first file wins when a species repeats.
    pub fn entries(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut entries: Vec<(String, PathBuf)> = Vec::new();
        for path in find_species_files(&self.dir)? {
            if let Some(species) = species_from_path(&path) {
                if entries.iter().any(|(s, _)| *s == species) {
                    log::warn!(
                        "Ignoring {}: species {} already provided by another file",
                        path.display(),
                        species
                    );
                    continue;
                }
                entries.push((species, path));
            }
        }
        Ok(entries)
    }
}

impl MeasurementSource for GzJsonSource {
    fn species(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.into_iter().map(|(s, _)| s).collect())
    }

    fn load(&self, species: &str) -> Result<SpeciesData> {
        let path = self
            .entries()?
            .into_iter()
            .find(|(s, _)| s == species)
            .map(|(_, p)| p)
            .ok_or_else(|| LoaderError::UnknownSpecies(species.to_string()))?;
        load_species_file(path)
    }
}
