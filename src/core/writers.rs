//! Data writers for harmonized band files and quality reports.
//!
//! This module provides functions for writing harmonization results:
//! - Gzip-compressed JSON band files (one per species and band)
//! - Optional plain JSON mirrors of the same files
//! - A CSV quality report with one row per harmonized sample

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use thiserror::Error;

use super::loaders::HarmonizedSample;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding error.
    #[error("JSON encode error for '{path}': {source}")]
    JsonError {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
pub(crate) fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// File name of the harmonized output for one band: `<species>.band<i>.xsec.json.gz`.
pub fn harmonized_file_name(species: &str, band_index: usize) -> String {
    format!("{}.band{}.xsec.json.gz", species, band_index)
}

/// Write harmonized samples as gzip-compressed JSON.
///
/// # Errors
///
/// Returns an error if:
/// - Parent directories cannot be created
/// - File cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use xsec_bands::core::writers::write_harmonized;
/// use std::path::Path;
///
/// write_harmonized(Path::new("CFC11.band0.xsec.json.gz"), &[]).unwrap();
/// ```
pub fn write_harmonized(path: &Path, samples: &[HarmonizedSample]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let writer = create_buffered_writer(path)?;
    let path_str = path.display().to_string();

    let mut encoder = GzEncoder::new(writer, Compression::default());
    serde_json::to_writer(&mut encoder, samples).map_err(|e| WriteError::JsonError {
        path: path_str.clone(),
        source: e,
    })?;

    let mut writer = encoder.finish().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })?;
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write harmonized samples as uncompressed JSON.
pub fn write_harmonized_plain(path: &Path, samples: &[HarmonizedSample]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;
    let path_str = path.display().to_string();

    serde_json::to_writer(&mut writer, samples).map_err(|e| WriteError::JsonError {
        path: path_str.clone(),
        source: e,
    })?;
    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// One row of the harmonization quality report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityRecord {
    pub species: String,
    pub band: usize,
    pub band_min: f64,
    pub band_max: f64,
    pub delta_w: f64,
    pub grid_points: usize,
    pub xscfile: String,
    pub temperature: f64,
    pub pressure: f64,
    pub native_step: f64,
    pub int_xsec_cm2_per_cm: f64,
    pub delta_int_relative: Option<f64>,
    pub negatives_raw: usize,
    pub negatives_interpolated: usize,
    pub undefined_points: usize,
}

/// Write the quality report as CSV with a header row.
pub fn write_quality_report(path: &Path, records: &[QualityRecord]) -> Result<()> {
    ensure_parent_dirs(path)?;
    let writer = create_buffered_writer(path)?;
    let mut csv_writer = csv::Writer::from_writer(writer);
    let path_str = path.display().to_string();

    for record in records {
        csv_writer
            .serialize(record)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Destination of harmonized band results.
pub trait HarmonizedSink {
    /// Persist all samples of one (species, band) pair.
    fn write_band(
        &self,
        species: &str,
        band_index: usize,
        samples: &[HarmonizedSample],
    ) -> Result<PathBuf>;
}

/// Writes one gzip JSON file per band into a directory.
#[derive(Debug, Clone)]
pub struct GzJsonSink {
    dir: PathBuf,
    plain_json: bool,
}

impl GzJsonSink {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            plain_json: false,
        }
    }

    /// Also write an uncompressed `.json` next to every `.json.gz`.
    pub fn with_plain_json(mut self, enabled: bool) -> Self {
        self.plain_json = enabled;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl HarmonizedSink for GzJsonSink {
    fn write_band(
        &self,
        species: &str,
        band_index: usize,
        samples: &[HarmonizedSample],
    ) -> Result<PathBuf> {
        let path = self.dir.join(harmonized_file_name(species, band_index));
        write_harmonized(&path, samples)?;

        if self.plain_json {
            let plain = self
                .dir
                .join(format!("{}.band{}.xsec.json", species, band_index));
            write_harmonized_plain(&plain, samples)?;
        }

        Ok(path)
    }
}
