//! Band definition and harmonization of laboratory absorption cross-sections.
//!
//! This crate provides tools for:
//! - Loading raw gzip JSON cross-section measurement sets per species
//! - Defining non-overlapping wavenumber bands from measurement coverage
//! - Resampling every measurement of a band onto one shared grid
//! - Writing harmonized bands, quality reports and overview plots
//!
//! # Example
//!
//! ```no_run
//! use xsec_bands::core::{GzJsonSink, GzJsonSource, JsonBandStore, BandStore};
//! use xsec_bands::processors::harmonize_all;
//!
//! let source = GzJsonSource::new("data/HitranXsecJson");
//! let bands = JsonBandStore::new("band_config_list.json").load().unwrap().unwrap_or_default();
//! let sink = GzJsonSink::new("data/harmonized_data");
//! let names = vec!["CFC11".to_string()];
//! let summary = harmonize_all(&names, &source, &bands, &sink, false, &indicatif::ProgressBar::hidden());
//! println!("{} species harmonized", summary.harmonized());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{HarmonizeConfig, PathsConfig, PipelineConfig, PlotConfig};
pub use core::loaders::{HarmonizedSample, RawMeasurement, SpeciesData};
pub use core::transforms::WavenumberInterval;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
