//! Core data types and I/O operations.

pub mod band_config;
pub mod loaders;
pub mod transforms;
pub mod writers;

pub use band_config::{BandConfigList, BandStore, JsonBandStore, SpeciesBands};
pub use loaders::{
    GzJsonSource, HarmonizedSample, MeasurementSet, MeasurementSource, RawMeasurement, SpeciesData,
};
pub use transforms::WavenumberInterval;
pub use writers::{GzJsonSink, HarmonizedSink, QualityRecord, WriteError};
