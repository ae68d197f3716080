//! Band definition, harmonization and batch processing.

pub mod bands;
pub mod harmonize;
pub mod pipeline;
pub mod selection;

// Re-export key types for convenience
pub use bands::{
    define_bands, parse_band_count, parse_band_edges, species_coverage, suggest_bands,
    validate_manual_bands, BandChoice, BandDefinition, BandError, BandOrigin, SetCoverage,
};
pub use harmonize::{harmonize_band, harmonize_species, HarmonizeError, HarmonizedBand};
pub use pipeline::{
    define_all, harmonize_all, DefineOptions, DefineOutcome, HarmonizeSummary, SpeciesOutcome,
};
pub use selection::{SelectionError, SpeciesSelection};
