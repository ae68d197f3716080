//! Batch drivers for band definition and harmonization across species.
//!
//! These functions connect the band definer and harmonizer to the data
//! adapters (`MeasurementSource`, `BandStore`, `HarmonizedSink`,
//! `OverviewPlotter`). Failures are isolated per species: a species that
//! cannot be harmonized is reported and the batch continues.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use log::{error, info, warn};
use rayon::prelude::*;

use crate::core::band_config::{BandConfigList, BandStore, SpeciesBands};
use crate::core::loaders::{MeasurementSource, SpeciesData};
use crate::core::transforms::WavenumberInterval;
use crate::core::writers::{HarmonizedSink, QualityRecord};
use crate::processors::bands::{
    define_bands, species_coverage, BandChoice, BandDefinition, SetCoverage,
};
use crate::processors::harmonize::harmonize_species;
use crate::visualization::OverviewPlotter;

/// Options for a band definition run.
#[derive(Debug, Clone, Default)]
pub struct DefineOptions {
    /// Restrict the run to these species; all available species when empty.
    pub species: Vec<String>,
    /// Reuse saved bands of overlapping species instead of the suggestion.
    pub reuse_saved: bool,
    /// Explicit band edges; only valid for a single species.
    pub manual_bands: Option<Vec<WavenumberInterval>>,
}

/// Result of defining the bands of one species.
#[derive(Debug, Clone)]
pub struct DefineOutcome {
    pub species: String,
    pub coverage: Vec<SetCoverage>,
    pub definition: BandDefinition,
    pub plot: Option<PathBuf>,
}

/// Pick how to resolve overlapping sets for one species.
pub fn band_choice(
    saved: Option<&SpeciesBands>,
    reuse_saved: bool,
    manual: Option<Vec<WavenumberInterval>>,
) -> BandChoice {
    match (manual, saved) {
        (Some(bands), _) => BandChoice::Manual(bands),
        (None, Some(entry)) if reuse_saved => BandChoice::Saved(entry.bands.clone()),
        _ => BandChoice::Suggested,
    }
}

fn log_coverage(species: &str, coverage: &[SetCoverage]) {
    for (j, c) in coverage.iter().enumerate() {
        info!(
            "{} set {}: Ns = {}, Nf = {}, wvn_min = {:.7}, wvn_max = {:.7}, dw = {:.7}",
            species, j, c.num_observations, c.num_samples, c.interval.min, c.interval.max, c.step
        );
    }
}

/// Define bands for one species and record them in `config`.
pub fn define_species(
    data: &SpeciesData,
    config: &mut BandConfigList,
    reuse_saved: bool,
    manual: Option<Vec<WavenumberInterval>>,
) -> Result<(Vec<SetCoverage>, BandDefinition)> {
    let coverage = species_coverage(data);
    log_coverage(&data.species, &coverage);

    let choice = band_choice(config.get(&data.species), reuse_saved, manual);
    let definition = define_bands(&coverage, choice)
        .with_context(|| format!("Failed to define bands for {}", data.species))?;

    info!(
        "{}: {} band(s) ({:?}, {} overlapping set pair(s))",
        data.species,
        definition.bands.len(),
        definition.origin,
        definition.overlapping_pairs
    );

    config.upsert(SpeciesBands::new(
        data.species.clone(),
        definition.bands.clone(),
    ));

    Ok((coverage, definition))
}

/// Define bands for the requested species and persist the updated list.
///
/// Entries of species not part of this run are kept unchanged.
///
/// # Errors
///
/// Returns an error if manual bands are given for more than one species, if
/// data cannot be loaded, if band edges are rejected, or if the band
/// configuration cannot be saved. Plot failures are only logged.
pub fn define_all<S, B>(
    source: &S,
    store: &B,
    options: &DefineOptions,
    plotter: Option<&dyn OverviewPlotter>,
) -> Result<Vec<DefineOutcome>>
where
    S: MeasurementSource + ?Sized,
    B: BandStore + ?Sized,
{
    let available = source.species().context("Failed to list raw data")?;

    let names: Vec<String> = if options.species.is_empty() {
        available
    } else {
        for name in &options.species {
            if !available.contains(name) {
                bail!("No raw data for species {}", name);
            }
        }
        options.species.clone()
    };

    if options.manual_bands.is_some() && names.len() != 1 {
        bail!(
            "Manual band edges need exactly one species, got {}",
            names.len()
        );
    }

    let mut config = store
        .load()
        .context("Failed to read band config")?
        .unwrap_or_default();

    let mut outcomes = Vec::with_capacity(names.len());

    for name in &names {
        let data = source
            .load(name)
            .with_context(|| format!("Failed to load raw data for {}", name))?;

        let (coverage, definition) = define_species(
            &data,
            &mut config,
            options.reuse_saved,
            options.manual_bands.clone(),
        )?;

        let plot = plotter.and_then(|p| match p.plot(&data, &definition.bands) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Overview plot for {} failed: {}", name, e);
                None
            }
        });

        outcomes.push(DefineOutcome {
            species: name.clone(),
            coverage,
            definition,
            plot,
        });
    }

    store.save(&config).context("Failed to save band config")?;

    Ok(outcomes)
}

/// What happened to one species in a harmonization run.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeciesOutcome {
    Harmonized {
        species: String,
        bands: usize,
        samples: usize,
        files: Vec<PathBuf>,
    },
    SkippedNoConfig {
        species: String,
    },
    Failed {
        species: String,
        error: String,
        bands_written: usize,
    },
}

impl SpeciesOutcome {
    pub fn species(&self) -> &str {
        match self {
            SpeciesOutcome::Harmonized { species, .. }
            | SpeciesOutcome::SkippedNoConfig { species }
            | SpeciesOutcome::Failed { species, .. } => species,
        }
    }
}

/// Outcomes of a harmonization run, in selection order.
#[derive(Debug, Clone, Default)]
pub struct HarmonizeSummary {
    pub outcomes: Vec<SpeciesOutcome>,
    pub records: Vec<QualityRecord>,
}

impl HarmonizeSummary {
    pub fn harmonized(&self) -> usize {
        self.count(|o| matches!(o, SpeciesOutcome::Harmonized { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SpeciesOutcome::SkippedNoConfig { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SpeciesOutcome::Failed { .. }))
    }

    pub fn files_written(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                SpeciesOutcome::Harmonized { files, .. } => files.len(),
                SpeciesOutcome::Failed { bands_written, .. } => *bands_written,
                SpeciesOutcome::SkippedNoConfig { .. } => 0,
            })
            .sum()
    }

    fn count<F: Fn(&SpeciesOutcome) -> bool>(&self, f: F) -> usize {
        self.outcomes.iter().filter(|o| f(o)).count()
    }
}

/// Harmonize all bands of one species and write each band as it completes.
fn process_species<S, K>(
    name: &str,
    source: &S,
    config: &BandConfigList,
    sink: &K,
) -> (SpeciesOutcome, Vec<QualityRecord>)
where
    S: MeasurementSource + ?Sized,
    K: HarmonizedSink + ?Sized,
{
    let Some(entry) = config.get(name) else {
        warn!("Ignoring species {}. No band config available.", name);
        return (
            SpeciesOutcome::SkippedNoConfig {
                species: name.to_string(),
            },
            Vec::new(),
        );
    };

    let data = match source.load(name) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to load raw data for {}: {}", name, e);
            return (
                SpeciesOutcome::Failed {
                    species: name.to_string(),
                    error: e.to_string(),
                    bands_written: 0,
                },
                Vec::new(),
            );
        }
    };

    info!(
        "Species {}: {} measurement(s), {} band(s)",
        name,
        data.num_measurements(),
        entry.bands.len()
    );

    let measurements = data.measurements();
    let mut files = Vec::with_capacity(entry.bands.len());
    let mut records = Vec::new();
    let mut samples = 0;

    let result = harmonize_species(name, &entry.bands, &measurements, |band| {
        let path = sink.write_band(name, band.index, &band.samples)?;
        info!("{} band {} -> {}", name, band.index, path.display());
        files.push(path);
        records.extend(band.quality_records());
        samples += band.samples.len();
        Ok(())
    });

    let outcome = match result {
        Ok(bands) => SpeciesOutcome::Harmonized {
            species: name.to_string(),
            bands,
            samples,
            files,
        },
        Err(e) => {
            error!("{:#}", e);
            SpeciesOutcome::Failed {
                species: name.to_string(),
                error: format!("{:#}", e),
                bands_written: files.len(),
            }
        }
    };

    (outcome, records)
}

/// Harmonize the named species.
///
/// Species are independent: with `parallel` they run concurrently on the
/// rayon pool, otherwise one after another. Bands of a species are always
/// processed in order. Outcomes keep the order of `names`.
pub fn harmonize_all<S, K>(
    names: &[String],
    source: &S,
    config: &BandConfigList,
    sink: &K,
    parallel: bool,
    progress: &ProgressBar,
) -> HarmonizeSummary
where
    S: MeasurementSource + Sync + ?Sized,
    K: HarmonizedSink + Sync + ?Sized,
{
    let run = |name: &String| {
        let result = process_species(name, source, config, sink);
        progress.inc(1);
        result
    };

    let results: Vec<(SpeciesOutcome, Vec<QualityRecord>)> = if parallel {
        names.par_iter().map(run).collect()
    } else {
        names.iter().map(run).collect()
    };

    let mut summary = HarmonizeSummary::default();
    for (outcome, records) in results {
        summary.outcomes.push(outcome);
        summary.records.extend(records);
    }
    summary
}
