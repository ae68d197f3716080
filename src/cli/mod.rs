//! Command-line interface for cross-section band harmonization.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::core::band_config::{BandConfigList, BandStore, JsonBandStore};
use crate::core::loaders::{GzJsonSource, MeasurementSource};
use crate::core::transforms::WavenumberInterval;
use crate::core::writers::{self, GzJsonSink};
use crate::processors::bands::{
    count_overlapping_pairs, parse_band_count, parse_band_edges, species_coverage, suggest_bands,
};
use crate::processors::pipeline::{self, DefineOptions, SpeciesOutcome};
use crate::processors::selection::SpeciesSelection;
use crate::visualization::{OverviewPlotter, PngOverviewPlotter};
use crate::PipelineConfig;

const REPORT_FILE: &str = "harmonization_report.csv";

#[derive(Parser)]
#[command(name = "xsec-bands")]
#[command(about = "Band definition and harmonization of absorption cross-sections", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List raw species files and configured bands
    List,

    /// Show measurement set coverage and suggested bands of one species
    Inspect {
        /// Species name, as in the raw file name
        species: String,
    },

    /// Define bands and store them in the band configuration list
    Define {
        /// Species to define (repeatable); all raw species if omitted
        #[arg(short, long)]
        species: Vec<String>,
        /// Reuse saved bands for species with overlapping sets
        #[arg(long)]
        reuse: bool,
        /// Band edges as "wvn_min, wvn_max" (repeatable, single species only)
        #[arg(short, long = "band", value_parser = parse_band_edges)]
        bands: Vec<WavenumberInterval>,
        /// Expected number of --band edges
        #[arg(long)]
        band_count: Option<String>,
        /// Write an overview plot per species
        #[arg(long)]
        plot: bool,
    },

    /// Harmonize configured species onto shared band grids
    Harmonize {
        /// Configured species to process: all, 3, 1,4,7, 2..6
        #[arg(long, default_value = "all")]
        select: String,
        /// Species names to process instead of a selection
        #[arg(short, long)]
        species: Vec<String>,
        /// Harmonize species in parallel
        #[arg(long)]
        parallel: bool,
        /// Also write uncompressed JSON files
        #[arg(long)]
        plain_json: bool,
        /// Skip the CSV quality report
        #[arg(long)]
        no_report: bool,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar counting species
fn create_progress_bar(len: usize, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_message(message.to_string());
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 37 {
            format!("{}...", value.chars().take(34).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<37} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn format_bands(bands: &[WavenumberInterval]) -> String {
    bands
        .iter()
        .map(|b| format!("[{}, {}]", b.min, b.max))
        .collect::<Vec<_>>()
        .join(" ")
}

fn load_band_config(store: &JsonBandStore) -> BandConfigList {
    match store.load() {
        Ok(Some(config)) => config,
        Ok(None) => {
            warn!("No band config at {}", store.path().display());
            BandConfigList::default()
        }
        Err(e) => {
            error!("Failed to read band config: {}", e);
            std::process::exit(1);
        }
    }
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::List => cmd_list(&config),
        Commands::Inspect { species } => cmd_inspect(&species, &config),
        Commands::Define { species, reuse, bands, band_count, plot } => {
            cmd_define(species, reuse, bands, band_count, plot, &config);
        }
        Commands::Harmonize { select, species, parallel, plain_json, no_report } => {
            cmd_harmonize(&select, species, parallel, plain_json, no_report, &config);
        }
    }
}

fn cmd_list(config: &PipelineConfig) {
    let source = GzJsonSource::new(&config.paths.raw_dir);
    let store = JsonBandStore::new(&config.paths.band_config);

    let entries = match source.entries() {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to list raw data: {}", e);
            std::process::exit(1);
        }
    };
    let bands = load_band_config(&store);

    println!("Raw data in {}:", source.dir().display());
    for (species, path) in &entries {
        let configured = bands.get(species).map_or(0, |e| e.bands.len());
        println!("  {:<16} {:>2} band(s)  {}", species, configured, path.display());
    }

    println!();
    println!("Band config {}:", store.path().display());
    for (index, entry) in bands.iter().enumerate() {
        println!("  {:>3}  {:<16} {}", index, entry.species, format_bands(&entry.bands));
    }

    print_summary(
        "Inventory",
        &[
            ("Raw directory", source.dir().display().to_string()),
            ("Species files", entries.len().to_string()),
            ("Configured species", bands.len().to_string()),
        ],
    );
}

fn cmd_inspect(species: &str, config: &PipelineConfig) {
    let source = GzJsonSource::new(&config.paths.raw_dir);
    let store = JsonBandStore::new(&config.paths.band_config);

    let data = match source.load(species) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to load {}: {}", species, e);
            std::process::exit(1);
        }
    };

    let coverage = species_coverage(&data);
    println!("{}: {} measurement set(s)", species, coverage.len());
    for (j, c) in coverage.iter().enumerate() {
        println!(
            "  set {:>2}: Ns = {:>4}, Nf = {:>7}, wvn = [{:.4}, {:.4}], dw = {:.6}",
            j, c.num_observations, c.num_samples, c.interval.min, c.interval.max, c.step
        );
    }

    let pairs = count_overlapping_pairs(&coverage);
    let saved = load_band_config(&store)
        .get(species)
        .map(|e| format_bands(&e.bands))
        .unwrap_or_else(|| "-".to_string());

    print_summary(
        &format!("Coverage of {}", species),
        &[
            ("Measurements", data.num_measurements().to_string()),
            ("Sets", coverage.len().to_string()),
            ("Overlapping pairs", pairs.to_string()),
            ("Suggested bands", format_bands(&suggest_bands(&coverage))),
            ("Saved bands", saved),
        ],
    );
}

fn cmd_define(
    species: Vec<String>,
    reuse: bool,
    bands: Vec<WavenumberInterval>,
    band_count: Option<String>,
    plot: bool,
    config: &PipelineConfig,
) {
    let start = Instant::now();
    let source = GzJsonSource::new(&config.paths.raw_dir);
    let store = JsonBandStore::new(&config.paths.band_config);

    if let Some(count) = &band_count {
        let Some(name) = species.first().filter(|_| species.len() == 1) else {
            error!("--band-count needs exactly one --species");
            std::process::exit(1);
        };
        let num_sets = match source.load(name) {
            Ok(data) => species_coverage(&data).len(),
            Err(e) => {
                error!("Failed to load {}: {}", name, e);
                std::process::exit(1);
            }
        };
        match parse_band_count(count, num_sets) {
            Ok(n) if n == bands.len() => {}
            Ok(n) => {
                error!("{} band(s) announced but {} --band given", n, bands.len());
                std::process::exit(1);
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    let options = DefineOptions {
        species,
        reuse_saved: reuse,
        manual_bands: if bands.is_empty() { None } else { Some(bands) },
    };

    let plotter = PngOverviewPlotter::new(&config.paths.plot_dir, config.plot.clone());
    let plotter: Option<&dyn OverviewPlotter> = if plot { Some(&plotter) } else { None };

    let spinner = create_spinner("Defining bands...");

    match pipeline::define_all(&source, &store, &options, plotter) {
        Ok(outcomes) => {
            spinner.finish_and_clear();

            for outcome in &outcomes {
                println!(
                    "  {:<16} {:?}: {}",
                    outcome.species,
                    outcome.definition.origin,
                    format_bands(&outcome.definition.bands)
                );
            }

            let plots = outcomes.iter().filter(|o| o.plot.is_some()).count();
            print_summary(
                "Band Definition Complete",
                &[
                    ("Species", outcomes.len().to_string()),
                    ("Band config", store.path().display().to_string()),
                    ("Plots written", plots.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Band definition failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_harmonize(
    select: &str,
    species: Vec<String>,
    parallel: bool,
    plain_json: bool,
    no_report: bool,
    config: &PipelineConfig,
) {
    let start = Instant::now();
    let source = GzJsonSource::new(&config.paths.raw_dir);
    let store = JsonBandStore::new(&config.paths.band_config);
    let bands = load_band_config(&store);

    let names: Vec<String> = if species.is_empty() {
        let selection = match select.parse::<SpeciesSelection>() {
            Ok(s) => s,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        };
        match selection.resolve(bands.len()) {
            Ok(indices) => indices
                .into_iter()
                .filter_map(|i| bands.at(i).map(|e| e.species.clone()))
                .collect(),
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    } else {
        species
    };

    let parallel = parallel || config.harmonize.parallel;
    let sink = GzJsonSink::new(&config.paths.harmonized_dir)
        .with_plain_json(plain_json || config.harmonize.write_plain_json);

    println!("Harmonizing {} species...", names.len());
    println!("Raw directory: {}", source.dir().display());
    println!("Output directory: {}", sink.dir().display());

    let progress = create_progress_bar(names.len(), "Harmonizing");
    let summary = pipeline::harmonize_all(&names, &source, &bands, &sink, parallel, &progress);
    progress.finish_and_clear();

    for outcome in &summary.outcomes {
        match outcome {
            SpeciesOutcome::Harmonized { species, bands, samples, .. } => {
                println!("  {:<16} {} band(s), {} sample(s)", species, bands, samples);
            }
            SpeciesOutcome::SkippedNoConfig { species } => {
                println!("  {:<16} skipped, no band config", species);
            }
            SpeciesOutcome::Failed { species, error, .. } => {
                println!("  {:<16} FAILED: {}", species, error);
            }
        }
    }

    let mut report = "-".to_string();
    if config.harmonize.write_report && !no_report && !summary.records.is_empty() {
        let path = sink.dir().join(REPORT_FILE);
        match writers::write_quality_report(&path, &summary.records) {
            Ok(()) => report = path.display().to_string(),
            Err(e) => error!("Failed to write quality report: {}", e),
        }
    }

    print_summary(
        "Harmonization Complete",
        &[
            ("Species", names.len().to_string()),
            ("Harmonized", summary.harmonized().to_string()),
            ("Skipped", summary.skipped().to_string()),
            ("Failed", summary.failed().to_string()),
            ("Files written", summary.files_written().to_string()),
            ("Quality report", report),
            ("Parallel", parallel.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if summary.failed() > 0 {
        std::process::exit(1);
    }
}
