//! Band definition from raw measurement coverage.
//!
//! Bands are derived verbatim from the measurement sets when none of them
//! overlap. Otherwise a partition aligned to the coverage breakpoints is
//! suggested, or saved/manual edges are accepted in its place.

use std::cmp::Ordering;

use thiserror::Error;

use crate::core::loaders::{MeasurementSet, RawMeasurement, SpeciesData};
use crate::core::transforms::WavenumberInterval;

/// Errors that can occur while defining bands.
#[derive(Debug, Error, PartialEq)]
pub enum BandError {
    #[error("interval definition not correct: expected 'wvn_min, wvn_max', got {0} field(s)")]
    WrongFieldCount(usize),

    #[error("not a number: '{0}'")]
    NotNumeric(String),

    #[error("number of bands is not a valid count: '{0}'")]
    InvalidCount(String),

    #[error("{requested} bands requested but only {available} measurement sets exist")]
    TooManyBands { requested: usize, available: usize },

    #[error("invalid band [{min}, {max}]: bounds must be finite with min < max")]
    InvalidInterval { min: f64, max: f64 },

    #[error("bands [{first_min}, {first_max}] and [{second_min}, {second_max}] overlap")]
    OverlappingBands {
        first_min: f64,
        first_max: f64,
        second_min: f64,
        second_max: f64,
    },

    #[error("at least one band is required")]
    NoBands,

    #[error("species has no measurement sets")]
    NoMeasurements,
}

/// Result type for band definition.
pub type Result<T> = std::result::Result<T, BandError>;

/// Spectral coverage of one raw measurement set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetCoverage {
    /// Smallest `wmin` to largest `wmax` of the set.
    pub interval: WavenumberInterval,
    /// Native step, from the widest sample count of the set.
    pub step: f64,
    pub num_observations: usize,
    pub num_samples: usize,
}

impl SetCoverage {
    /// Coverage of a measurement set, `None` if the set is empty.
    pub fn of(set: &MeasurementSet) -> Option<Self> {
        let wmin = set
            .measurements
            .iter()
            .map(|m| m.wmin)
            .min_by(|a, b| a.total_cmp(b))?;
        let wmax = set
            .measurements
            .iter()
            .map(|m| m.wmax)
            .max_by(|a, b| a.total_cmp(b))?;
        let num_samples = set.measurements.iter().map(RawMeasurement::len).max()?;

        Some(Self {
            interval: WavenumberInterval::new(wmin, wmax),
            step: (wmax - wmin) / (num_samples as f64 - 1.0),
            num_observations: set.len(),
            num_samples,
        })
    }

    /// Coverage of a single measurement treated as its own set.
    pub fn of_measurement(measurement: &RawMeasurement) -> Self {
        Self {
            interval: measurement.interval(),
            step: measurement.native_step(),
            num_observations: 1,
            num_samples: measurement.len(),
        }
    }
}

/// Coverage of every non-empty set of a species, in file order.
pub fn species_coverage(data: &SpeciesData) -> Vec<SetCoverage> {
    data.sets.iter().filter_map(SetCoverage::of).collect()
}

/// How to obtain bands when measurement sets overlap.
#[derive(Debug, Clone, PartialEq)]
pub enum BandChoice {
    /// Use the breakpoint-aligned suggestion.
    Suggested,
    /// Reuse a previously saved definition verbatim.
    Saved(Vec<WavenumberInterval>),
    /// User-supplied edges, validated before use.
    Manual(Vec<WavenumberInterval>),
}

/// Where a band definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandOrigin {
    /// One band per measurement set, no overlap present.
    Verbatim,
    Suggested,
    Saved,
    Manual,
}

/// Ordered, non-overlapping bands of one species.
#[derive(Debug, Clone, PartialEq)]
pub struct BandDefinition {
    pub bands: Vec<WavenumberInterval>,
    pub origin: BandOrigin,
    /// Number of distinct overlapping set pairs.
    pub overlapping_pairs: usize,
}

/// Number of distinct set pairs whose intervals overlap.
pub fn count_overlapping_pairs(coverage: &[SetCoverage]) -> usize {
    let mut count = 0;
    for (i, a) in coverage.iter().enumerate() {
        for b in &coverage[i + 1..] {
            if a.interval.overlaps(&b.interval) {
                count += 1;
            }
        }
    }
    count
}

fn by_min(a: &WavenumberInterval, b: &WavenumberInterval) -> Ordering {
    a.min.total_cmp(&b.min).then(a.max.total_cmp(&b.max))
}

/// Define the bands of a species from the coverage of its measurement sets.
///
/// Without overlapping sets every set becomes its own band and `choice` is
/// not consulted. With overlaps, `choice` selects the suggestion, a saved
/// definition, or validated manual edges.
///
/// # Errors
///
/// Returns an error if there are no measurement sets, or if manual edges are
/// rejected by [`validate_manual_bands`].
pub fn define_bands(coverage: &[SetCoverage], choice: BandChoice) -> Result<BandDefinition> {
    if coverage.is_empty() {
        return Err(BandError::NoMeasurements);
    }

    let overlapping_pairs = count_overlapping_pairs(coverage);

    if overlapping_pairs == 0 {
        match &choice {
            BandChoice::Manual(bands) => log::warn!(
                "No overlapping measurement sets, ignoring {} manual band(s) and taking bands directly from the data",
                bands.len()
            ),
            BandChoice::Saved(_) => {
                log::info!("No overlapping measurement sets, taking bands directly from the data")
            }
            BandChoice::Suggested => {}
        }
        let mut bands: Vec<WavenumberInterval> = coverage.iter().map(|c| c.interval).collect();
        bands.sort_by(by_min);

        return Ok(BandDefinition {
            bands,
            origin: BandOrigin::Verbatim,
            overlapping_pairs,
        });
    }

    let (bands, origin) = match choice {
        BandChoice::Suggested => (suggest_bands(coverage), BandOrigin::Suggested),
        BandChoice::Saved(bands) => (bands, BandOrigin::Saved),
        BandChoice::Manual(bands) => (
            validate_manual_bands(bands, coverage.len())?,
            BandOrigin::Manual,
        ),
    };

    Ok(BandDefinition {
        bands,
        origin,
        overlapping_pairs,
    })
}

/// Suggest bands that split the covered range wherever the set of active
/// measurement sets changes.
///
/// Breakpoints are the sorted, deduplicated set endpoints. Each segment
/// between consecutive breakpoints covered by at least one set is a band;
/// neighbouring segments covered by exactly the same sets are merged, and
/// uncovered gaps produce no band.
pub fn suggest_bands(coverage: &[SetCoverage]) -> Vec<WavenumberInterval> {
    let mut breakpoints: Vec<f64> = coverage
        .iter()
        .flat_map(|c| [c.interval.min, c.interval.max])
        .filter(|w| w.is_finite())
        .collect();
    breakpoints.sort_by(|a, b| a.total_cmp(b));
    breakpoints.dedup();

    let mut segments: Vec<(WavenumberInterval, Vec<usize>)> = Vec::new();

    for edges in breakpoints.windows(2) {
        let segment = WavenumberInterval::new(edges[0], edges[1]);
        let active: Vec<usize> = coverage
            .iter()
            .enumerate()
            .filter(|(_, c)| c.interval.overlaps(&segment))
            .map(|(i, _)| i)
            .collect();

        if active.is_empty() {
            continue;
        }

        match segments.last_mut() {
            Some((last, last_active)) if last.max == segment.min && *last_active == active => {
                last.max = segment.max;
            }
            _ => segments.push((segment, active)),
        }
    }

    segments.into_iter().map(|(band, _)| band).collect()
}

/// Validate user-supplied band edges.
///
/// Accepted bands are returned sorted by increasing min.
///
/// # Errors
///
/// - `NoBands` for an empty list
/// - `TooManyBands` when there are more bands than measurement sets
/// - `InvalidInterval` for non-finite bounds or `min >= max`
/// - `OverlappingBands` when two bands share a nonzero range
pub fn validate_manual_bands(
    mut bands: Vec<WavenumberInterval>,
    num_sets: usize,
) -> Result<Vec<WavenumberInterval>> {
    if bands.is_empty() {
        return Err(BandError::NoBands);
    }
    if bands.len() > num_sets {
        return Err(BandError::TooManyBands {
            requested: bands.len(),
            available: num_sets,
        });
    }
    if let Some(bad) = bands.iter().find(|b| !b.is_valid()) {
        return Err(BandError::InvalidInterval {
            min: bad.min,
            max: bad.max,
        });
    }

    bands.sort_by(by_min);

    if let Some(pair) = bands.windows(2).find(|w| w[0].overlaps(&w[1])) {
        return Err(BandError::OverlappingBands {
            first_min: pair[0].min,
            first_max: pair[0].max,
            second_min: pair[1].min,
            second_max: pair[1].max,
        });
    }

    Ok(bands)
}

/// Parse band edges entered as `"wvn_min, wvn_max"` (cm⁻¹).
pub fn parse_band_edges(input: &str) -> Result<WavenumberInterval> {
    let fields: Vec<&str> = input.split(',').map(str::trim).collect();
    if fields.len() != 2 {
        return Err(BandError::WrongFieldCount(fields.len()));
    }

    let parse = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| BandError::NotNumeric(s.to_string()))
    };

    Ok(WavenumberInterval::new(parse(fields[0])?, parse(fields[1])?))
}

/// Parse a requested number of bands, bounded by the number of sets.
pub fn parse_band_count(input: &str, num_sets: usize) -> Result<usize> {
    let count: usize = input
        .trim()
        .parse()
        .map_err(|_| BandError::InvalidCount(input.trim().to_string()))?;

    if count == 0 {
        return Err(BandError::NoBands);
    }
    if count > num_sets {
        return Err(BandError::TooManyBands {
            requested: count,
            available: num_sets,
        });
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::tests::measurement;

    fn coverage(wmin: f64, wmax: f64, n: usize) -> SetCoverage {
        SetCoverage::of_measurement(&measurement(wmin, wmax, n, 1.0))
    }

    fn iv(min: f64, max: f64) -> WavenumberInterval {
        WavenumberInterval::new(min, max)
    }

    #[test]
    fn test_set_coverage_spans_all_observations() {
        let set = MeasurementSet::new(vec![
            measurement(700.0, 800.0, 101, 1.0),
            measurement(690.0, 790.0, 201, 1.0),
        ]);
        let cov = SetCoverage::of(&set).unwrap();

        assert_eq!(cov.interval, iv(690.0, 800.0));
        assert_eq!(cov.num_samples, 201);
        assert_eq!(cov.num_observations, 2);
        assert!((cov.step - 110.0 / 200.0).abs() < 1e-12);

        assert!(SetCoverage::of(&MeasurementSet::default()).is_none());
    }

    #[test]
    fn test_non_overlapping_sets_become_bands_verbatim() {
        let cov = vec![coverage(100.0, 200.0, 101), coverage(0.0, 100.0, 101)];

        let def = define_bands(&cov, BandChoice::Suggested).unwrap();

        assert_eq!(def.origin, BandOrigin::Verbatim);
        assert_eq!(def.overlapping_pairs, 0);
        assert_eq!(def.bands, vec![iv(0.0, 100.0), iv(100.0, 200.0)]);
    }

    #[test]
    fn test_non_overlapping_ignores_manual_choice() {
        let cov = vec![coverage(0.0, 100.0, 101), coverage(300.0, 400.0, 11)];
        let def = define_bands(&cov, BandChoice::Manual(vec![iv(0.0, 400.0)])).unwrap();

        assert_eq!(def.origin, BandOrigin::Verbatim);
        assert_eq!(def.bands, vec![iv(0.0, 100.0), iv(300.0, 400.0)]);
    }

    #[test]
    fn test_single_set_yields_single_band() {
        let cov = vec![coverage(765.0, 1235.0, 4701)];
        let def = define_bands(&cov, BandChoice::Suggested).unwrap();
        assert_eq!(def.bands, vec![iv(765.0, 1235.0)]);
    }

    #[test]
    fn test_no_sets_is_an_error() {
        assert_eq!(
            define_bands(&[], BandChoice::Suggested),
            Err(BandError::NoMeasurements)
        );
    }

    #[test]
    fn test_suggestion_splits_at_breakpoints() {
        let cov = vec![coverage(0.0, 50.0, 51), coverage(20.0, 70.0, 101)];

        let def = define_bands(&cov, BandChoice::Suggested).unwrap();

        assert_eq!(def.origin, BandOrigin::Suggested);
        assert_eq!(def.overlapping_pairs, 1);
        assert_eq!(
            def.bands,
            vec![iv(0.0, 20.0), iv(20.0, 50.0), iv(50.0, 70.0)]
        );
    }

    #[test]
    fn test_suggestion_skips_gaps_and_merges_identical_coverage() {
        // [0,30] and [10,30] overlap; [40,60] is separated by a gap,
        // and its duplicate [40,60] adds no breakpoint.
        let cov = vec![
            coverage(0.0, 30.0, 31),
            coverage(10.0, 30.0, 41),
            coverage(40.0, 60.0, 21),
            coverage(40.0, 60.0, 41),
        ];

        let bands = suggest_bands(&cov);

        assert_eq!(bands, vec![iv(0.0, 10.0), iv(10.0, 30.0), iv(40.0, 60.0)]);
        for pair in bands.windows(2) {
            assert!(!pair[0].overlaps(&pair[1]));
        }
    }

    #[test]
    fn test_saved_bands_are_reused_verbatim() {
        let cov = vec![coverage(0.0, 50.0, 51), coverage(20.0, 70.0, 101)];
        let saved = vec![iv(0.0, 35.0), iv(35.0, 70.0)];

        let def = define_bands(&cov, BandChoice::Saved(saved.clone())).unwrap();

        assert_eq!(def.origin, BandOrigin::Saved);
        assert_eq!(def.bands, saved);
    }

    #[test]
    fn test_manual_bands_sorted_and_validated() {
        let cov = vec![coverage(0.0, 50.0, 51), coverage(20.0, 70.0, 101)];

        let def = define_bands(
            &cov,
            BandChoice::Manual(vec![iv(40.0, 70.0), iv(0.0, 40.0)]),
        )
        .unwrap();
        assert_eq!(def.origin, BandOrigin::Manual);
        assert_eq!(def.bands, vec![iv(0.0, 40.0), iv(40.0, 70.0)]);

        assert_eq!(
            define_bands(
                &cov,
                BandChoice::Manual(vec![iv(0.0, 20.0), iv(20.0, 40.0), iv(40.0, 70.0)])
            ),
            Err(BandError::TooManyBands {
                requested: 3,
                available: 2
            })
        );
    }

    #[test]
    fn test_validate_manual_bands_rejections() {
        assert_eq!(validate_manual_bands(vec![], 2), Err(BandError::NoBands));
        assert_eq!(
            validate_manual_bands(vec![iv(50.0, 10.0)], 2),
            Err(BandError::InvalidInterval {
                min: 50.0,
                max: 10.0
            })
        );
        assert_eq!(
            validate_manual_bands(vec![iv(0.0, 30.0), iv(20.0, 50.0)], 2),
            Err(BandError::OverlappingBands {
                first_min: 0.0,
                first_max: 30.0,
                second_min: 20.0,
                second_max: 50.0
            })
        );
    }

    #[test]
    fn test_parse_band_edges() {
        assert_eq!(parse_band_edges("700.5, 900"), Ok(iv(700.5, 900.0)));
        assert_eq!(parse_band_edges(" 1e3 ,1.2e3 "), Ok(iv(1000.0, 1200.0)));
        assert_eq!(
            parse_band_edges("700 900"),
            Err(BandError::WrongFieldCount(1))
        );
        assert_eq!(
            parse_band_edges("700,800,900"),
            Err(BandError::WrongFieldCount(3))
        );
        assert_eq!(
            parse_band_edges("700,abc"),
            Err(BandError::NotNumeric("abc".to_string()))
        );
    }

    #[test]
    fn test_parse_band_count() {
        assert_eq!(parse_band_count(" 2 ", 3), Ok(2));
        assert_eq!(
            parse_band_count("two", 3),
            Err(BandError::InvalidCount("two".to_string()))
        );
        assert_eq!(parse_band_count("0", 3), Err(BandError::NoBands));
        assert_eq!(
            parse_band_count("4", 3),
            Err(BandError::TooManyBands {
                requested: 4,
                available: 3
            })
        );
    }
}
