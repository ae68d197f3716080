//! Selection of species by their position in the band configuration list.

use std::str::FromStr;

use regex::Regex;
use thiserror::Error;

/// Errors that can occur while parsing or resolving a selection.
#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("cannot parse species selection '{0}'")]
    Invalid(String),

    #[error("empty range {start}..{end}")]
    EmptyRange { start: usize, end: usize },

    #[error("species index {index} out of range (only {available} configured)")]
    OutOfRange { index: usize, available: usize },
}

/// Result type for selection operations.
pub type Result<T> = std::result::Result<T, SelectionError>;

/// Which configured species to process.
///
/// Parsed from:
/// - `all`
/// - a single index: `3`
/// - a list: `1,4,7` or `[1, 4, 7]`
/// - a contiguous range: `2..6`, `2..=5`, `range(2, 6)` or `np.arange(2,6)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeciesSelection {
    All,
    Indices(Vec<usize>),
    /// Half-open range `[start, end)`.
    Range { start: usize, end: usize },
}

impl SpeciesSelection {
    /// Resolve to concrete indices into a list of `available` species.
    ///
    /// Duplicates are dropped; the order of first appearance is kept.
    pub fn resolve(&self, available: usize) -> Result<Vec<usize>> {
        let indices: Vec<usize> = match self {
            SpeciesSelection::All => (0..available).collect(),
            SpeciesSelection::Indices(list) => list.clone(),
            SpeciesSelection::Range { start, end } => {
                if *end > available {
                    return Err(SelectionError::OutOfRange {
                        index: *end - 1,
                        available,
                    });
                }
                (*start..*end).collect()
            }
        };

        let mut resolved = Vec::with_capacity(indices.len());
        for index in indices {
            if index >= available {
                return Err(SelectionError::OutOfRange { index, available });
            }
            if !resolved.contains(&index) {
                resolved.push(index);
            }
        }

        Ok(resolved)
    }
}

fn parse_index(s: &str, original: &str) -> Result<usize> {
    s.trim()
        .parse()
        .map_err(|_| SelectionError::Invalid(original.to_string()))
}

impl FromStr for SpeciesSelection {
    type Err = SelectionError;

    fn from_str(input: &str) -> Result<Self> {
        let trimmed = input.trim();

        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(SpeciesSelection::All);
        }

        let range_call = Regex::new(r"^(?:(?:np|numpy)\.a)?range\(\s*(\d+)\s*,\s*(\d+)\s*\)$")
            .map_err(|_| SelectionError::Invalid(input.to_string()))?;
        let range_op = Regex::new(r"^(\d+)\s*\.\.(=?)\s*(\d+)$")
            .map_err(|_| SelectionError::Invalid(input.to_string()))?;

        if let Some(caps) = range_call.captures(trimmed) {
            let start = parse_index(&caps[1], input)?;
            let end = parse_index(&caps[2], input)?;
            return range(start, end);
        }

        if let Some(caps) = range_op.captures(trimmed) {
            let start = parse_index(&caps[1], input)?;
            let mut end = parse_index(&caps[3], input)?;
            if &caps[2] == "=" {
                end = end
                    .checked_add(1)
                    .ok_or_else(|| SelectionError::Invalid(input.to_string()))?;
            }
            return range(start, end);
        }

        let list = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed);

        let indices = list
            .split(',')
            .map(|s| parse_index(s, input))
            .collect::<Result<Vec<usize>>>()?;

        Ok(SpeciesSelection::Indices(indices))
    }
}

fn range(start: usize, end: usize) -> Result<SpeciesSelection> {
    if end <= start {
        return Err(SelectionError::EmptyRange { start, end });
    }
    Ok(SpeciesSelection::Range { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_and_single() {
        assert_eq!("all".parse::<SpeciesSelection>(), Ok(SpeciesSelection::All));
        assert_eq!(" ALL ".parse::<SpeciesSelection>(), Ok(SpeciesSelection::All));
        assert_eq!("3".parse::<SpeciesSelection>(), Ok(SpeciesSelection::Indices(vec![3])));
    }

    #[test]
    fn test_parse_lists() {
        assert_eq!(
            "1,4,7".parse::<SpeciesSelection>(),
            Ok(SpeciesSelection::Indices(vec![1, 4, 7]))
        );
        assert_eq!(
            "[1, 4, 7]".parse::<SpeciesSelection>(),
            Ok(SpeciesSelection::Indices(vec![1, 4, 7]))
        );
    }

    #[test]
    fn test_parse_ranges() {
        let expected = Ok(SpeciesSelection::Range { start: 2, end: 6 });
        assert_eq!("2..6".parse::<SpeciesSelection>(), expected);
        assert_eq!("2..=5".parse::<SpeciesSelection>(), expected);
        assert_eq!("range(2, 6)".parse::<SpeciesSelection>(), expected);
        assert_eq!("np.arange(2,6)".parse::<SpeciesSelection>(), expected);
        assert_eq!(
            "6..2".parse::<SpeciesSelection>(),
            Err(SelectionError::EmptyRange { start: 6, end: 2 })
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!("foo".parse::<SpeciesSelection>().is_err());
        assert!("1,,2".parse::<SpeciesSelection>().is_err());
        assert!("-1".parse::<SpeciesSelection>().is_err());
    }

    #[test]
    fn test_resolve() {
        assert_eq!(SpeciesSelection::All.resolve(3), Ok(vec![0, 1, 2]));
        assert_eq!(
            SpeciesSelection::Indices(vec![2, 0, 2]).resolve(3),
            Ok(vec![2, 0])
        );
        assert_eq!(
            SpeciesSelection::Range { start: 1, end: 3 }.resolve(3),
            Ok(vec![1, 2])
        );
        assert_eq!(
            SpeciesSelection::Indices(vec![5]).resolve(3),
            Err(SelectionError::OutOfRange {
                index: 5,
                available: 3
            })
        );
    }

    #[test]
    fn test_inclusive_range_at_usize_max_is_rejected() {
        let input = format!("0..={}", usize::MAX);
        assert_eq!(
            input.parse::<SpeciesSelection>(),
            Err(SelectionError::Invalid(input.clone()))
        );
    }

    #[test]
    fn test_huge_range_fails_before_allocating() {
        let selection = "0..99999999999999".parse::<SpeciesSelection>().unwrap();
        assert_eq!(
            selection.resolve(3),
            Err(SelectionError::OutOfRange {
                index: 99_999_999_999_998,
                available: 3
            })
        );
    }
}
