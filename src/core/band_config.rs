//! Persisted band definitions for all species.
//!
//! The file is a JSON list with one entry per species:
//! `[["CFC11", [700.0, 900.0], [1000.0, 1200.0]], ["HFC134a", [1050.0, 1350.0]]]`.
//! Empty entries (`[]`) mark species skipped by an earlier run and are ignored on load.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::transforms::WavenumberInterval;
use super::writers::ensure_parent_dirs;

/// Errors that can occur while reading or writing the band configuration.
#[derive(Error, Debug)]
pub enum BandConfigError {
    #[error("failed to access band config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid band config '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to create band config directory: {0}")]
    CreateDirectory(String),
}

/// Result type for band configuration operations.
pub type Result<T> = std::result::Result<T, BandConfigError>;

/// The ordered bands of one species.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesBands {
    pub species: String,
    pub bands: Vec<WavenumberInterval>,
}

impl SpeciesBands {
    pub fn new(species: impl Into<String>, bands: Vec<WavenumberInterval>) -> Self {
        Self {
            species: species.into(),
            bands,
        }
    }
}

impl Serialize for SpeciesBands {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.bands.len() + 1))?;
        seq.serialize_element(&self.species)?;
        for band in &self.bands {
            seq.serialize_element(band)?;
        }
        seq.end()
    }
}

/// One list entry, `None` for an empty `[]` placeholder.
struct ConfigEntry(Option<SpeciesBands>);

struct ConfigEntryVisitor;

impl<'de> Visitor<'de> for ConfigEntryVisitor {
    type Value = ConfigEntry;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a list starting with a species name followed by [min, max] pairs")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<ConfigEntry, A::Error> {
        let species: String = match seq.next_element()? {
            Some(name) => name,
            None => return Ok(ConfigEntry(None)),
        };

        let mut bands = Vec::new();
        while let Some(band) = seq.next_element::<WavenumberInterval>()? {
            bands.push(band);
        }

        Ok(ConfigEntry(Some(SpeciesBands { species, bands })))
    }
}

impl<'de> Deserialize<'de> for ConfigEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_seq(ConfigEntryVisitor)
    }
}

impl<'de> Deserialize<'de> for SpeciesBands {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        ConfigEntry::deserialize(deserializer)?
            .0
            .ok_or_else(|| de::Error::custom("empty band config entry"))
    }
}

/// Band definitions of all species, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandConfigList {
    entries: Vec<SpeciesBands>,
}

impl BandConfigList {
    pub fn new(entries: Vec<SpeciesBands>) -> Self {
        Self { entries }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SpeciesBands] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpeciesBands> {
        self.entries.iter()
    }

    /// Entry at a position of the list, as shown to users for selection.
    pub fn at(&self, index: usize) -> Option<&SpeciesBands> {
        self.entries.get(index)
    }

    /// Bands of `species`, if defined.
    pub fn get(&self, species: &str) -> Option<&SpeciesBands> {
        self.entries.iter().find(|e| e.species == species)
    }

    /// Replace the entry of the same species in place, or append.
    pub fn upsert(&mut self, entry: SpeciesBands) {
        match self.entries.iter_mut().find(|e| e.species == entry.species) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }
}

impl Serialize for BandConfigList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BandConfigList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw: Vec<ConfigEntry> = Vec::deserialize(deserializer)?;
        Ok(Self {
            entries: raw.into_iter().filter_map(|e| e.0).collect(),
        })
    }
}

/// Persistence of the band configuration list.
pub trait BandStore {
    /// Saved configuration, `None` if nothing has been saved yet.
    fn load(&self) -> Result<Option<BandConfigList>>;

    fn save(&self, config: &BandConfigList) -> Result<()>;
}

/// Band configuration stored as a single JSON document.
#[derive(Debug, Clone)]
pub struct JsonBandStore {
    path: PathBuf,
}

impl JsonBandStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BandStore for JsonBandStore {
    fn load(&self) -> Result<Option<BandConfigList>> {
        if !self.path.is_file() {
            return Ok(None);
        }

        let file = File::open(&self.path).map_err(|e| BandConfigError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        let config = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            BandConfigError::Json {
                path: self.path.clone(),
                source: e,
            }
        })?;

        Ok(Some(config))
    }

    fn save(&self, config: &BandConfigList) -> Result<()> {
        ensure_parent_dirs(&self.path)
            .map_err(|e| BandConfigError::CreateDirectory(e.to_string()))?;

        let io_err = |e| BandConfigError::Io {
            path: self.path.clone(),
            source: e,
        };

        let mut writer = BufWriter::new(File::create(&self.path).map_err(io_err)?);
        serde_json::to_writer(&mut writer, config).map_err(|e| BandConfigError::Json {
            path: self.path.clone(),
            source: e,
        })?;
        writer.flush().map_err(io_err)?;

        log::info!("Band config -> {}", self.path.display());
        Ok(())
    }
}
