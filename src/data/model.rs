use std::fmt;

use serde::{Deserialize, Serialize};

use crate::drift::Phase;
use crate::error::{PhotometryError, Result};
use crate::region::FilterBand;

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a metadata column of a raw file
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata cell as read from a raw acquisition file.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            MetadataValue::Integer(i) => usize::try_from(*i).ok(),
            MetadataValue::Float(v) if v.fract() == 0.0 && *v >= 0.0 => Some(*v as usize),
            MetadataValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// MetaData – ordered string records attached to a spectrum
// ---------------------------------------------------------------------------

/// Ordered `key → value` records. Insertion order is kept and keys are unique:
/// inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaData {
    records: Vec<(String, String)>,
}

impl MetaData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.records.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.records.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.records
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

// ---------------------------------------------------------------------------
// Spectrum – (wavelength, signal) samples on an ascending grid
// ---------------------------------------------------------------------------

/// A wavelength-indexed series of signal values.
///
/// Wavelengths are strictly ascending (nm). Treated as immutable: every
/// algebraic operation produces a new spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Wavelength axis in nm.
    pub wavelength: Vec<f64>,
    /// Signal values, same length as `wavelength`.
    pub signal: Vec<f64>,
    /// Free-form records (sample name, band, ...).
    pub metadata: MetaData,
}

impl Spectrum {
    /// Build a spectrum, checking lengths and the ascending grid.
    pub fn new(wavelength: Vec<f64>, signal: Vec<f64>) -> Result<Self> {
        if wavelength.len() != signal.len() {
            return Err(PhotometryError::MalformedSpectrum(format!(
                "{} wavelengths but {} signal values",
                wavelength.len(),
                signal.len()
            )));
        }
        if let Some(i) = wavelength.windows(2).position(|w| !(w[0] < w[1])) {
            return Err(PhotometryError::MalformedSpectrum(format!(
                "wavelengths not strictly ascending at index {}",
                i + 1
            )));
        }
        Ok(Spectrum {
            wavelength,
            signal,
            metadata: MetaData::new(),
        })
    }

    /// A spectrum on the same grid with a constant signal.
    #[cfg(test)]
    pub fn constant(wavelength: Vec<f64>, value: f64) -> Result<Self> {
        let signal = vec![value; wavelength.len()];
        Spectrum::new(wavelength, signal)
    }

    /// New spectrum on this grid with the given signal and no metadata.
    ///
    /// `signal` must have the grid's length; callers inside the crate
    /// derive it elementwise from this spectrum.
    pub(crate) fn with_signal(&self, signal: Vec<f64>) -> Self {
        debug_assert_eq!(signal.len(), self.wavelength.len());
        Spectrum {
            wavelength: self.wavelength.clone(),
            signal,
            metadata: MetaData::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }

    /// Identical grids: same length, same values in the same order.
    pub fn same_grid(&self, other: &Spectrum) -> bool {
        self.wavelength == other.wavelength
    }

    /// Smallest and largest wavelength, `None` for an empty spectrum.
    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        Some((*self.wavelength.first()?, *self.wavelength.last()?))
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.wavelength
            .iter()
            .copied()
            .zip(self.signal.iter().copied())
    }
}

impl fmt::Display for Spectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.wavelength_range() {
            Some((lo, hi)) => write!(f, "{} samples, {lo:.2}-{hi:.2} nm", self.len()),
            None => write!(f, "empty spectrum"),
        }
    }
}

// ---------------------------------------------------------------------------
// Acquisition – one raw spectrum taken by the instrument layer
// ---------------------------------------------------------------------------

/// What an acquisition was taken of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Target {
    /// Open beam, no sample.
    Reference,
    /// Shutter closed.
    Dark,
    /// Sample at a 0-based index of the sample list.
    Sample(usize),
    /// Control with the beam blocked (0 %).
    Blocked,
    /// Control with the beam open (100 %).
    Open,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Reference => write!(f, "reference"),
            Target::Dark => write!(f, "dark"),
            Target::Sample(i) => write!(f, "sample {}", i + 1),
            Target::Blocked => write!(f, "blocked control"),
            Target::Open => write!(f, "open control"),
        }
    }
}

/// A raw acquisition and the context it was taken in.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub band: FilterBand,
    pub target: Target,
    /// Position inside an ABBA sequence, `None` for a plain acquisition.
    pub phase: Option<Phase>,
    /// Spectrometer temperature in °C, when the instrument reports one.
    pub temperature: Option<f64>,
    /// Integration time in s, when recorded.
    pub integration_time: Option<f64>,
    pub spectrum: Spectrum,
}

// ---------------------------------------------------------------------------
// AcquisitionLog – everything one run acquired
// ---------------------------------------------------------------------------

/// All acquisitions of a run, in acquisition order.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionLog {
    pub acquisitions: Vec<Acquisition>,
}

impl AcquisitionLog {
    pub fn new(acquisitions: Vec<Acquisition>) -> Self {
        AcquisitionLog { acquisitions }
    }

    pub fn len(&self) -> usize {
        self.acquisitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.acquisitions.is_empty()
    }

    /// Number of samples implied by the highest sample index.
    pub fn sample_count(&self) -> usize {
        self.acquisitions
            .iter()
            .filter_map(|a| match a.target {
                Target::Sample(i) => Some(i + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Wavelength extent covered by every acquisition.
    pub fn wavelength_range(&self) -> Option<(f64, f64)> {
        self.acquisitions
            .iter()
            .filter_map(|a| a.spectrum.wavelength_range())
            .reduce(|(lo, hi), (l, h)| (lo.max(l), hi.min(h)))
    }

    /// Temperature readings in acquisition order.
    pub fn temperatures(&self) -> Vec<f64> {
        self.acquisitions
            .iter()
            .filter_map(|a| a.temperature)
            .collect()
    }

    /// Distinct bands present, in first-seen order.
    pub fn bands(&self) -> Vec<FilterBand> {
        let mut bands: Vec<FilterBand> = Vec::new();
        for a in &self.acquisitions {
            if !bands.contains(&a.band) {
                bands.push(a.band);
            }
        }
        bands
    }
}

/// Column name → value cells of one raw file row, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMetadata {
    cells: Vec<(String, MetadataValue)>,
}

impl RowMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repeated column name replaces the earlier cell in place.
    pub fn insert(&mut self, column: String, value: MetadataValue) {
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&MetadataValue> {
        self.cells.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, MetadataValue)> {
        self.cells.iter()
    }
}
