/// Data layer: core types, loading, and acquisition selection.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → AcquisitionLog
///   └──────────┘
///        │
///        ▼
///   ┌───────────────┐
///   │ AcquisitionLog │  Vec<Acquisition>: band, target, phase, Spectrum
///   └───────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  band / target / phase predicates → averaged spectra, ABBA sequences
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
