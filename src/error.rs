use thiserror::Error;

use crate::region::FilterBand;

/// Errors raised by the spectrum algebra, region and stitching layers.
///
/// Division by zero is not an error: ratios carry `NaN` at those wavelengths.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhotometryError {
    #[error("wavelength grids differ: {left} samples vs {right} samples")]
    GridMismatch { left: usize, right: usize },

    #[error("region {band} is not configured: missing {missing}")]
    NotConfigured { band: FilterBand, missing: &'static str },

    #[error("sample index {index} out of range for {len} slots")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("malformed spectrum: {0}")]
    MalformedSpectrum(String),

    #[error("operation needs at least one spectrum")]
    EmptyOperands,

    #[error("invalid wavelength window: {0}")]
    InvalidWindow(String),
}

pub type Result<T> = std::result::Result<T, PhotometryError>;
