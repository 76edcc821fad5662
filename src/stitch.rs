//! Band stitching and resampling onto the output grid.
//!
//! ```text
//!  region 1 ──masked %T──┐
//!  region 2 ──masked %T──┼──► add ──► combined (native grid) ──► resample ──► output grid
//!  region n ──masked %T──┘
//! ```

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::algebra;
use crate::data::model::Spectrum;
use crate::error::{PhotometryError, Result};
use crate::region::SpectralRegion;

// ---------------------------------------------------------------------------
// WavelengthWindow – the caller's uniform output grid
// ---------------------------------------------------------------------------

/// Largest output grid a window may describe.
pub const MAX_GRID_POINTS: usize = 10_000_000;

/// Output grid `lower, lower + step, …` up to `upper` (nm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WavelengthWindow {
    pub lower: f64,
    pub upper: f64,
    pub step: f64,
}

impl WavelengthWindow {
    pub fn new(lower: f64, upper: f64, step: f64) -> Result<Self> {
        let window = WavelengthWindow { lower, upper, step };
        window.validate()?;
        Ok(window)
    }

    fn validate(&self) -> Result<()> {
        if !(self.lower.is_finite() && self.upper.is_finite() && self.step.is_finite()) {
            return Err(PhotometryError::InvalidWindow(
                "bounds and step must be finite".to_string(),
            ));
        }
        if self.lower >= self.upper {
            return Err(PhotometryError::InvalidWindow(format!(
                "lower bound {} nm is not below upper bound {} nm",
                self.lower, self.upper
            )));
        }
        if self.step <= 0.0 {
            return Err(PhotometryError::InvalidWindow(format!(
                "step {} nm must be positive",
                self.step
            )));
        }
        let points = self.raw_point_count();
        if !points.is_finite() || points >= MAX_GRID_POINTS as f64 {
            return Err(PhotometryError::InvalidWindow(format!(
                "step {} nm gives more than {MAX_GRID_POINTS} grid points over {}-{} nm",
                self.step, self.lower, self.upper
            )));
        }
        Ok(())
    }

    fn raw_point_count(&self) -> f64 {
        ((self.upper - self.lower) / self.step + 1e-9).floor()
    }

    /// Restrict the window to the instrument's range `[min, max]`.
    ///
    /// Out-of-range bounds move one nanometre inside the truncated limit.
    pub fn clamp_to(self, min: f64, max: f64) -> Result<Self> {
        let mut window = self;
        if window.lower < min {
            window.lower = min.floor() + 1.0;
        }
        if window.upper > max {
            window.upper = max.floor() - 1.0;
        }
        if window != self {
            info!(
                "wavelength window clamped to {:.1}-{:.1} nm (instrument {:.1}-{:.1} nm)",
                window.lower, window.upper, min, max
            );
        }
        window.validate()?;
        Ok(window)
    }

    /// Number of output grid points, `upper` included when it lies on the grid.
    ///
    /// Never more than [`MAX_GRID_POINTS`], even for a window built field by field.
    pub fn point_count(&self) -> usize {
        let intervals = self.raw_point_count().clamp(0.0, MAX_GRID_POINTS as f64) as usize;
        intervals.saturating_add(1).min(MAX_GRID_POINTS)
    }

    pub fn grid(&self) -> Vec<f64> {
        (0..self.point_count())
            .map(|i| self.lower + i as f64 * self.step)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Stitching
// ---------------------------------------------------------------------------

/// Sum the masked contributions of every selected region for one sample.
///
/// Returns `Ok(None)` when no region is selected.
pub fn combine(regions: &[SpectralRegion], sample_index: usize) -> Result<Option<Spectrum>> {
    let contributions = regions
        .iter()
        .filter(|r| r.should_measure)
        .map(|r| r.masked_transmission(sample_index))
        .collect::<Result<Vec<_>>>()?;

    if contributions.is_empty() {
        debug!("sample {sample_index}: no region selected, nothing to combine");
        return Ok(None);
    }
    let refs: Vec<&Spectrum> = contributions.iter().collect();
    let combined = algebra::add(&refs)?;
    debug!(
        "sample {sample_index}: combined {} region(s) into {combined}",
        contributions.len()
    );
    Ok(Some(combined))
}

// ---------------------------------------------------------------------------
// Resampling
// ---------------------------------------------------------------------------

/// Linear interpolation at `lambda`; clamps to the edge values outside the
/// measured extent and returns native values unchanged on native points.
pub fn interpolate(spectrum: &Spectrum, lambda: f64) -> f64 {
    let x = &spectrum.wavelength;
    let y = &spectrum.signal;
    let n = x.len();
    if n == 0 {
        return f64::NAN;
    }
    if lambda <= x[0] {
        return y[0];
    }
    if lambda >= x[n - 1] {
        return y[n - 1];
    }
    let j = x.partition_point(|&v| v < lambda);
    if x[j] == lambda {
        return y[j];
    }
    let (x0, x1) = (x[j - 1], x[j]);
    let (y0, y1) = (y[j - 1], y[j]);
    y0 + (y1 - y0) * (lambda - x0) / (x1 - x0)
}

/// Resample onto the uniform grid of `window`, keeping metadata.
pub fn resample(spectrum: &Spectrum, window: &WavelengthWindow) -> Result<Spectrum> {
    if spectrum.is_empty() {
        return Err(PhotometryError::EmptyOperands);
    }
    let wavelength = window.grid();
    let signal = wavelength.iter().map(|&l| interpolate(spectrum, l)).collect();
    let mut resampled = Spectrum::new(wavelength, signal)?;
    resampled.metadata = spectrum.metadata.clone();
    Ok(resampled)
}
