//! Bandpass masks used to blend neighbouring spectral regions.
//!
//! A region `[low, high]` with transition width `w` has a rising edge centred
//! on `low` and a falling edge centred on `high`, each spanning `2w`. Two
//! regions sharing a cutoff `c` use complementary edges over `[c - w, c + w]`,
//! so their weights sum to one there.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::model::Spectrum;

/// Shape of the ramp at each cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeShape {
    /// 0/1 jump at the cutoff; the cutoff itself belongs to the upper side.
    Step,
    /// Smoothstep `3t² - 2t³` over `[c - w, c + w]`.
    #[default]
    Cubic,
}

impl fmt::Display for EdgeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeShape::Step => write!(f, "step"),
            EdgeShape::Cubic => write!(f, "cubic"),
        }
    }
}

impl FromStr for EdgeShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "step" | "hard" => Ok(EdgeShape::Step),
            "cubic" | "smooth" => Ok(EdgeShape::Cubic),
            other => Err(format!("unknown edge shape '{other}' (expected step or cubic)")),
        }
    }
}

/// Weight of an edge rising from 0 to 1 around `cutoff`.
pub fn rising_edge(lambda: f64, cutoff: f64, width: f64, shape: EdgeShape) -> f64 {
    match shape {
        EdgeShape::Cubic if width > 0.0 => {
            let t = ((lambda - (cutoff - width)) / (2.0 * width)).clamp(0.0, 1.0);
            t * t * (3.0 - 2.0 * t)
        }
        _ => {
            if lambda >= cutoff {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Weight of an edge falling from 1 to 0 around `cutoff`, the exact
/// complement of [`rising_edge`] at the same cutoff.
pub fn falling_edge(lambda: f64, cutoff: f64, width: f64, shape: EdgeShape) -> f64 {
    1.0 - rising_edge(lambda, cutoff, width, shape)
}

/// A region's passband: where it contributes and how its edges look.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bandpass {
    pub cutoff_low: f64,
    pub cutoff_high: f64,
    pub transition_width: f64,
    pub shape: EdgeShape,
}

impl Bandpass {
    pub fn new(cutoff_low: f64, cutoff_high: f64, transition_width: f64, shape: EdgeShape) -> Self {
        Bandpass {
            cutoff_low,
            cutoff_high,
            transition_width,
            shape,
        }
    }

    /// Full support including both ramps.
    pub fn support(&self) -> (f64, f64) {
        (
            self.cutoff_low - self.transition_width,
            self.cutoff_high + self.transition_width,
        )
    }

    /// Mask weight in `[0, 1]` at `lambda`, exactly 0 outside the support.
    pub fn weight(&self, lambda: f64) -> f64 {
        let (lo, hi) = self.support();
        if lambda < lo || lambda > hi {
            return 0.0;
        }
        let w = self.transition_width;
        rising_edge(lambda, self.cutoff_low, w, self.shape)
            * falling_edge(lambda, self.cutoff_high, w, self.shape)
    }

    /// Apply the mask over the whole grid. Zero-weight samples become exactly
    /// zero even when the underlying value is `NaN`; the grid is unchanged.
    pub fn apply(&self, spectrum: &Spectrum) -> Spectrum {
        let signal = spectrum
            .points()
            .map(|(lambda, v)| {
                let w = self.weight(lambda);
                if w == 0.0 {
                    0.0
                } else {
                    v * w
                }
            })
            .collect();
        let mut masked = spectrum.with_signal(signal);
        masked.metadata = spectrum.metadata.clone();
        masked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn grid(lo: f64, hi: f64, step: f64) -> Vec<f64> {
        let n = ((hi - lo) / step).round() as usize;
        (0..=n).map(|i| lo + i as f64 * step).collect()
    }

    #[test]
    fn adjacent_cubic_masks_sum_to_one() {
        let a = Bandpass::new(100.0, 464.0, 10.0, EdgeShape::Cubic);
        let b = Bandpass::new(464.0, 545.0, 10.0, EdgeShape::Cubic);
        for lambda in grid(454.0, 474.0, 0.05) {
            let sum = a.weight(lambda) + b.weight(lambda);
            assert!((sum - 1.0).abs() < TOL, "sum {sum} at {lambda}");
        }
    }

    #[test]
    fn adjacent_step_masks_sum_to_one_including_cutoff() {
        let a = Bandpass::new(100.0, 464.0, 10.0, EdgeShape::Step);
        let b = Bandpass::new(464.0, 545.0, 10.0, EdgeShape::Step);
        for lambda in grid(454.0, 474.0, 0.5) {
            let sum = a.weight(lambda) + b.weight(lambda);
            assert_eq!(sum, 1.0, "at {lambda}");
        }
        assert_eq!(a.weight(464.0), 0.0);
        assert_eq!(b.weight(464.0), 1.0);
    }

    #[test]
    fn cubic_ramp_shape() {
        let band = Bandpass::new(500.0, 600.0, 10.0, EdgeShape::Cubic);
        assert_eq!(band.weight(490.0), 0.0);
        assert!((band.weight(500.0) - 0.5).abs() < TOL);
        assert_eq!(band.weight(510.0), 1.0);
        assert_eq!(band.weight(550.0), 1.0);
        assert!((band.weight(600.0) - 0.5).abs() < TOL);
        assert_eq!(band.weight(610.0), 0.0);
        // monotone on the rising edge
        let mut last = 0.0;
        for lambda in grid(490.0, 510.0, 0.25) {
            let w = band.weight(lambda);
            assert!(w >= last);
            last = w;
        }
    }

    #[test]
    fn masked_spectrum_is_zero_outside_support_even_for_nan() {
        let wavelength = grid(400.0, 700.0, 1.0);
        let mut signal = vec![42.0; wavelength.len()];
        signal[0] = f64::NAN;
        signal[300] = f64::INFINITY;
        let sp = Spectrum::new(wavelength, signal).unwrap();

        let band = Bandpass::new(500.0, 600.0, 10.0, EdgeShape::Cubic);
        let masked = band.apply(&sp);
        assert_eq!(masked.wavelength, sp.wavelength);
        for (lambda, v) in masked.points() {
            if lambda < 490.0 || lambda > 610.0 {
                assert_eq!(v, 0.0, "at {lambda}");
            }
        }
        assert_eq!(masked.signal[150], 42.0);
    }

    #[test]
    fn zero_width_cubic_degenerates_to_step() {
        let band = Bandpass::new(500.0, 600.0, 0.0, EdgeShape::Cubic);
        assert_eq!(band.weight(499.9), 0.0);
        assert_eq!(band.weight(500.0), 1.0);
        assert_eq!(band.weight(599.9), 1.0);
        assert_eq!(band.weight(600.0), 0.0);
    }

    #[test]
    fn edge_shape_parsing() {
        assert_eq!("Cubic".parse::<EdgeShape>(), Ok(EdgeShape::Cubic));
        assert_eq!("step".parse::<EdgeShape>(), Ok(EdgeShape::Step));
        assert!("linear".parse::<EdgeShape>().is_err());
    }
}
