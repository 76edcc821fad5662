//! Drift-cancelling ABBA acquisition.
//!
//! The signal (A) is acquired twice, bracketing two dark (B) acquisitions in
//! the temporal order A1, B1, B2, A2. For drift that is linear over the four
//! acquisitions, the symmetric means cancel the first-order term:
//!
//! ```text
//! corrected = (A1 + A2) / 2 - (B1 + B2) / 2
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::algebra;
use crate::data::model::Spectrum;
use crate::error::Result;

/// How a run removes dark current from its acquisitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Correction {
    /// One reference, one dark; transmission via the bias-corrected ratio.
    #[default]
    Dark,
    /// Reference and samples each acquired as an ABBA sequence.
    Abba,
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correction::Dark => write!(f, "single dark subtraction"),
            Correction::Abba => write!(f, "ABBA drift cancellation"),
        }
    }
}

/// Position of one acquisition inside an ABBA sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    A1,
    B1,
    B2,
    A2,
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a1" => Ok(Phase::A1),
            "b1" => Ok(Phase::B1),
            "b2" => Ok(Phase::B2),
            "a2" => Ok(Phase::A2),
            other => Err(format!("unknown ABBA phase '{other}'")),
        }
    }
}

/// The four acquisitions of one ABBA sequence.
#[derive(Debug, Clone)]
pub struct AbbaSequence {
    pub signal_1: Spectrum,
    pub dark_1: Spectrum,
    pub dark_2: Spectrum,
    pub signal_2: Spectrum,
}

impl AbbaSequence {
    pub fn new(signal_1: Spectrum, dark_1: Spectrum, dark_2: Spectrum, signal_2: Spectrum) -> Self {
        AbbaSequence {
            signal_1,
            dark_1,
            dark_2,
            signal_2,
        }
    }

    /// Dark-corrected, drift-cancelled signal.
    pub fn cancel_drift(&self) -> Result<Spectrum> {
        let signal = algebra::average(&[&self.signal_1, &self.signal_2])?;
        let dark = algebra::average(&[&self.dark_1, &self.dark_2])?;
        let mut corrected = algebra::subtract(&signal, &dark)?;
        corrected.metadata.insert("Correction", Correction::Abba.to_string());
        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PhotometryError;

    fn flat(value: f64) -> Spectrum {
        Spectrum::constant(vec![400.0, 500.0, 600.0], value).unwrap()
    }

    #[test]
    fn constant_example_yields_eight() {
        let seq = AbbaSequence::new(flat(10.0), flat(2.0), flat(4.0), flat(12.0));
        let corrected = seq.cancel_drift().unwrap();
        assert_eq!(corrected.signal, vec![8.0, 8.0, 8.0]);
        assert_eq!(corrected.metadata.get("Correction"), Some("ABBA drift cancellation"));
    }

    #[test]
    fn linear_drift_cancels() {
        // True signal 50, dark 5, both drifting by +1 per acquisition step.
        let seq = AbbaSequence::new(flat(50.0), flat(5.0 + 1.0), flat(5.0 + 2.0), flat(50.0 + 3.0));
        let corrected = seq.cancel_drift().unwrap();
        for v in corrected.signal {
            assert!((v - 45.0).abs() < 1e-12);
        }
    }

    #[test]
    fn mismatched_acquisitions_fail() {
        let odd = Spectrum::constant(vec![400.0, 500.0], 1.0).unwrap();
        let seq = AbbaSequence::new(flat(1.0), odd, flat(1.0), flat(1.0));
        assert!(matches!(seq.cancel_drift(), Err(PhotometryError::GridMismatch { .. })));
    }

    #[test]
    fn phase_parsing() {
        assert_eq!("A1".parse::<Phase>(), Ok(Phase::A1));
        assert_eq!(" b2 ".parse::<Phase>(), Ok(Phase::B2));
        assert!("c".parse::<Phase>().is_err());
    }
}
