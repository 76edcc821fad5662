use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::drift::Correction;
use crate::mask::EdgeShape;
use crate::region::{COMMON_TRANSITION_WIDTH, MeasurementMode};
use crate::stitch::WavelengthWindow;

/// Everything that parametrises one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub mode: MeasurementMode,
    /// Requested output window, before clamping to the instrument range.
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub step: f64,
    pub number_of_averages: u32,
    /// Upper bound for the integration time, in s.
    pub max_integration_time: f64,
    /// Append blocked (0 %) and open (100 %) control slots.
    pub control_measurements: bool,
    pub correction: Correction,
    pub edge_shape: EdgeShape,
    pub transition_width: f64,
    pub comment: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            mode: MeasurementMode::SinglePass,
            lower_bound: 400.0,
            upper_bound: 1000.0,
            step: 1.0,
            number_of_averages: 10,
            max_integration_time: 1.0,
            control_measurements: false,
            correction: Correction::Dark,
            edge_shape: EdgeShape::Cubic,
            transition_width: COMMON_TRANSITION_WIDTH,
            comment: "---".to_string(),
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading run config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing run config {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialising run config")
    }

    /// The requested window, validated but not yet clamped.
    pub fn window(&self) -> Result<WavelengthWindow> {
        Ok(WavelengthWindow::new(
            self.lower_bound,
            self.upper_bound,
            self.step,
        )?)
    }

    /// Sample slots per region: the samples plus two controls if enabled.
    pub fn slot_count(&self, samples: usize) -> usize {
        if self.control_measurements {
            samples + 2
        } else {
            samples
        }
    }
}
