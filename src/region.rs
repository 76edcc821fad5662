use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::algebra;
use crate::data::model::Spectrum;
use crate::drift::{AbbaSequence, Correction};
use crate::error::{PhotometryError, Result};
use crate::mask::{Bandpass, EdgeShape};

/// Transition width shared by every band layout, in nm.
pub const COMMON_TRANSITION_WIDTH: f64 = 10.0;

// ---------------------------------------------------------------------------
// FilterBand – the closed set of filter-wheel bands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterBand {
    /// Filter A.
    Violet,
    /// Filter B.
    Blue,
    /// Filter C.
    Yellow,
    /// Filter D.
    Red,
    /// Filter E.
    Nir,
    /// Empty wheel slot.
    OpenPort,
}

impl FilterBand {
    pub const ALL: [FilterBand; 6] = [
        FilterBand::Violet,
        FilterBand::Blue,
        FilterBand::Yellow,
        FilterBand::Red,
        FilterBand::Nir,
        FilterBand::OpenPort,
    ];

    /// Slot number on the filter wheel, for the wheel driver.
    pub fn wheel_position(self) -> u8 {
        match self {
            FilterBand::Violet => 1,
            FilterBand::Blue => 2,
            FilterBand::Yellow => 3,
            FilterBand::Red => 4,
            FilterBand::Nir => 5,
            FilterBand::OpenPort => 6,
        }
    }

    pub fn friendly_name(self) -> &'static str {
        match self {
            FilterBand::Violet => "Filter A (Violet)",
            FilterBand::Blue => "Filter B (Blue)",
            FilterBand::Yellow => "Filter C (Yellow)",
            FilterBand::Red => "Filter D (Red)",
            FilterBand::Nir => "Filter E (NIR)",
            FilterBand::OpenPort => "Open Port (no filter)",
        }
    }
}

impl fmt::Display for FilterBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterBand::Violet => "violet",
            FilterBand::Blue => "blue",
            FilterBand::Yellow => "yellow",
            FilterBand::Red => "red",
            FilterBand::Nir => "nir",
            FilterBand::OpenPort => "open",
        };
        write!(f, "{name}")
    }
}

impl FromStr for FilterBand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "violet" | "a" | "filtera" => Ok(FilterBand::Violet),
            "blue" | "b" | "filterb" => Ok(FilterBand::Blue),
            "yellow" | "c" | "filterc" => Ok(FilterBand::Yellow),
            "red" | "d" | "filterd" => Ok(FilterBand::Red),
            "nir" | "e" | "filtere" => Ok(FilterBand::Nir),
            "open" | "openport" => Ok(FilterBand::OpenPort),
            other => {
                let known: Vec<String> = FilterBand::ALL.iter().map(ToString::to_string).collect();
                Err(format!(
                    "unknown filter band '{other}', expected one of {}",
                    known.join(", ")
                ))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MeasurementMode – which bands a run stitches together
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MeasurementMode {
    #[default]
    SinglePass,
    TwoPass,
    ThreePass,
    FourPass,
    FivePass,
}

impl MeasurementMode {
    /// Ordered `(band, cutoff_low, cutoff_high)` layout of this mode.
    pub fn layout(self) -> Vec<(FilterBand, f64, f64)> {
        use FilterBand::*;
        match self {
            MeasurementMode::SinglePass => vec![(OpenPort, 100.0, 2000.0)],
            MeasurementMode::TwoPass => vec![(Violet, 100.0, 464.0), (OpenPort, 464.0, 2000.0)],
            MeasurementMode::ThreePass => vec![
                (Violet, 100.0, 464.0),
                (OpenPort, 464.0, 875.0),
                (Nir, 875.0, 2000.0),
            ],
            MeasurementMode::FourPass => vec![
                (Violet, 100.0, 464.0),
                (Blue, 464.0, 545.0),
                (Yellow, 545.0, 685.0),
                (Red, 685.0, 2000.0),
            ],
            MeasurementMode::FivePass => vec![
                (Violet, 100.0, 464.0),
                (Blue, 464.0, 545.0),
                (Yellow, 545.0, 685.0),
                (Red, 685.0, 875.0),
                (Nir, 875.0, 2000.0),
            ],
        }
    }

    pub fn friendly_name(self) -> &'static str {
        match self {
            MeasurementMode::SinglePass => "Unfiltered (single pass)",
            MeasurementMode::TwoPass => "Violet + Unfiltered (two pass)",
            MeasurementMode::ThreePass => "Violet + Unfiltered + NIR (three pass)",
            MeasurementMode::FourPass => "Violet + Blue + Yellow + Red (four pass)",
            MeasurementMode::FivePass => "Violet + Blue + Yellow + Red + NIR (five pass)",
        }
    }
}

impl TryFrom<u8> for MeasurementMode {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(MeasurementMode::SinglePass),
            2 => Ok(MeasurementMode::TwoPass),
            3 => Ok(MeasurementMode::ThreePass),
            4 => Ok(MeasurementMode::FourPass),
            5 => Ok(MeasurementMode::FivePass),
            other => Err(format!("measurement mode must be 1..=5, got {other}")),
        }
    }
}

impl fmt::Display for MeasurementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.friendly_name())
    }
}

// ---------------------------------------------------------------------------
// SpectralRegion – one filter band's acquisitions and contribution
// ---------------------------------------------------------------------------

/// One filter pass-band: its cutoffs, acquisition settings and stored spectra.
///
/// In [`Correction::Dark`] runs the slots hold raw spectra and a dark spectrum
/// is required. In [`Correction::Abba`] runs reference and sample slots hold
/// drift-cancelled (already dark-corrected) spectra.
#[derive(Debug, Clone)]
pub struct SpectralRegion {
    pub band: FilterBand,
    pub bandpass: Bandpass,
    pub correction: Correction,
    pub max_integration_time: f64,
    pub integration_time: f64,
    pub number_of_averages: u32,
    pub should_measure: bool,
    reference: Option<Spectrum>,
    dark: Option<Spectrum>,
    samples: Vec<Option<Spectrum>>,
}

impl SpectralRegion {
    pub fn new(
        band: FilterBand,
        bandpass: Bandpass,
        correction: Correction,
        slots: usize,
        max_integration_time: f64,
    ) -> Self {
        SpectralRegion {
            band,
            bandpass,
            correction,
            max_integration_time,
            integration_time: max_integration_time,
            number_of_averages: 2,
            should_measure: true,
            reference: None,
            dark: None,
            samples: vec![None; slots],
        }
    }

    pub fn cutoff_low(&self) -> f64 {
        self.bandpass.cutoff_low
    }

    pub fn cutoff_high(&self) -> f64 {
        self.bandpass.cutoff_high
    }

    pub fn transition_width(&self) -> f64 {
        self.bandpass.transition_width
    }

    /// Number of sample slots, controls included.
    pub fn slot_count(&self) -> usize {
        self.samples.len()
    }

    /// Clamped to `max_integration_time`.
    pub fn set_integration_time(&mut self, seconds: f64) {
        self.integration_time = seconds.min(self.max_integration_time);
    }

    /// Decide participation from the requested output window `[lower, upper]`.
    pub fn gate(&mut self, lower: f64, upper: f64) {
        let (lo, hi) = self.bandpass.support();
        self.should_measure = !(lower > hi || upper < lo);
        debug!(
            "region {} [{:.0}, {:.0}] nm: should_measure = {}",
            self.band,
            self.cutoff_low(),
            self.cutoff_high(),
            self.should_measure
        );
    }

    pub fn set_reference(&mut self, spectrum: Spectrum) {
        if self.reference.is_some() {
            debug!("region {}: replacing reference spectrum", self.band);
        }
        self.reference = Some(spectrum);
    }

    pub fn set_dark(&mut self, spectrum: Spectrum) {
        if self.dark.is_some() {
            debug!("region {}: replacing dark spectrum", self.band);
        }
        self.dark = Some(spectrum);
    }

    pub fn set_raw_sample(&mut self, index: usize, spectrum: Spectrum) -> Result<()> {
        let len = self.slot_count();
        let slot = self
            .samples
            .get_mut(index)
            .ok_or(PhotometryError::IndexOutOfRange { index, len })?;
        if slot.is_some() {
            debug!("region {}: replacing sample {index}", self.band);
        }
        *slot = Some(spectrum);
        Ok(())
    }

    /// Store the drift-cancelled signal of an ABBA reference acquisition.
    pub fn set_abba_reference(&mut self, sequence: &AbbaSequence) -> Result<()> {
        let corrected = sequence.cancel_drift()?;
        self.set_reference(corrected);
        Ok(())
    }

    /// Store the drift-cancelled signal of an ABBA sample acquisition.
    pub fn set_abba_sample(&mut self, index: usize, sequence: &AbbaSequence) -> Result<()> {
        let corrected = sequence.cancel_drift()?;
        self.set_raw_sample(index, corrected)
    }

    pub fn reference(&self) -> Option<&Spectrum> {
        self.reference.as_ref()
    }

    pub fn dark(&self) -> Option<&Spectrum> {
        self.dark.as_ref()
    }

    pub fn sample(&self, index: usize) -> Option<&Spectrum> {
        self.samples.get(index).and_then(Option::as_ref)
    }

    /// Unmasked transmission of one sample as a fraction.
    pub fn transmission(&self, index: usize) -> Result<Spectrum> {
        let len = self.slot_count();
        if index >= len {
            return Err(PhotometryError::IndexOutOfRange { index, len });
        }
        if !self.should_measure {
            return Err(self.not_configured("selection for this window"));
        }
        let reference = self
            .reference()
            .ok_or_else(|| self.not_configured("reference spectrum"))?;
        let sample = self
            .sample(index)
            .ok_or_else(|| self.not_configured("sample spectrum"))?;

        match self.correction {
            Correction::Dark => {
                let dark = self
                    .dark()
                    .ok_or_else(|| self.not_configured("dark spectrum"))?;
                algebra::bias_corrected_ratio(sample, reference, dark)
            }
            Correction::Abba => algebra::ratio(sample, reference),
        }
    }

    /// Percent transmission of one sample, masked to this region's passband.
    pub fn masked_transmission(&self, index: usize) -> Result<Spectrum> {
        let percent = algebra::scale(&self.transmission(index)?, 100.0);
        let mut masked = self.bandpass.apply(&percent);
        masked.metadata.insert("Band", self.band.friendly_name());
        Ok(masked)
    }

    fn not_configured(&self, missing: &'static str) -> PhotometryError {
        PhotometryError::NotConfigured {
            band: self.band,
            missing,
        }
    }
}

impl fmt::Display for SpectralRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (wheel slot {}) [{:.0}-{:.0} nm, ±{:.0} nm {}], t = {} s, {} averages, measure = {}",
            self.band.friendly_name(),
            self.band.wheel_position(),
            self.cutoff_low(),
            self.cutoff_high(),
            self.transition_width(),
            self.bandpass.shape,
            self.integration_time,
            self.number_of_averages,
            self.should_measure
        )
    }
}

/// Build the ordered regions of a measurement mode.
pub fn setup_regions(
    mode: MeasurementMode,
    slots: usize,
    max_integration_time: f64,
    transition_width: f64,
    shape: EdgeShape,
    correction: Correction,
) -> Vec<SpectralRegion> {
    mode.layout()
        .into_iter()
        .map(|(band, low, high)| {
            SpectralRegion::new(
                band,
                Bandpass::new(low, high, transition_width, shape),
                correction,
                slots,
                max_integration_time,
            )
        })
        .collect()
}

/// Gate every region against the output window `[lower, upper]`.
pub fn gate_regions(regions: &mut [SpectralRegion], lower: f64, upper: f64) {
    for region in regions.iter_mut() {
        region.gate(lower, upper);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grid() -> Vec<f64> {
        (0..=400).map(|i| 300.0 + i as f64).collect()
    }

    fn region(band: FilterBand, low: f64, high: f64) -> SpectralRegion {
        SpectralRegion::new(
            band,
            Bandpass::new(low, high, 10.0, EdgeShape::Cubic),
            Correction::Dark,
            2,
            1.0,
        )
    }

    #[test]
    fn layouts_are_ordered_and_share_cutoffs() {
        for mode in [
            MeasurementMode::SinglePass,
            MeasurementMode::TwoPass,
            MeasurementMode::ThreePass,
            MeasurementMode::FourPass,
            MeasurementMode::FivePass,
        ] {
            let layout = mode.layout();
            assert_eq!(layout.first().map(|l| l.1), Some(100.0));
            assert_eq!(layout.last().map(|l| l.2), Some(2000.0));
            for pair in layout.windows(2) {
                assert_eq!(pair[0].2, pair[1].1);
            }
        }
        assert_eq!(MeasurementMode::try_from(4), Ok(MeasurementMode::FourPass));
        assert!(MeasurementMode::try_from(0).is_err());
    }

    #[test]
    fn band_names_round_trip() {
        for band in FilterBand::ALL {
            assert_eq!(band.to_string().parse::<FilterBand>(), Ok(band));
        }
        assert_eq!(FilterBand::Nir.wheel_position(), 5);
        let err = "ultraviolet".parse::<FilterBand>().unwrap_err();
        assert!(err.ends_with("violet, blue, yellow, red, nir, open"), "{err}");
    }

    #[test]
    fn display_names_wheel_slot() {
        let r = region(FilterBand::Yellow, 545.0, 685.0);
        assert!(r.to_string().starts_with("Filter C (Yellow) (wheel slot 3) [545-685 nm"));
    }

    #[test]
    fn gating_follows_window_overlap() {
        let mut r = region(FilterBand::Blue, 464.0, 545.0);
        r.gate(400.0, 1000.0);
        assert!(r.should_measure);
        r.gate(556.0, 1000.0);
        assert!(!r.should_measure);
        r.gate(555.0, 1000.0);
        assert!(r.should_measure);
        r.gate(300.0, 453.0);
        assert!(!r.should_measure);
        r.gate(300.0, 454.0);
        assert!(r.should_measure);
    }

    #[test]
    fn integration_time_is_clamped() {
        let mut r = region(FilterBand::Red, 685.0, 2000.0);
        r.set_integration_time(3.5);
        assert_eq!(r.integration_time, 1.0);
        r.set_integration_time(0.25);
        assert_eq!(r.integration_time, 0.25);
    }

    #[test]
    fn masked_transmission_is_percent_and_zero_outside_support() {
        let mut r = region(FilterBand::Blue, 464.0, 545.0);
        r.set_reference(Spectrum::constant(grid(), 210.0).unwrap());
        r.set_dark(Spectrum::constant(grid(), 10.0).unwrap());
        r.set_raw_sample(0, Spectrum::constant(grid(), 110.0).unwrap()).unwrap();
        assert_eq!(r.slot_count(), 2);
        assert_eq!(r.sample(0).map(|s| s.signal[0]), Some(110.0));
        assert_eq!(r.sample(1), None);

        let t = r.masked_transmission(0).unwrap();
        for (lambda, v) in t.points() {
            if lambda < 454.0 || lambda > 555.0 {
                assert_eq!(v, 0.0, "at {lambda}");
            } else if (474.0..=535.0).contains(&lambda) {
                assert_eq!(v, 50.0, "at {lambda}");
            }
        }
        assert_eq!(t.metadata.get("Band"), Some("Filter B (Blue)"));
    }

    #[test]
    fn missing_configuration_is_reported() {
        let mut r = region(FilterBand::Violet, 100.0, 464.0);
        assert_eq!(
            r.masked_transmission(5).unwrap_err(),
            PhotometryError::IndexOutOfRange { index: 5, len: 2 }
        );
        assert!(matches!(
            r.masked_transmission(0),
            Err(PhotometryError::NotConfigured { missing: "reference spectrum", .. })
        ));

        r.set_reference(Spectrum::constant(grid(), 2.0).unwrap());
        r.set_raw_sample(0, Spectrum::constant(grid(), 1.0).unwrap()).unwrap();
        assert!(matches!(
            r.masked_transmission(0),
            Err(PhotometryError::NotConfigured { missing: "dark spectrum", .. })
        ));
        assert!(matches!(
            r.masked_transmission(1),
            Err(PhotometryError::NotConfigured { missing: "sample spectrum", .. })
        ));

        r.set_dark(Spectrum::constant(grid(), 0.0).unwrap());
        r.should_measure = false;
        assert!(matches!(
            r.masked_transmission(0),
            Err(PhotometryError::NotConfigured { .. })
        ));
        assert!(r.set_raw_sample(2, Spectrum::constant(grid(), 1.0).unwrap()).is_err());
    }

    #[test]
    fn abba_region_needs_no_dark() {
        let mut r = SpectralRegion::new(
            FilterBand::OpenPort,
            Bandpass::new(100.0, 2000.0, 10.0, EdgeShape::Step),
            Correction::Abba,
            1,
            1.0,
        );
        let flat = |v| Spectrum::constant(grid(), v).unwrap();
        r.set_abba_reference(&AbbaSequence::new(flat(101.0), flat(1.0), flat(3.0), flat(103.0)))
            .unwrap();
        r.set_abba_sample(0, &AbbaSequence::new(flat(26.0), flat(1.0), flat(3.0), flat(28.0)))
            .unwrap();
        assert_eq!(r.dark(), None);
        assert_eq!(r.reference().map(|s| s.signal[0]), Some(100.0));

        let t = r.masked_transmission(0).unwrap();
        assert!(t.signal.iter().all(|&v| (v - 25.0).abs() < 1e-12));
    }
}
