use anyhow::{Context, Result, bail};
use chrono::Local;
use log::{debug, info, warn};

use crate::config::RunConfig;
use crate::data::filter::{AcquisitionFilter, abba_sequence, averaged, check_bands};
use crate::data::model::{AcquisitionLog, Spectrum, Target};
use crate::drift::Correction;
use crate::error::PhotometryError;
use crate::instrument::InstrumentTemperature;
use crate::region::{SpectralRegion, gate_regions, setup_regions};
use crate::samples::SampleList;
use crate::stitch::{WavelengthWindow, combine, resample};

// ---------------------------------------------------------------------------
// Run state
// ---------------------------------------------------------------------------

/// The full state of one run, independent of the instrument hardware.
///
/// Acquisition fills the regions first; stitching only reads them afterwards.
pub struct RunState {
    pub config: RunConfig,

    /// Ordered by ascending lower cutoff.
    pub regions: Vec<SpectralRegion>,

    pub samples: SampleList,

    /// Output window, clamped to the instrument range once data is ingested.
    pub window: WavelengthWindow,

    pub temperature: InstrumentTemperature,
}

impl RunState {
    /// Set up regions for `samples` and gate them against the requested window.
    pub fn new(config: RunConfig, samples: SampleList) -> Result<Self> {
        let window = config.window()?;
        let slots = config.slot_count(samples.len());
        let mut regions = setup_regions(
            config.mode,
            slots,
            config.max_integration_time,
            config.transition_width,
            config.edge_shape,
            config.correction,
        );
        for region in regions.iter_mut() {
            region.number_of_averages = config.number_of_averages;
        }

        let mut state = RunState {
            config,
            regions,
            samples,
            window,
            temperature: InstrumentTemperature::Unsupported,
        };
        state.gate_regions();
        Ok(state)
    }

    /// Re-decide which regions take part, from the current window.
    pub fn gate_regions(&mut self) {
        gate_regions(&mut self.regions, self.window.lower, self.window.upper);
        for (i, region) in self.regions.iter().enumerate() {
            info!("spectral region {}: {region}", i + 1);
        }
    }

    /// Slot index of the blocked control, when controls are enabled.
    pub fn blocked_index(&self) -> Option<usize> {
        self.config
            .control_measurements
            .then_some(self.samples.len())
    }

    /// Slot index of the open control, when controls are enabled.
    pub fn open_index(&self) -> Option<usize> {
        self.config
            .control_measurements
            .then_some(self.samples.len() + 1)
    }

    fn slot_of(&self, target: Target) -> Option<usize> {
        match target {
            Target::Sample(i) if i < self.samples.len() => Some(i),
            Target::Blocked => self.blocked_index(),
            Target::Open => self.open_index(),
            _ => None,
        }
    }

    /// Populate every selected region from a run's acquisitions.
    ///
    /// Clamps the window to the instrument range and re-gates first, so
    /// regions outside the usable range are never populated.
    pub fn ingest(&mut self, log: &AcquisitionLog) -> Result<()> {
        let bands: Vec<_> = self.regions.iter().map(|r| r.band).collect();
        check_bands(log, &bands)?;

        if log.is_empty() {
            bail!("run file holds no acquisitions");
        }
        let (min, max) = log
            .wavelength_range()
            .context("acquisitions share no wavelength range")?;
        self.window = self.window.clamp_to(min, max)?;
        self.gate_regions();
        self.temperature = InstrumentTemperature::from_readings(&log.temperatures());

        let mut targets: Vec<Target> = (0..self.samples.len()).map(Target::Sample).collect();
        if self.config.control_measurements {
            targets.extend([Target::Blocked, Target::Open]);
        }
        for a in &log.acquisitions {
            if let Target::Sample(i) = a.target {
                if i >= self.samples.len() {
                    warn!("ignoring {} acquisition for sample {} beyond the sample list", a.band, i + 1);
                }
            }
        }

        let correction = self.config.correction;
        for idx in 0..self.regions.len() {
            if !self.regions[idx].should_measure {
                continue;
            }
            let band = self.regions[idx].band;
            if let Some(t) = log
                .acquisitions
                .iter()
                .filter(|a| a.band == band)
                .find_map(|a| a.integration_time)
            {
                self.regions[idx].set_integration_time(t);
            }

            match correction {
                Correction::Dark => {
                    let reference = averaged(log, &AcquisitionFilter::new(band, Target::Reference))?
                        .with_context(|| format!("no reference acquisition for band {band}"))?;
                    let dark = averaged(log, &AcquisitionFilter::new(band, Target::Dark))?
                        .with_context(|| format!("no dark acquisition for band {band}"))?;
                    self.regions[idx].set_reference(reference);
                    self.regions[idx].set_dark(dark);
                }
                Correction::Abba => {
                    let sequence = abba_sequence(log, band, Target::Reference)?
                        .with_context(|| format!("no ABBA reference sequence for band {band}"))?;
                    self.regions[idx].set_abba_reference(&sequence)?;
                }
            }

            for &target in &targets {
                let Some(slot) = self.slot_of(target) else {
                    continue;
                };
                let stored = match correction {
                    Correction::Dark => averaged(log, &AcquisitionFilter::new(band, target))?
                        .map(|sp| self.regions[idx].set_raw_sample(slot, sp))
                        .transpose()?,
                    Correction::Abba => abba_sequence(log, band, target)?
                        .map(|seq| self.regions[idx].set_abba_sample(slot, &seq))
                        .transpose()?,
                };
                if stored.is_none() {
                    warn!("band {band}: no acquisition for {target}");
                } else {
                    debug!("band {band}: stored {target} in slot {slot}");
                }
            }
        }
        Ok(())
    }

    /// Stitched, resampled percent transmission of one slot.
    ///
    /// `Ok(None)` when no region is selected for the output window.
    pub fn transmission(&self, slot: usize) -> Result<Option<Spectrum>> {
        let Some(combined) = combine(&self.regions, slot)? else {
            return Ok(None);
        };
        let mut spectrum = resample(&combined, &self.window)?;
        spectrum.metadata.clear();
        self.add_run_metadata(&mut spectrum);
        Ok(Some(spectrum))
    }

    /// Transmission of sample `index`, labelled with its name and description.
    pub fn sample_transmission(&self, index: usize) -> Result<Option<Spectrum>> {
        let Some(sample) = self.samples.get(index) else {
            return Err(PhotometryError::IndexOutOfRange {
                index,
                len: self.samples.len(),
            }
            .into());
        };
        Ok(self.transmission(index)?.map(|mut sp| {
            label(&mut sp, &sample.name, &sample.description);
            sp
        }))
    }

    /// Blocked (0 %) and open (100 %) control transmissions, if enabled.
    pub fn control_transmissions(&self) -> Result<Option<(Option<Spectrum>, Option<Spectrum>)>> {
        let (Some(blocked), Some(open)) = (self.blocked_index(), self.open_index()) else {
            return Ok(None);
        };
        let blocked = self.transmission(blocked)?.map(|mut sp| {
            label(&mut sp, "Blocked", "Control sample with 0 % transmission");
            sp
        });
        let open = self.transmission(open)?.map(|mut sp| {
            label(&mut sp, "Open", "Control sample with 100 % transmission");
            sp
        });
        Ok(Some((blocked, open)))
    }

    fn add_run_metadata(&self, spectrum: &mut Spectrum) {
        let now = Local::now();
        let md = &mut spectrum.metadata;
        md.insert("Date", now.format("%Y-%m-%d").to_string());
        md.insert("Time", now.format("%H:%M:%S").to_string());
        md.insert(
            "Application",
            format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        );
        md.insert("MeasurementMode", self.config.mode.friendly_name());
        md.insert("Correction", self.config.correction.to_string());
        md.insert("EdgeShape", self.config.edge_shape.to_string());
        md.insert("TransitionWidth", format!("{} nm", self.config.transition_width));
        md.insert("UserComment", self.config.comment.clone());
        if let Some(log) = self.temperature.log() {
            md.insert("InstrumentTemperature", format!("{:.2} °C", log.average()));
        }
    }
}

/// Put sample name and description ahead of the run records.
fn label(spectrum: &mut Spectrum, name: &str, description: &str) {
    let run = std::mem::take(&mut spectrum.metadata);
    spectrum.metadata.insert("SampleName", name);
    spectrum.metadata.insert("SampleDescription", description);
    for (key, value) in run.iter() {
        spectrum.metadata.insert(key, value);
    }
}
