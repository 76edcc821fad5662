use anyhow::{Context, Result, bail};

use super::model::{Acquisition, AcquisitionLog, Spectrum, Target};
use crate::algebra;
use crate::drift::{AbbaSequence, Phase};
use crate::region::FilterBand;

// ---------------------------------------------------------------------------
// Acquisition predicates
// ---------------------------------------------------------------------------

/// Selects acquisitions by band, target and ABBA phase.
///
/// `phase: None` selects plain acquisitions only, `Some(p)` only phase `p`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionFilter {
    pub band: FilterBand,
    pub target: Target,
    pub phase: Option<Phase>,
}

impl AcquisitionFilter {
    pub fn new(band: FilterBand, target: Target) -> Self {
        AcquisitionFilter {
            band,
            target,
            phase: None,
        }
    }

    pub fn with_phase(self, phase: Phase) -> Self {
        AcquisitionFilter {
            phase: Some(phase),
            ..self
        }
    }

    pub fn matches(&self, acquisition: &Acquisition) -> bool {
        acquisition.band == self.band
            && acquisition.target == self.target
            && acquisition.phase == self.phase
    }
}

/// Return indices of acquisitions that pass the filter, in acquisition order.
pub fn filtered_indices(log: &AcquisitionLog, filter: &AcquisitionFilter) -> Vec<usize> {
    log.acquisitions
        .iter()
        .enumerate()
        .filter(|(_, a)| filter.matches(a))
        .map(|(i, _)| i)
        .collect()
}

/// Mean of all matching acquisitions, `None` when nothing matches.
///
/// Repeated acquisitions of the same target are the scans being averaged.
pub fn averaged(log: &AcquisitionLog, filter: &AcquisitionFilter) -> Result<Option<Spectrum>> {
    let matching: Vec<&Spectrum> = filtered_indices(log, filter)
        .into_iter()
        .map(|i| &log.acquisitions[i].spectrum)
        .collect();
    if matching.is_empty() {
        return Ok(None);
    }
    let mut mean = algebra::average(&matching)
        .with_context(|| format!("averaging {} {} acquisitions", filter.band, filter.target))?;
    mean.metadata = matching[0].metadata.clone();
    Ok(Some(mean))
}

/// Assemble the ABBA sequence of a band/target, `None` when no phase was
/// acquired at all. A partial sequence is an error.
pub fn abba_sequence(
    log: &AcquisitionLog,
    band: FilterBand,
    target: Target,
) -> Result<Option<AbbaSequence>> {
    let base = AcquisitionFilter::new(band, target);
    let mut phases = Vec::with_capacity(4);
    for phase in [Phase::A1, Phase::B1, Phase::B2, Phase::A2] {
        phases.push(averaged(log, &base.with_phase(phase))?);
    }
    if phases.iter().all(Option::is_none) {
        return Ok(None);
    }
    let mut phases = phases.into_iter();
    let mut next = |name: &str| -> Result<Spectrum> {
        phases
            .next()
            .flatten()
            .with_context(|| format!("{band} {target}: ABBA phase {name} missing"))
    };
    let signal_1 = next("A1")?;
    let dark_1 = next("B1")?;
    let dark_2 = next("B2")?;
    let signal_2 = next("A2")?;
    Ok(Some(AbbaSequence::new(signal_1, dark_1, dark_2, signal_2)))
}

/// Fail when the log holds acquisitions for bands outside `bands`.
pub fn check_bands(log: &AcquisitionLog, bands: &[FilterBand]) -> Result<()> {
    let unknown: Vec<String> = log
        .bands()
        .into_iter()
        .filter(|b| !bands.contains(b))
        .map(|b| b.to_string())
        .collect();
    if !unknown.is_empty() {
        bail!(
            "acquisitions for bands not used by this measurement mode: {}",
            unknown.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn acquisition(band: FilterBand, target: Target, phase: Option<Phase>, value: f64) -> Acquisition {
        Acquisition {
            band,
            target,
            phase,
            temperature: None,
            integration_time: None,
            spectrum: Spectrum::constant(vec![400.0, 500.0], value).unwrap(),
        }
    }

    fn log() -> AcquisitionLog {
        use FilterBand::*;
        AcquisitionLog::new(vec![
            acquisition(Violet, Target::Reference, None, 100.0),
            acquisition(Violet, Target::Reference, None, 102.0),
            acquisition(Violet, Target::Dark, None, 2.0),
            acquisition(OpenPort, Target::Sample(0), Some(Phase::A1), 10.0),
            acquisition(OpenPort, Target::Sample(0), Some(Phase::B1), 2.0),
            acquisition(OpenPort, Target::Sample(0), Some(Phase::B2), 4.0),
            acquisition(OpenPort, Target::Sample(0), Some(Phase::A2), 12.0),
            acquisition(OpenPort, Target::Sample(1), Some(Phase::A1), 10.0),
        ])
    }

    #[test]
    fn filters_by_band_target_and_phase() {
        let log = log();
        let f = AcquisitionFilter::new(FilterBand::Violet, Target::Reference);
        assert_eq!(filtered_indices(&log, &f), vec![0, 1]);
        let f = AcquisitionFilter::new(FilterBand::OpenPort, Target::Sample(0));
        assert_eq!(filtered_indices(&log, &f), Vec::<usize>::new());
        assert_eq!(filtered_indices(&log, &f.with_phase(Phase::B2)), vec![5]);
    }

    #[test]
    fn repeated_acquisitions_are_averaged() {
        let log = log();
        let f = AcquisitionFilter::new(FilterBand::Violet, Target::Reference);
        let mean = averaged(&log, &f).unwrap().unwrap();
        assert_eq!(mean.signal, vec![101.0, 101.0]);
        let none = AcquisitionFilter::new(FilterBand::Red, Target::Dark);
        assert!(averaged(&log, &none).unwrap().is_none());
    }

    #[test]
    fn abba_sequences_are_assembled() {
        let log = log();
        let seq = abba_sequence(&log, FilterBand::OpenPort, Target::Sample(0))
            .unwrap()
            .unwrap();
        assert_eq!(seq.cancel_drift().unwrap().signal, vec![8.0, 8.0]);

        assert!(abba_sequence(&log, FilterBand::OpenPort, Target::Sample(1)).is_err());
        assert!(abba_sequence(&log, FilterBand::Violet, Target::Reference)
            .unwrap()
            .is_none());
    }

    #[test]
    fn unknown_bands_are_reported() {
        let log = log();
        assert!(check_bands(&log, &[FilterBand::Violet, FilterBand::OpenPort]).is_ok());
        assert!(check_bands(&log, &[FilterBand::OpenPort]).is_err());
    }
}
