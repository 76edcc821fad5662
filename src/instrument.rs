//! Optional instrument capabilities.
//!
//! Not every spectrometer reports its temperature. Instead of a stand-in that
//! returns `NaN`, the capability is a variant the caller branches on.

use std::fmt;

/// Running statistics over temperature readings in °C.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureLog {
    first: f64,
    latest: f64,
    min: f64,
    max: f64,
    sum: f64,
    count: usize,
}

impl TemperatureLog {
    pub fn new(reading: f64) -> Self {
        TemperatureLog {
            first: reading,
            latest: reading,
            min: reading,
            max: reading,
            sum: reading,
            count: 1,
        }
    }

    pub fn update(&mut self, reading: f64) {
        self.latest = reading;
        self.min = self.min.min(reading);
        self.max = self.max.max(reading);
        self.sum += reading;
        self.count += 1;
    }

    pub fn first(&self) -> f64 {
        self.first
    }

    pub fn latest(&self) -> f64 {
        self.latest
    }

    pub fn average(&self) -> f64 {
        self.sum / self.count as f64
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl fmt::Display for TemperatureLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "first {:.2} °C, average {:.2} °C, final {:.2} °C ({:.2}-{:.2} °C over {} readings)",
            self.first(),
            self.average(),
            self.latest(),
            self.min(),
            self.max(),
            self.count()
        )
    }
}

/// Temperature capability of the spectrometer used for a run.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InstrumentTemperature {
    /// The instrument has no temperature sensor.
    #[default]
    Unsupported,
    /// Readings recorded during the run.
    Monitored(TemperatureLog),
}

impl InstrumentTemperature {
    /// Build from readings in acquisition order; no readings means unsupported.
    pub fn from_readings(readings: &[f64]) -> Self {
        let mut iter = readings.iter().copied().filter(|t| t.is_finite());
        match iter.next() {
            None => InstrumentTemperature::Unsupported,
            Some(first) => {
                let mut log = TemperatureLog::new(first);
                for t in iter {
                    log.update(t);
                }
                InstrumentTemperature::Monitored(log)
            }
        }
    }

    pub fn log(&self) -> Option<&TemperatureLog> {
        match self {
            InstrumentTemperature::Monitored(log) => Some(log),
            InstrumentTemperature::Unsupported => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_over_readings() {
        let temp = InstrumentTemperature::from_readings(&[24.0, 25.5, f64::NAN, 23.5, 25.0]);
        let log = temp.log().unwrap();
        assert_eq!(log.count(), 4);
        assert_eq!(log.first(), 24.0);
        assert_eq!(log.latest(), 25.0);
        assert_eq!(log.average(), 24.5);
        assert_eq!(log.min(), 23.5);
        assert_eq!(log.max(), 25.5);
        assert_eq!(log.range(), 2.0);
    }

    #[test]
    fn no_readings_means_unsupported() {
        let temp = InstrumentTemperature::from_readings(&[]);
        assert_eq!(temp, InstrumentTemperature::Unsupported);
        assert!(temp.log().is_none());
        assert_eq!(
            InstrumentTemperature::from_readings(&[f64::NAN]),
            InstrumentTemperature::Unsupported
        );
    }

    #[test]
    fn log_line_lists_statistics() {
        let temp = InstrumentTemperature::from_readings(&[20.0, 22.0]);
        assert_eq!(
            temp.log().map(ToString::to_string).as_deref(),
            Some("first 20.00 °C, average 21.00 °C, final 22.00 °C (20.00-22.00 °C over 2 readings)")
        );
    }
}
