//! Elementwise arithmetic over spectra sharing one wavelength grid.
//!
//! Every operand must sit on the identical grid; nothing here resamples.
//! Results carry no metadata, merging records is left to the caller.

use crate::data::model::Spectrum;
use crate::error::{PhotometryError, Result};

fn check_grid(a: &Spectrum, b: &Spectrum) -> Result<()> {
    if a.same_grid(b) {
        Ok(())
    } else {
        Err(PhotometryError::GridMismatch {
            left: a.len(),
            right: b.len(),
        })
    }
}

fn zip_with(a: &Spectrum, b: &Spectrum, op: impl Fn(f64, f64) -> f64) -> Result<Spectrum> {
    check_grid(a, b)?;
    let signal = a
        .signal
        .iter()
        .zip(b.signal.iter())
        .map(|(&x, &y)| op(x, y))
        .collect();
    Ok(a.with_signal(signal))
}

/// Elementwise sum of all spectra.
pub fn add(spectra: &[&Spectrum]) -> Result<Spectrum> {
    let (first, rest) = spectra.split_first().ok_or(PhotometryError::EmptyOperands)?;
    let mut signal = first.signal.clone();
    for sp in rest {
        check_grid(first, sp)?;
        for (acc, v) in signal.iter_mut().zip(sp.signal.iter()) {
            *acc += v;
        }
    }
    Ok(first.with_signal(signal))
}

/// Elementwise `a - b`.
pub fn subtract(a: &Spectrum, b: &Spectrum) -> Result<Spectrum> {
    zip_with(a, b, |x, y| x - y)
}

/// Elementwise arithmetic mean.
pub fn average(spectra: &[&Spectrum]) -> Result<Spectrum> {
    let sum = add(spectra)?;
    Ok(scale(&sum, 1.0 / spectra.len() as f64))
}

/// Elementwise `numerator / denominator`, `NaN` where the denominator is zero.
pub fn ratio(numerator: &Spectrum, denominator: &Spectrum) -> Result<Spectrum> {
    zip_with(numerator, denominator, |n, d| if d == 0.0 { f64::NAN } else { n / d })
}

/// Elementwise multiplication by `factor`.
pub fn scale(spectrum: &Spectrum, factor: f64) -> Spectrum {
    spectrum.with_signal(spectrum.signal.iter().map(|v| v * factor).collect())
}

/// `(sample - dark) / (reference - dark)`.
///
/// The bias is removed from both operands before dividing.
pub fn bias_corrected_ratio(
    sample: &Spectrum,
    reference: &Spectrum,
    dark: &Spectrum,
) -> Result<Spectrum> {
    let signal = subtract(sample, dark)?;
    let reference = subtract(reference, dark)?;
    ratio(&signal, &reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spectrum(signal: &[f64]) -> Spectrum {
        let grid = (0..signal.len()).map(|i| 400.0 + i as f64).collect();
        Spectrum::new(grid, signal.to_vec()).unwrap()
    }

    #[test]
    fn add_subtract_average() {
        let a = spectrum(&[1.0, 2.0, 3.0]);
        let b = spectrum(&[10.0, 20.0, 30.0]);
        let c = spectrum(&[4.0, 5.0, 6.0]);

        assert_eq!(add(&[&a, &b, &c]).unwrap().signal, vec![15.0, 27.0, 39.0]);
        assert_eq!(subtract(&b, &a).unwrap().signal, vec![9.0, 18.0, 27.0]);
        assert_eq!(average(&[&a, &c]).unwrap().signal, vec![2.5, 3.5, 4.5]);
        assert_eq!(scale(&a, 2.0).signal, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn empty_operands_are_rejected() {
        assert_eq!(add(&[]), Err(PhotometryError::EmptyOperands));
        assert_eq!(average(&[]), Err(PhotometryError::EmptyOperands));
    }

    #[test]
    fn grid_mismatch_is_fatal() {
        let a = spectrum(&[1.0, 2.0]);
        let b = Spectrum::new(vec![400.0, 402.0], vec![1.0, 2.0]).unwrap();
        let c = spectrum(&[1.0, 2.0, 3.0]);

        assert!(matches!(subtract(&a, &b), Err(PhotometryError::GridMismatch { .. })));
        assert_eq!(
            add(&[&a, &c]),
            Err(PhotometryError::GridMismatch { left: 2, right: 3 })
        );
    }

    #[test]
    fn ratio_yields_nan_on_zero_denominator() {
        let n = spectrum(&[1.0, 2.0, 0.0]);
        let d = spectrum(&[2.0, 0.0, 0.0]);
        let r = ratio(&n, &d).unwrap();
        assert_eq!(r.signal[0], 0.5);
        assert!(r.signal[1].is_nan());
        assert!(r.signal[2].is_nan());
    }

    #[test]
    fn sample_equal_to_reference_gives_unity() {
        let s = spectrum(&[100.0, 250.0, 3.0, 7.0]);
        let d = spectrum(&[1.0, 50.0, 3.0, 0.5]);
        let r = bias_corrected_ratio(&s, &s, &d).unwrap();
        for (i, v) in r.signal.iter().enumerate() {
            if s.signal[i] != d.signal[i] {
                assert_eq!(*v, 1.0);
            } else {
                assert!(v.is_nan());
            }
        }
    }

    #[test]
    fn bias_is_removed_before_dividing() {
        let s = spectrum(&[60.0]);
        let r = spectrum(&[110.0]);
        let d = spectrum(&[10.0]);
        assert_eq!(bias_corrected_ratio(&s, &r, &d).unwrap().signal, vec![0.5]);
    }
}
