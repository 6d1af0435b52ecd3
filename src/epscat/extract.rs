//! Waveform extraction: raw line scan → ratiometric EPSCaT signal.
//!
//! Purpose
//! -------
//! Turn the indicator (and optional reference) channel of one line scan into
//! a single-column [`Signal`] holding `ΔF/F0` (no reference) or `ΔF/A`
//! (reference channel `A`).
//!
//! Key behaviors
//! -------------
//! - ROI and baseline windows are validated (`end > begin`) and clipped into
//!   the data with a [`Diagnostic`], never an error, when they protrude.
//! - `F0` is the mean of the indicator over ROI × baseline; `F(t)` is the
//!   ROI mean at each sample from the baseline start onward.
//! - The value at each such sample is `(F(t) − F0) / den(t)` where `den` is
//!   the ROI mean of the reference channel, or the scalar `F0`. Samples
//!   before the baseline start are `NaN`.
//! - Optional dark-current subtraction removes, per channel, the mean over
//!   ROI × dark-current window before anything else is computed.
//! - Optional linear detrending is applied to the ratio, after division.
//!
//! Invariants & assumptions
//! ------------------------
//! - Indicator and reference share shape and calibrations; a shape mismatch
//!   is an error and nothing is reshaped.
//! - The output length equals the time extent of the input and its sampling
//!   period equals the time-axis step.
//!
//! Downstream usage
//! ----------------
//! - The fitter consumes column 0; the discriminator locates the baseline
//!   start as the first defined sample.
use crate::epscat::{
    core::{
        annotations::{KEY_DETRENDED, KEY_EPSCAT, KEY_F0, KEY_F0_RANGE, KEY_ROI_RANGE},
        diagnostics::{Diagnostic, Diagnostics},
        image::LineScan,
        signal::Signal,
        validation::finite_mean,
        window::SampleWindow,
    },
    errors::{EpscatError, EpscatResult},
};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView2, s};
use std::ops::Range;

/// Name given to freshly extracted signals.
pub const EPSCAT_SIGNAL_NAME: &str = "EPSCaT";
/// Units of a signal normalised by resting indicator fluorescence.
pub const UNITS_DF_F0: &str = "ΔF/F0";
/// Units of a signal normalised by a reference channel.
pub const UNITS_DF_A: &str = "ΔF/A";

/// Windows and switches for one extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractOptions {
    /// Spatial window in samples.
    pub roi: SampleWindow,
    /// Baseline (F0) window in time samples.
    pub baseline: SampleWindow,
    /// Dark-current window in time samples.
    pub dark_current: Option<SampleWindow>,
    pub detrend: bool,
}

/// Extract the EPSCaT ratio signal from a line scan.
///
/// # Errors
/// - [`EpscatError::ShapeMismatch`] when the reference shape differs.
/// - [`EpscatError::InvalidWindow`] for unordered windows or windows lying
///   outside the data.
pub fn extract_epscat(
    indicator: &LineScan, reference: Option<&LineScan>, opts: &ExtractOptions,
    diagnostics: &mut Diagnostics,
) -> EpscatResult<Signal> {
    if let Some(r) = reference {
        if r.shape() != indicator.shape() {
            return Err(EpscatError::ShapeMismatch {
                indicator: indicator.shape(),
                reference: r.shape(),
            });
        }
    }
    let (n_space, n_time) = indicator.shape();

    let roi = opts.roi.clip("roi", n_space)?;
    if roi.clipped {
        diagnostics.push(Diagnostic::WindowClipped {
            window: "roi",
            requested: (opts.roi.begin, opts.roi.end),
            used: (roi.range.start, roi.range.end),
        });
    }
    let roi = roi.range;
    let baseline = clip_baseline(&opts.baseline, n_time, diagnostics)?;

    let dark = match opts.dark_current {
        Some(w) => Some(w.clip("dark current", n_time)?.range),
        None => None,
    };
    let ind_dark = dark.clone().map_or(0.0, |d| block_mean(indicator.data(), &roi, &d));
    let ref_dark = match (reference, dark) {
        (Some(r), Some(d)) => block_mean(r.data(), &roi, &d),
        _ => 0.0,
    };

    let f0 = block_mean(indicator.data(), &roi, &baseline) - ind_dark;
    let start = baseline.start;
    let mut values = Array1::from_elem(n_time, f64::NAN);
    for t in start..n_time {
        let f = column_mean(indicator.data(), &roi, t) - ind_dark;
        let den = match reference {
            Some(r) => column_mean(r.data(), &roi, t) - ref_dark,
            None => f0,
        };
        values[t] = (f - f0) / den;
    }
    if opts.detrend {
        if let Some(all) = values.as_slice_mut() {
            detrend_linear(&mut all[start..])?;
        }
    }

    let time = indicator.time();
    let units = if reference.is_some() { UNITS_DF_A } else { UNITS_DF_F0 };
    let mut signal = Signal::new(EPSCAT_SIGNAL_NAME, values, time.origin, time.step, units)?;
    let space = indicator.space();
    let ann = &mut signal.annotations;
    ann.insert(KEY_EPSCAT, true);
    ann.insert(KEY_DETRENDED, opts.detrend);
    ann.insert(KEY_F0, f0);
    ann.insert(KEY_F0_RANGE, vec![time.coordinate(baseline.start), time.coordinate(baseline.end)]);
    ann.insert(KEY_ROI_RANGE, vec![space.coordinate(roi.start), space.coordinate(roi.end)]);
    ann.stamp_now();
    tracing::debug!(f0, start, n_time, detrend = opts.detrend, "extracted EPSCaT waveform");
    Ok(signal)
}

/// Clip the baseline window and report suspicious results.
///
/// A baseline reaching the end of the signal is reported only as
/// [`Diagnostic::BaselineSpansSignal`], whatever its start.
fn clip_baseline(
    window: &SampleWindow, n_time: usize, diagnostics: &mut Diagnostics,
) -> EpscatResult<Range<usize>> {
    let clipped = window.clip("F0", n_time)?;
    let range = clipped.range;
    if window.end >= n_time as isize {
        diagnostics.push(Diagnostic::BaselineSpansSignal { samples: range.len() });
        return Ok(range);
    }
    if clipped.clipped {
        diagnostics.push(Diagnostic::WindowClipped {
            window: "F0",
            requested: (window.begin, window.end),
            used: (range.start, range.end),
        });
    }
    if range.len() == 1 {
        diagnostics.push(Diagnostic::ShortBaseline { samples: 1 });
    }
    Ok(range)
}

fn block_mean(data: ArrayView2<'_, f64>, space: &Range<usize>, time: &Range<usize>) -> f64 {
    finite_mean(data.slice(s![space.clone(), time.clone()]).iter())
}

fn column_mean(data: ArrayView2<'_, f64>, space: &Range<usize>, t: usize) -> f64 {
    finite_mean(data.slice(s![space.clone(), t]).iter())
}

/// Remove the least-squares line through the finite samples, in place.
///
/// Fewer than two finite samples leave the data untouched.
pub fn detrend_linear(values: &mut [f64]) -> EpscatResult<()> {
    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .map(|(i, &v)| (i as f64, v))
        .collect();
    if points.len() < 2 {
        return Ok(());
    }
    let x = DMatrix::from_fn(points.len(), 2, |i, j| if j == 0 { 1.0 } else { points[i].0 });
    let y = DVector::from_iterator(points.len(), points.iter().map(|p| p.1));
    let coef = x.svd(true, true).solve(&y, 1e-12).map_err(|e| EpscatError::Numerical {
        operation: "linear detrend",
        reason: e.to_string(),
    })?;
    let (intercept, slope) = (coef[0], coef[1]);
    for (i, v) in values.iter_mut().enumerate() {
        *v -= intercept + slope * i as f64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epscat::core::axes::AxisCalibration;
    use ndarray::Array2;

    fn scan(data: Array2<f64>) -> LineScan {
        LineScan::new(data, AxisCalibration::index(), AxisCalibration::new(0.0, 0.01).expect("ok"))
            .expect("non-empty")
    }

    fn opts(roi: (isize, isize), baseline: (isize, isize)) -> ExtractOptions {
        ExtractOptions {
            roi: SampleWindow { begin: roi.0, end: roi.1 },
            baseline: SampleWindow { begin: baseline.0, end: baseline.1 },
            dark_current: None,
            detrend: false,
        }
    }

    #[test]
    // Purpose
    // -------
    // Samples before the baseline start are NaN; the ratio uses F0.
    //
    // Given
    // -----
    // - Indicator equal to 2 for t < 5 and 3 afterwards, baseline [2, 5).
    //
    // Expect
    // ------
    // - NaN for t < 2, 0 on the baseline, 0.5 after the step.
    fn ratio_against_resting_fluorescence() {
        let data = Array2::from_shape_fn((4, 10), |(_, t)| if t < 5 { 2.0 } else { 3.0 });
        let mut diag = Diagnostics::new();
        let sig = extract_epscat(&scan(data), None, &opts((0, 4), (2, 5)), &mut diag)
            .expect("valid windows");
        let y = sig.data();

        assert!(y[0].is_nan() && y[1].is_nan());
        assert!(y[2].abs() < 1e-12 && y[4].abs() < 1e-12);
        assert!((y[7] - 0.5).abs() < 1e-12);
        assert_eq!(sig.units, UNITS_DF_F0);
        assert!(diag.is_empty());
    }

    #[test]
    // Purpose
    // -------
    // With a reference channel the denominator is its ROI mean per sample.
    fn ratio_against_reference_channel() {
        let ind = Array2::from_shape_fn((2, 6), |(_, t)| if t < 3 { 1.0 } else { 2.0 });
        let reference = Array2::from_elem((2, 6), 4.0);
        let mut diag = Diagnostics::new();
        let sig = extract_epscat(
            &scan(ind),
            Some(&scan(reference)),
            &opts((0, 2), (0, 3)),
            &mut diag,
        )
        .expect("valid");
        assert!((sig.data()[4] - 0.25).abs() < 1e-12);
        assert_eq!(sig.units, UNITS_DF_A);
    }

    #[test]
    fn reference_shape_mismatch_is_rejected() {
        let mut diag = Diagnostics::new();
        let err = extract_epscat(
            &scan(Array2::ones((2, 6))),
            Some(&scan(Array2::ones((3, 6)))),
            &opts((0, 2), (0, 3)),
            &mut diag,
        );
        assert!(matches!(err, Err(EpscatError::ShapeMismatch { .. })));
    }

    #[test]
    // Purpose
    // -------
    // A protruding ROI is clipped with a diagnostic; a degenerate baseline is
    // reported but accepted.
    fn clipping_and_short_baseline_are_diagnostics() {
        let mut diag = Diagnostics::new();
        extract_epscat(&scan(Array2::ones((3, 8))), None, &opts((-1, 5), (2, 3)), &mut diag)
            .expect("clipped, not rejected");
        assert_eq!(diag.count(|d| matches!(d, Diagnostic::WindowClipped { window: "roi", .. })), 1);
        assert_eq!(diag.count(|d| matches!(d, Diagnostic::ShortBaseline { .. })), 1);
    }

    #[test]
    // Purpose
    // -------
    // Dark current is removed from the indicator before F0 is computed.
    fn dark_current_is_subtracted_first() {
        // Dark level 1 in t < 2, baseline 3 (net 2), response 5 (net 4).
        let data = Array2::from_shape_fn((2, 8), |(_, t)| match t {
            0 | 1 => 1.0,
            2..=4 => 3.0,
            _ => 5.0,
        });
        let mut o = opts((0, 2), (2, 5));
        o.dark_current = Some(SampleWindow { begin: 0, end: 2 });
        let mut diag = Diagnostics::new();
        let sig = extract_epscat(&scan(data), None, &o, &mut diag).expect("valid");
        assert!((sig.data()[6] - 1.0).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Detrending runs on the ratio after division, from the baseline start
    // onward, and leaves F0 computed from the raw indicator.
    //
    // Given
    // -----
    // - Indicator F(t) = 10 + t on every ROI row, baseline [2, 6), so
    //   F0 = 13.5 and the ratio (F − F0)/F0 is an exact line.
    //
    // Expect
    // ------
    // - Without detrending the ratio rises; with it every defined sample is
    //   ≈ 0, samples 0 and 1 stay NaN, and `F0` is still 13.5.
    fn detrend_applies_to_the_ratio_after_division() {
        let data = Array2::from_shape_fn((3, 20), |(_, t)| 10.0 + t as f64);
        let mut o = opts((0, 3), (2, 6));
        let mut diag = Diagnostics::new();

        let raw = extract_epscat(&scan(data.clone()), None, &o, &mut diag).expect("valid");
        assert!((raw.data()[19] - 15.5 / 13.5).abs() < 1e-12);

        o.detrend = true;
        let sig = extract_epscat(&scan(data), None, &o, &mut diag).expect("valid");
        let y = sig.data();
        assert!(y[0].is_nan() && y[1].is_nan());
        assert!(y.iter().skip(2).all(|v| v.abs() < 1e-9), "{y:?}");
        assert_eq!(sig.annotations.get(KEY_F0).and_then(|a| a.as_f64()), Some(13.5));
        assert_eq!(sig.annotations.get(KEY_DETRENDED).and_then(|a| a.as_bool()), Some(true));
    }

    #[test]
    // Purpose
    // -------
    // A baseline running past the end is reported as spanning the signal
    // even when it starts after the first sample.
    fn baseline_reaching_the_end_spans_the_signal() {
        let mut diag = Diagnostics::new();
        extract_epscat(&scan(Array2::ones((2, 120))), None, &opts((0, 2), (10, 500)), &mut diag)
            .expect("clipped, not rejected");
        assert_eq!(diag.items(), &[Diagnostic::BaselineSpansSignal { samples: 110 }]);
    }

    #[test]
    fn detrend_removes_linear_ramp_and_keeps_nan() {
        let mut v = vec![f64::NAN, 1.0, 3.0, 5.0, 7.0];
        detrend_linear(&mut v).expect("solvable");
        assert!(v[0].is_nan());
        assert!(v[1..].iter().all(|x| x.abs() < 1e-9));
    }
}
