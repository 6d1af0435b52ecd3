//! Model fitting of extracted EPSCaT waveforms.
//!
//! Purpose
//! -------
//! Fit the compound exponential-rise / multi-decay model to column 0 of a
//! [`Signal`] and return a new signal carrying the fitted curves, together
//! with a [`FitReport`] of coefficients, R² and integrals.
//!
//! Key behaviors
//! -------------
//! - An optional fit window `[begin, end)` restricts the fitted samples; the
//!   sample at `end` is excluded (`index_of(end) − 1` is the last one).
//! - Bounds are mapped through [`ParamBounds`]; a bound pair with
//!   `lower == upper` pins that parameter.
//! - Fitted curves are written back at full signal length with `NaN`
//!   outside the fit window: column 1 is the compound curve and column
//!   `2 + k` is component `k` (for one component it equals column 1).
//! - Solver failures are returned as [`EpscatError::Solver`]; they are never
//!   swallowed.
//! - A free parameter that ends on a bound while the cost still decreases
//!   away from it is reported with [`Diagnostic::StalledAtBound`] and the fit
//!   is marked as not converged.
//!
//! Goodness of fit
//! ---------------
//! `Rsq = [R²_compound, R²_0, R²_1, …]` (component entries only with several
//! components). The compound value is `1 − SS_res/SS_tot` over the fitted
//! samples. Component `k` is scored against the data minus every other
//! fitted component, over the fitted samples at or after its own delay.
//!
//! Annotations
//! -----------
//! The input annotations are preserved; the `Fit` map (coefficients, names,
//! R², convergence, integration) replaces any earlier one and the creation
//! timestamp is refreshed.
use crate::{
    epscat::{
        core::{
            annotations::{
                Annotation, Annotations, KEY_COEFFICIENTS, KEY_COEFFICIENT_NAMES, KEY_CONVERGED,
                KEY_FIT, KEY_INTEGRATION, KEY_RSQ, KEY_STATUS,
            },
            diagnostics::{Diagnostic, Diagnostics},
            params::{CompoundParams, default_coefficient_names},
            signal::{COLUMN_FIT, Signal},
            window::Interval,
        },
        errors::{EpscatError, EpscatResult},
        integrate::{IntegralRecord, IntegrationSpec, component_name, integrate_fit, integration_annotation},
        models::{CompoundModel, FitSamples},
    },
    optimization::{
        lsq_optimizer::{FitOptions, minimize},
        numerical_stability::ParamBounds,
    },
};
use ndarray::{Array1, s};
use serde::Deserialize;
use std::ops::Range;

/// Initial guess: one flat vector (single component) or one per component.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InitialSpec {
    Single(Vec<f64>),
    PerComponent(Vec<Vec<f64>>),
}

impl InitialSpec {
    pub fn to_params(&self) -> EpscatResult<CompoundParams> {
        match self {
            InitialSpec::Single(v) => CompoundParams::from_flat_vecs(std::slice::from_ref(v)),
            InitialSpec::PerComponent(vs) => CompoundParams::from_flat_vecs(vs),
        }
    }
}

/// Lower or upper bounds: one value for every parameter, one flat vector
/// (single component) or one vector per component.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BoundSpec {
    Scalar(f64),
    Single(Vec<f64>),
    PerComponent(Vec<Vec<f64>>),
}

impl BoundSpec {
    /// Expand into one concatenated vector matching `layout`.
    ///
    /// # Errors
    /// - [`EpscatError::BoundLengthMismatch`] when the shape does not match.
    pub fn expand(&self, which: &'static str, layout: &[usize]) -> EpscatResult<Vec<f64>> {
        let lens: Vec<usize> = layout.iter().map(|n| 2 * n + 3).collect();
        let mismatch = |actual: String| EpscatError::BoundLengthMismatch {
            which,
            expected: format!("{lens:?}"),
            actual,
        };
        match self {
            BoundSpec::Scalar(v) => Ok(vec![*v; lens.iter().sum()]),
            BoundSpec::Single(v) => {
                if lens.len() != 1 || v.len() != lens[0] {
                    return Err(mismatch(format!("[{}]", v.len())));
                }
                Ok(v.clone())
            }
            BoundSpec::PerComponent(vs) => {
                let actual: Vec<usize> = vs.iter().map(Vec::len).collect();
                if actual != lens {
                    return Err(mismatch(format!("{actual:?}")));
                }
                Ok(vs.concat())
            }
        }
    }
}

/// Everything the fitter needs besides the signal.
#[derive(Debug, Clone)]
pub struct FitRequest<'a> {
    pub initial: &'a CompoundParams,
    pub lower: &'a BoundSpec,
    pub upper: &'a BoundSpec,
    pub window: Option<Interval>,
    pub integration: Option<&'a IntegrationSpec>,
    /// Names of one component's parameters; generated when absent.
    pub coefficient_names: Option<&'a [String]>,
    pub options: &'a FitOptions,
}

/// Numerical result of one fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub params: CompoundParams,
    pub rsq: Vec<f64>,
    pub integrals: Option<Vec<IntegralRecord>>,
    pub converged: bool,
    pub status: String,
    /// Fitted sample range `[first, last + 1)`.
    pub range: Range<usize>,
}

/// Fit the compound model to `signal` and return the fitted superset signal.
///
/// # Errors
/// - [`EpscatError::BoundLengthMismatch`] / [`EpscatError::InvalidConfig`]
///   for inconsistent bounds or coefficient names.
/// - [`EpscatError::InvalidWindow`] for a malformed fit window.
/// - [`EpscatError::Solver`] for any solver failure, including an initial
///   guess outside its bounds or a window without finite samples.
pub fn fit_epscat(
    signal: &Signal, request: &FitRequest<'_>, diagnostics: &mut Diagnostics,
) -> EpscatResult<(Signal, FitReport)> {
    let layout = request.initial.layout();
    let lower = request.lower.expand("lower", &layout)?;
    let upper = request.upper.expand("upper", &layout)?;
    flag_sign_unconstrained(&layout, &lower, diagnostics);
    let names = coefficient_names(request.coefficient_names, &layout)?;

    let range = fit_range(signal, request.window, diagnostics)?;
    let times = signal.times();
    let data = signal.data();
    let samples = FitSamples::finite(
        &times.slice(s![range.clone()]).to_vec(),
        &data.slice(s![range.clone()]).to_vec(),
    );

    let bounds = ParamBounds::new(Array1::from(lower), Array1::from(upper))?;
    let model = CompoundModel::new(layout, bounds)?;
    let theta0 = model.theta_from_params(request.initial)?;
    let (params, converged, status) = if theta0.is_empty() {
        (request.initial.clone(), true, "All parameters fixed".to_string())
    } else {
        let outcome = minimize(&model, theta0, &samples, request.options)?;
        if !outcome.converged {
            diagnostics.push(Diagnostic::FitNotConverged { status: outcome.status.clone() });
        }
        tracing::debug!(
            cost = outcome.cost,
            iterations = outcome.iterations,
            status = %outcome.status,
            "EPSCaT fit finished"
        );
        let fitted = model.params_from_theta(&outcome.theta_hat)?;
        let stalled = stalled_parameters(&model, &fitted, &samples, outcome.cost);
        if stalled.is_empty() {
            (fitted, outcome.converged, outcome.status)
        } else {
            let flat = fitted.concat();
            let mut held = Vec::with_capacity(stalled.len());
            for &i in &stalled {
                let (component, local) = locate(model.layout(), i);
                let parameter = names[component][local].clone();
                held.push(parameter.clone());
                diagnostics.push(Diagnostic::StalledAtBound { component, parameter, value: flat[i] });
            }
            let status = format!("{}; held at a bound: {}", outcome.status, held.join(", "));
            (fitted, false, status)
        }
    };

    let mut fitted = signal.clone();
    fitted.truncate_to_data();
    let compound = curve(&times, &range, |t| params.eval(t));
    fitted.push_column(COLUMN_FIT, compound.view())?;
    let mut components = Vec::with_capacity(params.n_components());
    for (k, c) in params.components().iter().enumerate() {
        let column = curve(&times, &range, |t| c.eval(t));
        fitted.push_column(component_name(k), column.view())?;
        components.push(column);
    }

    let rsq = r_squared(&data, &compound, &components, &times, &params, &range);
    let integrals = match request.integration {
        Some(spec) => Some(integrate_fit(&fitted, &params, spec, diagnostics)?),
        None => None,
    };

    let mut fit = Annotations::new();
    fit.insert(
        KEY_COEFFICIENTS,
        Annotation::List(params.to_flat_vecs().into_iter().map(Annotation::Floats).collect()),
    );
    fit.insert(
        KEY_COEFFICIENT_NAMES,
        Annotation::List(names.into_iter().map(Annotation::Texts).collect()),
    );
    fit.insert(KEY_RSQ, rsq.clone());
    fit.insert(KEY_CONVERGED, converged);
    fit.insert(KEY_STATUS, status.clone());
    if let Some(records) = &integrals {
        fit.insert(KEY_INTEGRATION, integration_annotation(records));
    }
    fitted.annotations.insert(KEY_FIT, fit);
    fitted.annotations.stamp_now();

    let report = FitReport { params, rsq, integrals, converged, status, range };
    Ok((fitted, report))
}

/// Sample range covered by the fit window, clipped into the signal.
fn fit_range(
    signal: &Signal, window: Option<Interval>, diagnostics: &mut Diagnostics,
) -> EpscatResult<Range<usize>> {
    let n = signal.n_samples();
    let Some(window) = window else {
        return Ok(0..n);
    };
    window.validate("fit")?;
    let requested = window.to_samples(&signal.time_axis());
    let clipped = requested.clip("fit", n)?;
    if clipped.clipped {
        diagnostics.push(Diagnostic::WindowClipped {
            window: "fit",
            requested: (requested.begin, requested.end),
            used: (clipped.range.start, clipped.range.end),
        });
    }
    Ok(clipped.range)
}

// Gradient tolerance relative to `1 + cost`.
const STALL_TOL: f64 = 1e-6;

/// Flat indices of free parameters held on a bound against the data.
fn stalled_parameters(
    model: &CompoundModel, params: &CompoundParams, samples: &FitSamples, cost: f64,
) -> Vec<usize> {
    let grad = model.model_gradient(params, samples);
    model.bounds().stalled_at_bound(params.concat().view(), grad.view(), STALL_TOL * (1.0 + cost))
}

/// `(component, index within component)` of a flat parameter index.
fn locate(layout: &[usize], mut flat: usize) -> (usize, usize) {
    for (component, &n) in layout.iter().enumerate() {
        let len = 2 * n + 3;
        if flat < len {
            return (component, flat);
        }
        flat -= len;
    }
    (layout.len().saturating_sub(1), flat)
}

fn curve(times: &Array1<f64>, range: &Range<usize>, f: impl Fn(f64) -> f64) -> Array1<f64> {
    Array1::from_iter(
        times.iter().enumerate().map(|(i, &t)| if range.contains(&i) { f(t) } else { f64::NAN }),
    )
}

fn coefficient_names(given: Option<&[String]>, layout: &[usize]) -> EpscatResult<Vec<Vec<String>>> {
    layout
        .iter()
        .map(|&n| match given {
            Some(names) if names.len() == 2 * n + 3 => Ok(names.to_vec()),
            Some(names) => Err(EpscatError::InvalidConfig {
                key: "Fitting.CoefficientNames",
                reason: format!("{} names for a component with {} parameters", names.len(), 2 * n + 3),
            }),
            None => Ok(default_coefficient_names(n)),
        })
        .collect()
}

/// Flag scale and time-constant lower bounds that admit negative values.
pub fn flag_sign_unconstrained(layout: &[usize], lower: &[f64], diagnostics: &mut Diagnostics) {
    let mut offset = 0;
    for (component, &n) in layout.iter().enumerate() {
        let names = default_coefficient_names(n);
        let mut checked: Vec<usize> = (0..2 * n).collect();
        checked.push(2 * n + 1);
        for i in checked {
            let lo = lower[offset + i];
            if lo < 0.0 {
                diagnostics.push(Diagnostic::SignUnconstrainedBound {
                    component,
                    parameter: names[i].clone(),
                    lower: lo,
                });
            }
        }
        offset += 2 * n + 3;
    }
}

fn r_squared(
    data: &Array1<f64>, compound: &Array1<f64>, components: &[Array1<f64>], times: &Array1<f64>,
    params: &CompoundParams, range: &Range<usize>,
) -> Vec<f64> {
    let valid: Vec<usize> =
        range.clone().filter(|&i| data[i].is_finite() && compound[i].is_finite()).collect();
    let mut rsq = vec![coefficient_of_determination(
        valid.iter().map(|&i| (data[i], compound[i])),
    )];
    if components.len() > 1 {
        for (k, c) in params.components().iter().enumerate() {
            let pairs = valid.iter().filter(|&&i| times[i] >= c.delay).map(|&i| {
                let others: f64 = components
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != k)
                    .map(|(_, col)| col[i])
                    .sum();
                (data[i] - others, components[k][i])
            });
            rsq.push(coefficient_of_determination(pairs));
        }
    }
    rsq
}

/// `1 − SS_res/SS_tot` over `(observed, predicted)` pairs; `NaN` when
/// undefined (fewer than two points or zero variance).
pub fn coefficient_of_determination(pairs: impl Iterator<Item = (f64, f64)>) -> f64 {
    let pairs: Vec<(f64, f64)> = pairs.collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let mean = pairs.iter().map(|p| p.0).sum::<f64>() / pairs.len() as f64;
    let ss_tot: f64 = pairs.iter().map(|p| (p.0 - mean).powi(2)).sum();
    let ss_res: f64 = pairs.iter().map(|p| (p.0 - p.1).powi(2)).sum();
    if ss_tot == 0.0 { f64::NAN } else { 1.0 - ss_res / ss_tot }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epscat::core::annotations::KEY_UNIT;

    const DT: f64 = 0.001;

    fn synthetic(truth: &CompoundParams, n: usize) -> Signal {
        let y = Array1::from_iter((0..n).map(|i| truth.eval(i as f64 * DT)));
        Signal::new("u", y, 0.0, DT, "ΔF/F0").expect("valid")
    }

    fn pinned_shape_bounds() -> (BoundSpec, BoundSpec) {
        // a ∈ [0, 10], d ∈ [1e-3, 1], o = 0, r = 0, x0 = 0.05
        (
            BoundSpec::Single(vec![0.0, 1e-3, 0.0, 0.0, 0.05]),
            BoundSpec::Single(vec![10.0, 1.0, 0.0, 0.0, 0.05]),
        )
    }

    #[test]
    fn bound_spec_expands_scalars_and_checks_shapes() {
        assert_eq!(BoundSpec::Scalar(0.0).expand("lower", &[1, 2]).expect("ok").len(), 12);
        assert!(matches!(
            BoundSpec::Single(vec![0.0; 5]).expand("lower", &[1, 1]),
            Err(EpscatError::BoundLengthMismatch { which: "lower", .. })
        ));
        assert!(BoundSpec::PerComponent(vec![vec![0.0; 5], vec![0.0; 7]]).expand("upper", &[1, 2]).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Fitted columns are NaN outside a strict-subset fit window and finite
    // inside it, and earlier annotations survive the fit.
    //
    // Given
    // -----
    // - Single decay 1.5·exp(−(t−0.05)/0.02), 300 samples at 1 ms.
    // - Fit window [0.04, 0.2): samples 40..200 (sample 200 excluded).
    //
    // Expect
    // ------
    // - Columns: data, fit, EPSCaT_0. NaN outside 40..200, finite inside.
    // - R² ≈ 1 and the `Unit` annotation is still present.
    fn fit_reinserts_curves_inside_window_only() {
        let truth = CompoundParams::from_flat_vecs(&[vec![1.5, 0.02, 0.0, 0.0, 0.05]]).expect("ok");
        let mut sig = synthetic(&truth, 300);
        sig.annotations.insert(KEY_UNIT, "spine");
        let initial = CompoundParams::from_flat_vecs(&[vec![1.0, 0.03, 0.0, 0.0, 0.05]]).expect("ok");
        let (lower, upper) = pinned_shape_bounds();
        let opts = FitOptions::default();
        let req = FitRequest {
            initial: &initial,
            lower: &lower,
            upper: &upper,
            window: Some(Interval { begin: 0.04, end: 0.2 }),
            integration: None,
            coefficient_names: None,
            options: &opts,
        };
        let mut diag = Diagnostics::new();

        let (fitted, report) = fit_epscat(&sig, &req, &mut diag).expect("fit succeeds");

        assert_eq!(fitted.n_columns(), 3);
        assert_eq!(report.range, 40..200);
        for col in 1..3 {
            let c = fitted.column(col).expect("present");
            for i in 0..300 {
                assert_eq!(c[i].is_finite(), (40..200).contains(&i), "column {col}, sample {i}");
            }
        }
        assert!(report.rsq.len() == 1 && report.rsq[0] > 0.999);
        assert!(fitted.annotations.contains_key(KEY_UNIT));
        let fit = fitted.annotations.get(KEY_FIT).and_then(Annotation::as_map).expect("fit map");
        assert!(fit.contains_key(KEY_COEFFICIENTS) && !fit.contains_key(KEY_INTEGRATION));
    }

    #[test]
    // Purpose
    // -------
    // An initial guess outside its bounds surfaces as a solver error.
    fn solver_errors_propagate() {
        let sig = synthetic(
            &CompoundParams::from_flat_vecs(&[vec![1.0, 0.02, 0.0, 0.0, 0.05]]).expect("ok"),
            100,
        );
        let initial = CompoundParams::from_flat_vecs(&[vec![20.0, 0.03, 0.0, 0.0, 0.05]]).expect("ok");
        let (lower, upper) = pinned_shape_bounds();
        let opts = FitOptions::default();
        let req = FitRequest {
            initial: &initial,
            lower: &lower,
            upper: &upper,
            window: None,
            integration: None,
            coefficient_names: None,
            options: &opts,
        };
        let mut diag = Diagnostics::new();
        assert!(matches!(fit_epscat(&sig, &req, &mut diag), Err(EpscatError::Solver(_))));
    }

    #[test]
    // Purpose
    // -------
    // An offset whose starting value sits exactly on its one-sided lower
    // bound is still fitted.
    //
    // Given
    // -----
    // - Truth [a=1, τ=0.05, o=0.3, r=0, x0=0.1], 300 samples at 1 ms.
    // - a, τ, o bounded below by 0 and unbounded above; r and x0 pinned.
    // - Initial offset 0.
    //
    // Expect
    // ------
    // - Fitted offset within 1e-3 of 0.3, R² > 0.999, converged, and no
    //   parameter reported as held on its bound.
    fn offset_starting_on_its_lower_bound_is_recovered() {
        let truth = CompoundParams::from_flat_vecs(&[vec![1.0, 0.05, 0.3, 0.0, 0.1]]).expect("ok");
        let sig = synthetic(&truth, 300);
        let initial = CompoundParams::from_flat_vecs(&[vec![0.8, 0.04, 0.0, 0.0, 0.1]]).expect("ok");
        let lower = BoundSpec::Single(vec![0.0, 0.0, 0.0, 0.0, 0.1]);
        let upper = BoundSpec::Single(vec![f64::INFINITY, f64::INFINITY, f64::INFINITY, 0.0, 0.1]);
        let opts = FitOptions::default();
        let req = FitRequest {
            initial: &initial,
            lower: &lower,
            upper: &upper,
            window: None,
            integration: None,
            coefficient_names: None,
            options: &opts,
        };
        let mut diag = Diagnostics::new();

        let (_, report) = fit_epscat(&sig, &req, &mut diag).expect("fit succeeds");

        let offset = report.params.components()[0].offset;
        assert!((offset - 0.3).abs() < 1e-3, "offset = {offset}");
        assert!(report.rsq[0] > 0.999, "rsq = {:?}", report.rsq);
        assert!(report.converged, "status = {}", report.status);
        assert_eq!(diag.count(|d| matches!(d, Diagnostic::StalledAtBound { .. })), 0);
    }

    #[test]
    // Purpose
    // -------
    // A parameter left on its bound while the residuals pull it inward is
    // detected; one whose gradient is zero there is not.
    //
    // Given
    // -----
    // - Data with offset 0.3; candidate parameters with o = 0 and r = 0,
    //   both on their lower bound 0.
    //
    // Expect
    // ------
    // - Only the offset (flat index 2) is reported, located in component 0.
    fn parameter_held_on_bound_against_the_data_is_detected() {
        let truth = CompoundParams::from_flat_vecs(&[vec![1.0, 0.05, 0.3, 0.0, 0.1]]).expect("ok");
        let sig = synthetic(&truth, 300);
        let samples = FitSamples::finite(&sig.times().to_vec(), &sig.data().to_vec());
        let bounds = ParamBounds::new(Array1::zeros(5), Array1::from_elem(5, f64::INFINITY))
            .expect("valid");
        let model = CompoundModel::new(vec![1], bounds).expect("consistent");
        let stuck = CompoundParams::from_flat_vecs(&[vec![1.0, 0.05, 0.0, 0.0, 0.1]]).expect("ok");

        let stalled = stalled_parameters(&model, &stuck, &samples, 0.0);

        assert_eq!(stalled, vec![2]);
        assert_eq!(locate(&[1], 2), (0, 2));
        assert_eq!(locate(&[1, 2], 6), (1, 1));
        assert!(stalled_parameters(&model, &truth, &samples, 0.0).is_empty());
    }

    #[test]
    // Purpose
    // -------
    // A two-component fit writes one curve column per component, orders R²
    // as [compound, c0, c1] and chains duration integrals through the
    // component delays.
    //
    // Given
    // -----
    // - c0 = 1.0·exp(−(t−0.1)/0.02), c1 = 0.6·exp(−(t−0.2)/0.03); 600
    //   samples at 1 ms; offsets, rises and delays pinned.
    // - Integration duration 0.1.
    //
    // Expect
    // ------
    // - Columns data, fit, EPSCaT_0, EPSCaT_1; three R² values, all ≈ 1.
    // - Integrals CompoundEPSCaT [0.1, 0.2), EPSCaT_0 [0.1, 0.2) and
    //   EPSCaT_1 [0.2, 0.6); EPSCaT_0 matches its closed form.
    fn two_component_fit_orders_columns_rsq_and_integrals() {
        let truth = CompoundParams::from_flat_vecs(&[
            vec![1.0, 0.02, 0.0, 0.0, 0.1],
            vec![0.6, 0.03, 0.0, 0.0, 0.2],
        ])
        .expect("ok");
        let sig = synthetic(&truth, 600);
        let initial = CompoundParams::from_flat_vecs(&[
            vec![0.8, 0.03, 0.0, 0.0, 0.1],
            vec![0.8, 0.04, 0.0, 0.0, 0.2],
        ])
        .expect("ok");
        let lower = BoundSpec::PerComponent(vec![
            vec![0.0, 1e-3, 0.0, 0.0, 0.1],
            vec![0.0, 1e-3, 0.0, 0.0, 0.2],
        ]);
        let upper = BoundSpec::PerComponent(vec![
            vec![10.0, 1.0, 0.0, 0.0, 0.1],
            vec![10.0, 1.0, 0.0, 0.0, 0.2],
        ]);
        let integration = IntegrationSpec::Duration(0.1);
        let opts = FitOptions::default();
        let req = FitRequest {
            initial: &initial,
            lower: &lower,
            upper: &upper,
            window: None,
            integration: Some(&integration),
            coefficient_names: None,
            options: &opts,
        };
        let mut diag = Diagnostics::new();

        let (fitted, report) = fit_epscat(&sig, &req, &mut diag).expect("fit succeeds");

        assert_eq!(fitted.column_names(), ["data", "fit", "EPSCaT_0", "EPSCaT_1"]);
        assert_eq!(report.rsq.len(), 3);
        assert!(report.rsq.iter().all(|&r| r > 0.999), "rsq = {:?}", report.rsq);
        let (a1, d1) = report.params.components()[1].decays[0];
        assert!((a1 - 0.6).abs() < 2e-3 && (d1 - 0.03).abs() < 3e-4, "c1 = ({a1}, {d1})");

        let records = report.integrals.expect("integration requested");
        let spans: Vec<(&str, f64, f64)> =
            records.iter().map(|r| (r.name.as_str(), r.begin, r.end)).collect();
        let close = |a: f64, b: f64| (a - b).abs() < 1e-9;
        assert_eq!(spans.len(), 3);
        assert!(spans[0].0 == "CompoundEPSCaT" && close(spans[0].1, 0.1) && close(spans[0].2, 0.2));
        assert!(spans[1].0 == "EPSCaT_0" && close(spans[1].1, 0.1) && close(spans[1].2, 0.2));
        assert!(spans[2].0 == "EPSCaT_1" && close(spans[2].1, 0.2) && close(spans[2].2, 0.6));

        // Samples 100..200: the sample at 0.2 is excluded.
        let exact = 0.02 * (1.0 - (-0.099f64 / 0.02).exp());
        assert!((records[1].simpson - exact).abs() < 1e-3 * exact, "{} vs {exact}", records[1].simpson);
        assert!((records[0].simpson - records[1].simpson).abs() < 1e-3 * exact);
        assert!(records[2].simpson > 0.0);
    }

    #[test]
    fn negative_scale_bounds_are_flagged() {
        let mut diag = Diagnostics::new();
        flag_sign_unconstrained(&[1], &[-1.0, 0.0, -5.0, 0.0, -1.0], &mut diag);
        // The offset and delay may be negative; only `a_1` is flagged.
        assert_eq!(diag.len(), 1);
        assert!(matches!(
            &diag.items()[0],
            Diagnostic::SignUnconstrainedBound { parameter, .. } if parameter == "a_1"
        ));
    }

    #[test]
    fn r_squared_is_one_for_perfect_prediction() {
        let pairs = [(1.0, 1.0), (2.0, 2.0), (4.0, 4.0)];
        assert_eq!(coefficient_of_determination(pairs.into_iter()), 1.0);
        assert!(coefficient_of_determination([(1.0, 1.0)].into_iter()).is_nan());
    }
}
