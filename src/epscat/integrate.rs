//! Definite integrals of fitted EPSCaT curves (Simpson's rule).
//!
//! Purpose
//! -------
//! Resolve an integration specification against fitted delays into named
//! intervals and integrate the matching fitted-curve columns over them.
//!
//! Resolution rules
//! ----------------
//! - **Duration `d`**: one component → `CompoundEPSCaT` over `[x₀, x₀ + d)`.
//!   Several components → the compound curve over `[x₀⁽⁰⁾, x₀⁽⁰⁾ + d)`, and
//!   component `k` over `[x₀⁽ᵏ⁾, x₀⁽ᵏ⁺¹⁾)` (the last one up to `t_stop`).
//! - **Pair**: the same interval for the compound curve and, with several
//!   components, for every component.
//! - **List of pairs**: exactly `n_components + 1` intervals, compound first.
//!
//! Numerical notes
//! ---------------
//! - Intervals are clipped to `[t_start, t_stop)` and converted to samples
//!   with the half-open convention; the sample at the end bound is excluded.
//! - Non-finite samples are skipped, not zeroed: the composite rule runs over
//!   the remaining `(t, y)` pairs with their actual spacing.
//! - A slice without finite samples integrates to `NaN` and emits
//!   [`Diagnostic::AllNanIntegration`].
use crate::epscat::{
    core::{
        annotations::{Annotation, Annotations},
        diagnostics::{Diagnostic, Diagnostics},
        params::CompoundParams,
        signal::Signal,
        window::Interval,
    },
    errors::{EpscatError, EpscatResult},
};
use serde::Deserialize;

/// Name of the compound-curve integral.
pub const COMPOUND_NAME: &str = "CompoundEPSCaT";

/// Name of the integral of component `k`.
pub fn component_name(k: usize) -> String {
    format!("EPSCaT_{k}")
}

/// How integration intervals are specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IntegrationSpec {
    Duration(f64),
    Pair(Interval),
    Pairs(Vec<Interval>),
}

/// One resolved interval bound to a fitted-curve column.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedInterval {
    pub name: String,
    /// Signal column holding the curve (1 = compound, `2 + k` = component `k`).
    pub column: usize,
    pub interval: Interval,
}

/// One computed integral.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegralRecord {
    pub name: String,
    pub begin: f64,
    pub end: f64,
    pub simpson: f64,
}

impl IntegralRecord {
    fn to_annotations(&self) -> Annotations {
        let mut ann = Annotations::new();
        ann.insert(format!("{}_Interval_begin", self.name), self.begin);
        ann.insert(format!("{}_Interval_end", self.name), self.end);
        ann.insert(format!("{}_Simpson", self.name), self.simpson);
        ann
    }
}

/// Annotation value for a list of integrals (a list of maps).
pub fn integration_annotation(records: &[IntegralRecord]) -> Annotation {
    Annotation::List(records.iter().map(|r| Annotation::Map(r.to_annotations())).collect())
}

impl IntegrationSpec {
    /// Resolve into named intervals for the given fitted parameters.
    ///
    /// # Errors
    /// - [`EpscatError::IntegrationSpecMismatch`] for a list whose length is
    ///   not `n_components + 1`.
    /// - [`EpscatError::InvalidWindow`] for non-positive durations or
    ///   unordered pairs.
    pub fn resolve(&self, params: &CompoundParams, t_stop: f64) -> EpscatResult<Vec<NamedInterval>> {
        let n = params.n_components();
        let delays = params.delays();
        let compound = |interval| NamedInterval { name: COMPOUND_NAME.to_string(), column: 1, interval };
        let component =
            |k: usize, interval| NamedInterval { name: component_name(k), column: 2 + k, interval };

        match self {
            IntegrationSpec::Duration(d) => {
                let first = Interval::new("integration", delays[0], delays[0] + d)?;
                let mut out = vec![compound(first)];
                if n > 1 {
                    for k in 0..n {
                        let end = delays.get(k + 1).copied().unwrap_or(t_stop);
                        out.push(component(k, Interval { begin: delays[k], end }));
                    }
                }
                Ok(out)
            }
            IntegrationSpec::Pair(w) => {
                w.validate("integration")?;
                let mut out = vec![compound(*w)];
                if n > 1 {
                    out.extend((0..n).map(|k| component(k, *w)));
                }
                Ok(out)
            }
            IntegrationSpec::Pairs(ws) => {
                if ws.len() != n + 1 {
                    return Err(EpscatError::IntegrationSpecMismatch {
                        expected: n + 1,
                        actual: ws.len(),
                    });
                }
                for w in ws {
                    w.validate("integration")?;
                }
                let mut out = vec![compound(ws[0])];
                out.extend(ws[1..].iter().enumerate().map(|(k, w)| component(k, *w)));
                Ok(out)
            }
        }
    }
}

/// Integrate every resolved interval of a fitted signal.
///
/// Component intervals whose end precedes their begin (out-of-order delays)
/// are integrated over an empty slice.
///
/// # Errors
/// - [`EpscatError::NotFitted`] when a referenced curve column is missing.
/// - Errors from [`IntegrationSpec::resolve`].
pub fn integrate_fit(
    signal: &Signal, params: &CompoundParams, spec: &IntegrationSpec,
    diagnostics: &mut Diagnostics,
) -> EpscatResult<Vec<IntegralRecord>> {
    let axis = signal.time_axis();
    let (t_start, t_stop) = (signal.t_start(), signal.t_stop());
    let times = signal.times();
    let mut records = Vec::new();
    for named in spec.resolve(params, t_stop)? {
        let column = signal.column(named.column).ok_or(EpscatError::NotFitted)?;
        let Some(clipped) = named.interval.intersect(t_start, t_stop) else {
            diagnostics.push(Diagnostic::AllNanIntegration { name: named.name.clone() });
            records.push(IntegralRecord {
                name: named.name,
                begin: named.interval.begin,
                end: named.interval.end,
                simpson: f64::NAN,
            });
            continue;
        };
        let n = signal.n_samples() as isize;
        let i0 = axis.index_of(clipped.begin).clamp(0, n) as usize;
        let i1 = axis.index_of(clipped.end).clamp(0, n) as usize;
        let (x, y): (Vec<f64>, Vec<f64>) = (i0..i1.max(i0))
            .filter(|&i| column[i].is_finite())
            .map(|i| (times[i], column[i]))
            .unzip();
        let integral = if x.is_empty() {
            diagnostics.push(Diagnostic::AllNanIntegration { name: named.name.clone() });
            f64::NAN
        } else {
            simpson(&x, &y)
        };
        tracing::debug!(name = %named.name, begin = clipped.begin, end = clipped.end, integral, "integrated");
        records.push(IntegralRecord {
            name: named.name,
            begin: clipped.begin,
            end: clipped.end,
            simpson: integral,
        });
    }
    Ok(records)
}

/// Composite Simpson's rule on possibly non-uniform abscissae.
///
/// One point integrates to 0, two points use the trapezoid. With an odd
/// number of intervals the last one is added with the three-point
/// end correction.
pub fn simpson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    match n {
        0 | 1 => return 0.0,
        2 => return 0.5 * (x[1] - x[0]) * (y[0] + y[1]),
        _ => {}
    }
    let even_end = if (n - 1) % 2 == 0 { n } else { n - 1 };
    let mut total = 0.0;
    let mut i = 0;
    while i + 2 < even_end {
        let h0 = x[i + 1] - x[i];
        let h1 = x[i + 2] - x[i + 1];
        let hs = h0 + h1;
        total += hs / 6.0
            * ((2.0 - h1 / h0) * y[i] + hs * hs / (h0 * h1) * y[i + 1] + (2.0 - h0 / h1) * y[i + 2]);
        i += 2;
    }
    if even_end < n {
        let h0 = x[n - 2] - x[n - 3];
        let h1 = x[n - 1] - x[n - 2];
        let alpha = (2.0 * h1 * h1 + 3.0 * h0 * h1) / (6.0 * (h0 + h1));
        let beta = (h1 * h1 + 3.0 * h0 * h1) / (6.0 * h0);
        let eta = h1 * h1 * h1 / (6.0 * h0 * (h0 + h1));
        total += alpha * y[n - 1] + beta * y[n - 2] - eta * y[n - 3];
    }
    total
}
