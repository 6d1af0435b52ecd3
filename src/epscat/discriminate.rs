//! Success/failure discrimination of EPSCaT components.
//!
//! Purpose
//! -------
//! Decide, per component, whether a transient is distinguishable from noise
//! by comparing a statistic of a peak window against the same statistic of a
//! baseline window, optionally gated by the fit quality.
//!
//! Key behaviors
//! -------------
//! - Statistics, predicate functions and comparators are closed registries
//!   ([`Statistic`], [`PredicateFunc`], [`Comparator`]) parsed from names.
//! - A baseline that starts before the first defined sample is moved forward
//!   with a [`Diagnostic::BaselineClippedForward`]; it is not an error. A
//!   baseline lying entirely before that sample is left empty: its
//!   statistic is `NaN` and the component is a failure.
//! - In 2-D mode the statistic sees the raw `ROI × window` image block; in
//!   1-D mode it sees the extracted waveform over the window.
//! - `success = comparator(predicate(peak, base), threshold)`, then
//!   `success &= R² >= minimum` when a gate and an R² are both present.
//!
//! Invariants & assumptions
//! ------------------------
//! - Both windows satisfy `end > begin`; neither starts before the baseline
//!   start (`peak.begin >= base.begin`, `peak.end >= base.begin`).
//! - Statistics ignore non-finite samples; an empty selection yields `NaN`,
//!   which makes every comparison fail.
use crate::epscat::{
    core::{
        annotations::{
            Annotations, KEY_BASE_VALUE, KEY_DISCR_2D, KEY_DISCRIMINANT_VALUE, KEY_PEAK_VALUE,
            KEY_SUCCESS,
        },
        diagnostics::{Diagnostic, Diagnostics},
        window::SampleWindow,
    },
    errors::{EpscatError, EpscatResult},
};
use ndarray::{ArrayView1, ArrayView2, s};
use serde::Deserialize;
use statrs::statistics::{Data, Median, Statistics};
use std::{ops::Range, str::FromStr};

/// Unary statistic applied to a window's samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Statistic {
    /// Squared Euclidean norm `Σ x²`.
    #[default]
    NormSq,
    Norm,
    Mean,
    Median,
    Max,
    Min,
    Sum,
    /// Population standard deviation.
    Std,
    /// Population variance.
    Var,
}

impl Statistic {
    /// Apply to the finite values of `values`.
    pub fn apply<'a>(&self, values: impl IntoIterator<Item = &'a f64>) -> f64 {
        let v: Vec<f64> = values.into_iter().copied().filter(|x| x.is_finite()).collect();
        if v.is_empty() {
            return f64::NAN;
        }
        match self {
            Statistic::NormSq => v.iter().map(|x| x * x).sum(),
            Statistic::Norm => v.iter().map(|x| x * x).sum::<f64>().sqrt(),
            Statistic::Mean => Statistics::mean(&v),
            Statistic::Median => Data::new(v).median(),
            Statistic::Max => Statistics::max(&v),
            Statistic::Min => Statistics::min(&v),
            Statistic::Sum => v.iter().sum(),
            Statistic::Std => Statistics::population_std_dev(&v),
            Statistic::Var => Statistics::population_variance(&v),
        }
    }
}

impl FromStr for Statistic {
    type Err = EpscatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', ' '], "").as_str() {
            "normsq" | "squarednorm" | "sumsq" => Ok(Statistic::NormSq),
            "norm" => Ok(Statistic::Norm),
            "mean" | "average" => Ok(Statistic::Mean),
            "median" => Ok(Statistic::Median),
            "max" => Ok(Statistic::Max),
            "min" => Ok(Statistic::Min),
            "sum" => Ok(Statistic::Sum),
            "std" => Ok(Statistic::Std),
            "var" => Ok(Statistic::Var),
            _ => Err(EpscatError::UnknownName { kind: "statistic", name: s.to_string() }),
        }
    }
}

/// Combination of the peak and baseline statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum PredicateFunc {
    /// `peak / base`
    #[default]
    Ratio,
    /// `peak − base`
    Difference,
}

impl PredicateFunc {
    pub fn apply(&self, peak: f64, base: f64) -> f64 {
        match self {
            PredicateFunc::Ratio => peak / base,
            PredicateFunc::Difference => peak - base,
        }
    }
}

impl FromStr for PredicateFunc {
    type Err = EpscatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ratio" | "divide" | "/" => Ok(PredicateFunc::Ratio),
            "difference" | "subtract" | "-" => Ok(PredicateFunc::Difference),
            _ => Err(EpscatError::UnknownName { kind: "predicate function", name: s.to_string() }),
        }
    }
}

/// Comparison of the discriminant value against the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Comparator {
    #[default]
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
}

impl Comparator {
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Ge => value >= threshold,
            Comparator::Gt => value > threshold,
            Comparator::Le => value <= threshold,
            Comparator::Lt => value < threshold,
            Comparator::Eq => value == threshold,
        }
    }
}

impl FromStr for Comparator {
    type Err = EpscatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            ">=" | "ge" => Ok(Comparator::Ge),
            ">" | "gt" => Ok(Comparator::Gt),
            "<=" | "le" => Ok(Comparator::Le),
            "<" | "lt" => Ok(Comparator::Lt),
            "==" | "eq" => Ok(Comparator::Eq),
            _ => Err(EpscatError::UnknownName { kind: "comparator", name: s.to_string() }),
        }
    }
}

macro_rules! try_from_string {
    ($($ty:ty),*) => {$(
        impl TryFrom<String> for $ty {
            type Error = EpscatError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    )*};
}

try_from_string!(Statistic, PredicateFunc, Comparator);

/// Decision rule shared by every component of one analysis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionRule {
    pub statistic: Statistic,
    pub predicate_func: PredicateFunc,
    pub comparator: Comparator,
    pub threshold: f64,
    pub minimum_r2: Option<f64>,
}

/// Samples the statistic is taken from.
#[derive(Debug, Clone, Copy)]
pub enum DiscriminationSource<'a> {
    /// Raw indicator image (`space × time`) restricted to `roi`.
    Image { data: ArrayView2<'a, f64>, roi: &'a Range<usize> },
    /// Space-averaged waveform.
    Waveform(ArrayView1<'a, f64>),
}

impl DiscriminationSource<'_> {
    fn n_time(&self) -> usize {
        match self {
            DiscriminationSource::Image { data, .. } => data.ncols(),
            DiscriminationSource::Waveform(w) => w.len(),
        }
    }

    fn statistic(&self, stat: Statistic, window: &Range<usize>) -> f64 {
        match self {
            DiscriminationSource::Image { data, roi } => {
                stat.apply(data.slice(s![(*roi).clone(), window.clone()]).iter())
            }
            DiscriminationSource::Waveform(w) => stat.apply(w.slice(s![window.clone()]).iter()),
        }
    }

    pub fn is_2d(&self) -> bool {
        matches!(self, DiscriminationSource::Image { .. })
    }
}

/// Outcome for one component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discrimination {
    pub success: bool,
    pub base_value: f64,
    pub peak_value: f64,
    pub discriminant_value: f64,
}

/// Windows for one component, in time samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscriminationWindows {
    pub base: SampleWindow,
    pub peak: SampleWindow,
}

/// Discriminate one component.
///
/// `defined_start` is the first sample carrying extracted data; `r2` is the
/// R² associated with this component, if a fit ran.
///
/// # Errors
/// - [`EpscatError::InvalidWindow`] for unordered windows, a peak window
///   preceding the baseline, or windows outside the data.
pub fn discriminate(
    component: usize, windows: &DiscriminationWindows, source: &DiscriminationSource<'_>,
    defined_start: usize, rule: &DecisionRule, r2: Option<f64>, diagnostics: &mut Diagnostics,
) -> EpscatResult<Discrimination> {
    let DiscriminationWindows { mut base, peak } = *windows;
    base.validate("discrimination base")?;
    peak.validate("discrimination peak")?;
    if peak.begin < base.begin || peak.end < base.begin {
        return Err(EpscatError::InvalidWindow {
            name: "discrimination peak",
            begin: peak.begin as f64,
            end: peak.end as f64,
            reason: "peak window precedes the baseline window",
        });
    }

    let start = defined_start as isize;
    if base.begin < start {
        diagnostics.push(Diagnostic::BaselineClippedForward {
            component,
            requested: base.begin.max(0) as usize,
            used: defined_start,
        });
        base.begin = start;
    }

    let n_time = source.n_time();
    let base = if base.end > base.begin {
        Some(base.clip("discrimination base", n_time)?.range)
    } else {
        None
    };
    let peak = peak.clip("discrimination peak", n_time)?.range;

    let base_value = base.map_or(f64::NAN, |b| source.statistic(rule.statistic, &b));
    let peak_value = source.statistic(rule.statistic, &peak);
    let discriminant_value = rule.predicate_func.apply(peak_value, base_value);
    let mut success =
        base_value.is_finite() && rule.comparator.compare(discriminant_value, rule.threshold);
    if let (Some(min), Some(r2)) = (rule.minimum_r2, r2) {
        success &= r2 >= min;
    }
    tracing::debug!(component, base_value, peak_value, discriminant_value, success, "discriminated");
    Ok(Discrimination { success, base_value, peak_value, discriminant_value })
}

/// R² that gates component `k`: the compound value for a single-component
/// model, else entry `k + 1` of `[compound, component₀, component₁, …]`.
pub fn component_r2(rsq: &[f64], n_components: usize, k: usize) -> Option<f64> {
    if n_components == 1 { rsq.first().copied() } else { rsq.get(k + 1).copied() }
}

/// Parallel per-component lists plus the mode flag.
pub fn discrimination_annotations(outcomes: &[Discrimination], two_d: bool) -> Annotations {
    let mut ann = Annotations::new();
    ann.insert(KEY_SUCCESS, outcomes.iter().map(|o| o.success).collect::<Vec<_>>());
    ann.insert(KEY_BASE_VALUE, outcomes.iter().map(|o| o.base_value).collect::<Vec<_>>());
    ann.insert(KEY_PEAK_VALUE, outcomes.iter().map(|o| o.peak_value).collect::<Vec<_>>());
    ann.insert(
        KEY_DISCRIMINANT_VALUE,
        outcomes.iter().map(|o| o.discriminant_value).collect::<Vec<_>>(),
    );
    ann.insert(KEY_DISCR_2D, two_d);
    ann
}
