//! Non-fatal numerical diagnostics.
//!
//! Clipped or suspicious windows, all-NaN integration slices and similar
//! conditions do not stop the analysis. Each one is logged through `tracing`
//! when it is pushed into a caller-owned [`Diagnostics`] sink, so callers can
//! also inspect exactly what was reported for a given call.
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A window protruded from the data and was clipped.
    WindowClipped { window: &'static str, requested: (isize, isize), used: (usize, usize) },
    /// The baseline window runs to the end of the signal; `samples` is its clipped length.
    BaselineSpansSignal { samples: usize },
    /// The baseline window holds a single sample.
    ShortBaseline { samples: usize },
    /// A discrimination baseline started before defined data and was moved forward.
    BaselineClippedForward { component: usize, requested: usize, used: usize },
    /// An integration slice contained no finite samples.
    AllNanIntegration { name: String },
    /// A lower bound allows sign changes for a scale or time constant.
    SignUnconstrainedBound { component: usize, parameter: String, lower: f64 },
    /// Fewer discrimination windows than model components.
    FewerWindowsThanComponents { windows: usize, components: usize },
    /// The solver stopped without reporting convergence.
    FitNotConverged { status: String },
    /// A fitted parameter ended on a bound while the cost still decreased
    /// away from it.
    StalledAtBound { component: usize, parameter: String, value: f64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::WindowClipped { window, requested, used } => write!(
                f,
                "{window} window [{}, {}) clipped to [{}, {})",
                requested.0, requested.1, used.0, used.1
            ),
            Diagnostic::BaselineSpansSignal { samples } => {
                write!(f, "baseline window extends over entire signal ({samples} samples)")
            }
            Diagnostic::ShortBaseline { samples } => {
                write!(f, "baseline window is degenerate ({samples} sample)")
            }
            Diagnostic::BaselineClippedForward { component, requested, used } => write!(
                f,
                "discrimination baseline for EPSCaT {component} starts at {requested}, before defined data; moved to {used}"
            ),
            Diagnostic::AllNanIntegration { name } => {
                write!(f, "integration slice for {name} has no finite samples")
            }
            Diagnostic::SignUnconstrainedBound { component, parameter, lower } => write!(
                f,
                "lower bound {lower} of {parameter} in component {component} allows negative values"
            ),
            Diagnostic::FewerWindowsThanComponents { windows, components } => write!(
                f,
                "only {windows} discrimination window(s) for {components} component(s)"
            ),
            Diagnostic::FitNotConverged { status } => {
                write!(f, "curve fit did not report convergence: {status}")
            }
            Diagnostic::StalledAtBound { component, parameter, value } => write!(
                f,
                "{parameter} in component {component} is held at its bound ({value}) against the data"
            ),
        }
    }
}

/// Caller-owned sink of diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record and log one diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::warn!(%diagnostic, "EPSCaT diagnostic");
        self.items.push(diagnostic);
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of recorded diagnostics matching `pred`.
    pub fn count(&self, pred: impl Fn(&Diagnostic) -> bool) -> usize {
        self.items.iter().filter(|d| pred(d)).count()
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }
}
