//! Analysis configuration record.
//!
//! Purpose
//! -------
//! One typed, validated struct replaces the nested key/value record handed
//! over by the configuration-loading collaborator. Defaults are applied once,
//! at deserialization; consuming code never probes for missing keys.
//!
//! Layout
//! ------
//! Keys follow the external record:
//!
//! ```text
//! Channels        { Indicator, Reference }
//! Intervals       { F0, Fit, Integration, DarkCurrent }
//! Fitting         { Initial, Lower, Upper, CoefficientNames, Fit }
//! Discrimination  { Function, PredicateFunc, Predicate, PredicateValue,
//!                   MinimumR2, Discr_2D, WindowChoice, First,
//!                   BaseWindow, PeakWindow }
//! AmplitudeMethod
//! Roi             { width }
//! Detrend
//! Solver          { LineSearcher, TolGrad, TolCost, MaxIter, LbfgsMem, Verbose }
//! ```
//!
//! Defaults
//! --------
//! - `Channels.Indicator = 0`, no reference channel.
//! - `Fitting.Lower = 0`, `Fitting.Upper = +∞`, `Fitting.Fit = true`.
//! - `Discrimination`: `NormSq`, `Ratio`, `>=`, threshold `1.3`,
//!   `MinimumR2 = 0.5`, 1-D mode, `delays` windows, all windows,
//!   `BaseWindow = PeakWindow = 0.05`.
//! - `AmplitudeMethod = Direct`, `Detrend = false`.
//! - Solver: More–Thuente line search, `TolGrad = 1e-10`, `TolCost = 1e-14`,
//!   `MaxIter = 1000`.
//!
//! Validation
//! ----------
//! [`EpscatConfig::validate`] rejects malformed windows, non-positive
//! durations and inconsistent fitting shapes. Scale and time-constant lower
//! bounds below zero are *reported* as diagnostics, never corrected.
use crate::{
    epscat::{
        amplitude::AmplitudeMethod,
        core::{
            diagnostics::Diagnostics,
            params::CompoundParams,
            validation::validate_positive,
            window::Interval,
        },
        discriminate::{Comparator, DecisionRule, PredicateFunc, Statistic},
        errors::{EpscatError, EpscatResult},
        fit::{BoundSpec, InitialSpec, flag_sign_unconstrained},
        integrate::IntegrationSpec,
        windows::{WindowChoice, WindowPolicy},
    },
    optimization::lsq_optimizer::{DEFAULT_LBFGS_MEM, FitOptions, LineSearcher, Tolerances},
};
use serde::Deserialize;

/// Channel designation: an index or a configured channel name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ChannelRef {
    Index(usize),
    Name(String),
}

impl ChannelRef {
    /// Resolve against the data set's channel names.
    ///
    /// # Errors
    /// - [`EpscatError::UnknownChannel`] for an unknown name.
    pub fn resolve(&self, names: &[String]) -> EpscatResult<usize> {
        match self {
            ChannelRef::Index(i) => Ok(*i),
            ChannelRef::Name(n) => names.iter().position(|c| c == n).ok_or_else(|| {
                EpscatError::UnknownChannel { name: n.clone(), available: names.to_vec() }
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ChannelsConfig {
    pub indicator: ChannelRef,
    pub reference: Option<ChannelRef>,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self { indicator: ChannelRef::Index(0), reference: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct IntervalsConfig {
    #[serde(rename = "F0")]
    pub f0: Option<Interval>,
    pub fit: Option<Interval>,
    pub integration: Option<IntegrationSpec>,
    pub dark_current: Option<Interval>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct FittingConfig {
    pub initial: Option<InitialSpec>,
    pub lower: BoundSpec,
    pub upper: BoundSpec,
    pub coefficient_names: Option<Vec<String>>,
    pub fit: bool,
}

impl Default for FittingConfig {
    fn default() -> Self {
        Self {
            initial: None,
            lower: BoundSpec::Scalar(0.0),
            upper: BoundSpec::Scalar(f64::INFINITY),
            coefficient_names: None,
            fit: true,
        }
    }
}

impl FittingConfig {
    /// Parsed initial parameters.
    ///
    /// # Errors
    /// - [`EpscatError::InvalidConfig`] when `Fitting.Initial` is absent.
    /// - [`EpscatError::InvalidParamLength`] for malformed vectors.
    pub fn initial_params(&self) -> EpscatResult<CompoundParams> {
        self.initial
            .as_ref()
            .ok_or_else(|| EpscatError::InvalidConfig {
                key: "Fitting.Initial",
                reason: "no initial parameters configured".into(),
            })?
            .to_params()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DiscriminationConfig {
    pub function: Statistic,
    pub predicate_func: PredicateFunc,
    pub predicate: Comparator,
    pub predicate_value: f64,
    #[serde(rename = "MinimumR2")]
    pub minimum_r2: Option<f64>,
    #[serde(rename = "Discr_2D")]
    pub discr_2d: bool,
    pub window_choice: WindowChoice,
    pub first: bool,
    pub base_window: f64,
    pub peak_window: f64,
}

impl Default for DiscriminationConfig {
    fn default() -> Self {
        Self {
            function: Statistic::NormSq,
            predicate_func: PredicateFunc::Ratio,
            predicate: Comparator::Ge,
            predicate_value: 1.3,
            minimum_r2: Some(0.5),
            discr_2d: false,
            window_choice: WindowChoice::Delays,
            first: false,
            base_window: 0.05,
            peak_window: 0.05,
        }
    }
}

impl DiscriminationConfig {
    pub fn rule(&self) -> DecisionRule {
        DecisionRule {
            statistic: self.function,
            predicate_func: self.predicate_func,
            comparator: self.predicate,
            threshold: self.predicate_value,
            minimum_r2: self.minimum_r2,
        }
    }

    pub fn policy(&self) -> WindowPolicy {
        WindowPolicy {
            choice: self.window_choice,
            first_only: self.first,
            base_window: self.base_window,
            peak_window: self.peak_window,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoiConfig {
    /// Default ROI width around a landmark, in space-axis units.
    pub width: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct SolverConfig {
    pub line_searcher: LineSearcher,
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
    #[serde(rename = "LbfgsMem")]
    pub lbfgs_mem: Option<usize>,
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            line_searcher: LineSearcher::MoreThuente,
            tol_grad: Some(1e-10),
            tol_cost: Some(1e-14),
            max_iter: Some(1000),
            lbfgs_mem: Some(DEFAULT_LBFGS_MEM),
            verbose: false,
        }
    }
}

impl SolverConfig {
    /// Build validated optimizer options.
    pub fn fit_options(&self) -> EpscatResult<FitOptions> {
        let tols = Tolerances::new(self.tol_grad, self.tol_cost, self.max_iter)?;
        Ok(FitOptions::new(tols, self.line_searcher, self.verbose, self.lbfgs_mem)?)
    }
}

/// Complete analysis configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EpscatConfig {
    pub channels: ChannelsConfig,
    pub intervals: IntervalsConfig,
    pub fitting: FittingConfig,
    pub discrimination: DiscriminationConfig,
    pub amplitude_method: AmplitudeMethod,
    pub roi: RoiConfig,
    pub detrend: bool,
    pub solver: SolverConfig,
}

impl EpscatConfig {
    /// Parse and validate a JSON configuration record.
    ///
    /// # Errors
    /// - [`EpscatError::ConfigParse`] for malformed JSON or unknown names.
    /// - Any error from [`EpscatConfig::validate`].
    pub fn from_json_str(json: &str, diagnostics: &mut Diagnostics) -> EpscatResult<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| EpscatError::ConfigParse { reason: e.to_string() })?;
        cfg.validate(diagnostics)?;
        Ok(cfg)
    }

    /// Check windows, durations and fitting shapes.
    pub fn validate(&self, diagnostics: &mut Diagnostics) -> EpscatResult<()> {
        let iv = &self.intervals;
        for (name, w) in [("F0", &iv.f0), ("fit", &iv.fit), ("dark current", &iv.dark_current)] {
            if let Some(w) = w {
                w.validate(name)?;
            }
        }
        let d = &self.discrimination;
        validate_positive("Discrimination.BaseWindow", d.base_window)?;
        validate_positive("Discrimination.PeakWindow", d.peak_window)?;
        if !d.predicate_value.is_finite() {
            return Err(EpscatError::InvalidConfig {
                key: "Discrimination.PredicateValue",
                reason: format!("{} is not finite", d.predicate_value),
            });
        }
        if let Some(w) = self.roi.width {
            validate_positive("Roi.width", w)?;
        }
        self.solver.fit_options()?;

        if let Some(initial) = &self.fitting.initial {
            let params = initial.to_params()?;
            let layout = params.layout();
            let lower = self.fitting.lower.expand("lower", &layout)?;
            self.fitting.upper.expand("upper", &layout)?;
            if let Some(names) = &self.fitting.coefficient_names {
                if layout.iter().any(|&n| 2 * n + 3 != names.len()) {
                    return Err(EpscatError::InvalidConfig {
                        key: "Fitting.CoefficientNames",
                        reason: format!("{} names do not match the component layout {layout:?}", names.len()),
                    });
                }
            }
            if let Some(IntegrationSpec::Pairs(ws)) = &iv.integration {
                if ws.len() != layout.len() + 1 {
                    return Err(EpscatError::IntegrationSpecMismatch {
                        expected: layout.len() + 1,
                        actual: ws.len(),
                    });
                }
            }
            flag_sign_unconstrained(&layout, &lower, diagnostics);
        } else if self.fitting.fit {
            return Err(EpscatError::InvalidConfig {
                key: "Fitting.Initial",
                reason: "fitting is enabled but no initial parameters are configured".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epscat::core::diagnostics::Diagnostic;

    const FULL: &str = r#"{
        "Channels": { "Indicator": "Fluo-4", "Reference": 1 },
        "Intervals": { "F0": [0.0, 0.09], "Fit": [0.05, 0.8], "Integration": 0.2 },
        "Fitting": {
            "Initial": [[1.0, 0.05, 0.0, 0.002, 0.1], [1.0, 0.05, 0.0, 0.002, 0.3]],
            "Lower": 0.0,
            "Upper": [[10, 1, 1, 0.1, 0.2], [10, 1, 1, 0.1, 0.5]]
        },
        "Discrimination": { "Function": "mean", "Predicate": ">", "Discr_2D": true, "First": true },
        "AmplitudeMethod": "LevelCrossing",
        "Roi": { "width": 1.5 },
        "Solver": { "LineSearcher": "HagerZhang" }
    }"#;

    #[test]
    // Purpose
    // -------
    // A complete record parses with names resolved into registries and
    // defaults filled for absent keys.
    fn parses_full_record_with_defaults() {
        let mut diag = Diagnostics::new();
        let cfg = EpscatConfig::from_json_str(FULL, &mut diag).expect("valid config");

        assert_eq!(cfg.channels.indicator, ChannelRef::Name("Fluo-4".into()));
        assert_eq!(cfg.channels.reference, Some(ChannelRef::Index(1)));
        assert_eq!(cfg.intervals.integration, Some(IntegrationSpec::Duration(0.2)));
        assert_eq!(cfg.discrimination.function, Statistic::Mean);
        assert_eq!(cfg.discrimination.predicate, Comparator::Gt);
        assert_eq!(cfg.discrimination.predicate_value, 1.3);
        assert_eq!(cfg.discrimination.minimum_r2, Some(0.5));
        assert!(cfg.discrimination.discr_2d && cfg.discrimination.first);
        assert_eq!(cfg.amplitude_method, AmplitudeMethod::LevelCrossing);
        assert_eq!(cfg.solver.line_searcher, LineSearcher::HagerZhang);
        assert_eq!(cfg.fitting.initial_params().expect("two components").n_components(), 2);
        assert!(diag.is_empty());
    }

    #[test]
    fn unknown_registry_names_fail_to_parse() {
        let mut diag = Diagnostics::new();
        let err = EpscatConfig::from_json_str(
            r#"{ "Fitting": { "Fit": false }, "Discrimination": { "Function": "__import__" } }"#,
            &mut diag,
        );
        assert!(matches!(err, Err(EpscatError::ConfigParse { .. })));
    }

    #[test]
    // Purpose
    // -------
    // Shape errors are rejected; negative scale bounds are only reported.
    fn validation_rejects_shapes_and_flags_signs() {
        let mut diag = Diagnostics::new();
        let bad = r#"{ "Fitting": { "Initial": [1, 0.05, 0, 0, 0.1], "Upper": [1, 2, 3] } }"#;
        assert!(matches!(
            EpscatConfig::from_json_str(bad, &mut diag),
            Err(EpscatError::BoundLengthMismatch { which: "upper", .. })
        ));

        let signed = r#"{ "Fitting": { "Initial": [1, 0.05, 0, 0, 0.1], "Lower": -1 } }"#;
        EpscatConfig::from_json_str(signed, &mut diag).expect("accepted");
        assert_eq!(diag.count(|d| matches!(d, Diagnostic::SignUnconstrainedBound { .. })), 3);

        let missing = r#"{ "Fitting": { "Fit": true } }"#;
        assert!(matches!(
            EpscatConfig::from_json_str(missing, &mut diag),
            Err(EpscatError::InvalidConfig { key: "Fitting.Initial", .. })
        ));
    }

    #[test]
    fn channel_names_resolve_against_data_set() {
        let names = vec!["Alexa".to_string(), "Fluo-4".to_string()];
        assert_eq!(ChannelRef::Name("Fluo-4".into()).resolve(&names), Ok(1));
        assert!(matches!(
            ChannelRef::Name("GCaMP".into()).resolve(&names),
            Err(EpscatError::UnknownChannel { .. })
        ));
    }
}
