//! Frame/unit orchestration.
//!
//! Purpose
//! -------
//! Drive the complete analysis for one `(frame, unit)` pair and batch it over
//! the units of a frame and the frames of a data set.
//!
//! Key behaviors
//! -------------
//! - [`Analyzer::analyse_unit`] runs, in order: unit resolution, channel
//!   resolution, waveform extraction, the optional fit, discrimination-window
//!   resolution, discrimination, amplitudes and annotation. Any error aborts
//!   the pair and is returned directly.
//! - [`Analyzer::analyse_frame`] and [`Analyzer::analyse_dataset`] collect
//!   per-pair failures into a [`BatchReport`] instead of aborting, then
//!   [`reconcile`] the new results with the frame's existing ones. A result
//!   kept only because its unit failed this time is marked `Stale` and
//!   listed in [`BatchReport::stale`].
//!
//! Invariants & assumptions
//! ------------------------
//! - The discrimination lists hold one entry per evaluated window; with a
//!   model, windows beyond the component count are not evaluated.
//! - `Amplitude` spans `[base.begin, peak.end)` of each window.
//!   `FitAmplitude` is present only when a fit ran.
//! - Reconciliation is idempotent: re-running an unchanged unit set yields
//!   the same results in the same (name-sorted) order.
use crate::{
    epscat::{
        config::EpscatConfig,
        core::{
            annotations::{
                Annotation, KEY_AMPLITUDE, KEY_CHANNELS, KEY_DISCRIMINATION, KEY_FIT_AMPLITUDE,
                KEY_FRAME, KEY_PROTOCOL, KEY_STALE, KEY_UNIT,
            },
            diagnostics::{Diagnostic, Diagnostics},
            image::ChannelSource,
            protocol::HorizontalCursor,
            signal::{COLUMN_FIT, Signal},
            units::{UnitCatalog, UnitSpec},
            validation::validate_channel_pair,
            window::SampleWindow,
        },
        discriminate::{
            DecisionRule, DiscriminationSource, component_r2, discriminate,
            discrimination_annotations,
        },
        errors::{EpscatError, EpscatResult},
        extract::{ExtractOptions, extract_epscat},
        fit::{FitRequest, fit_epscat},
        windows::{WindowPolicy, WindowSources},
    },
    optimization::lsq_optimizer::FitOptions,
};

/// One temporal repeat of a line-scan acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFrame {
    pub source: ChannelSource,
    /// Horizontal cursors placed on this frame.
    pub cursors: Vec<HorizontalCursor>,
    /// Per-unit result signals, sorted by name.
    pub results: Vec<Signal>,
}

impl ScanFrame {
    pub fn new(source: ChannelSource) -> Self {
        Self { source, cursors: Vec::new(), results: Vec::new() }
    }
}

/// A line-scan data set: frames plus the bookkeeping shared by all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanData {
    pub frames: Vec<ScanFrame>,
    /// Names of the channels, in index order.
    pub channel_names: Vec<String>,
    pub catalog: UnitCatalog,
}

/// Explicit indicator/reference indices overriding the configured channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelChoice {
    pub indicator: usize,
    pub reference: Option<usize>,
}

/// A `(frame, unit)` pair that could not be analysed.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    pub frame: usize,
    pub unit: String,
    pub error: EpscatError,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// `(frame, unit name)` of every pair that produced a result.
    pub analysed: Vec<(usize, String)>,
    pub failures: Vec<UnitFailure>,
    /// `(frame, unit name)` of earlier results kept because re-analysis failed.
    pub stale: Vec<(usize, String)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn extend(&mut self, other: BatchReport) {
        self.analysed.extend(other.analysed);
        self.failures.extend(other.failures);
        self.stale.extend(other.stale);
    }
}

/// Analysis driver built once per configuration.
#[derive(Debug, Clone)]
pub struct Analyzer<'a> {
    config: &'a EpscatConfig,
    options: FitOptions,
    rule: DecisionRule,
    policy: WindowPolicy,
}

impl<'a> Analyzer<'a> {
    /// # Errors
    /// - Any error from [`EpscatConfig::validate`] or from building the
    ///   solver options.
    pub fn new(config: &'a EpscatConfig, diagnostics: &mut Diagnostics) -> EpscatResult<Self> {
        config.validate(diagnostics)?;
        Ok(Self {
            config,
            options: config.solver.fit_options()?,
            rule: config.discrimination.rule(),
            policy: config.discrimination.policy(),
        })
    }

    /// Indicator and reference indices for `data`, from `explicit` when
    /// given, else from the configured channel designations.
    ///
    /// # Errors
    /// - [`EpscatError::UnknownChannel`] for an unknown configured name.
    /// - [`EpscatError::ChannelOutOfRange`] / [`EpscatError::IdenticalChannels`].
    pub fn resolve_channels(
        &self, data: &ScanData, source: &ChannelSource, explicit: Option<ChannelChoice>,
    ) -> EpscatResult<ChannelChoice> {
        let choice = match explicit {
            Some(c) => c,
            None => {
                let ch = &self.config.channels;
                ChannelChoice {
                    indicator: ch.indicator.resolve(&data.channel_names)?,
                    reference: ch
                        .reference
                        .as_ref()
                        .map(|r| r.resolve(&data.channel_names))
                        .transpose()?,
                }
            }
        };
        validate_channel_pair(choice.indicator, choice.reference, source.n_channels())?;
        Ok(choice)
    }

    /// Analyse one unit in one frame and return its annotated result signal.
    ///
    /// The result is the fitted superset signal when fitting is enabled,
    /// else the extracted waveform; its name is the resolved unit name.
    ///
    /// # Errors
    /// Every stage error is returned unchanged; see [`EpscatError`].
    pub fn analyse_unit(
        &self, data: &ScanData, frame: usize, unit: &UnitSpec, channels: Option<ChannelChoice>,
        diagnostics: &mut Diagnostics,
    ) -> EpscatResult<Signal> {
        let scan_frame = data
            .frames
            .get(frame)
            .ok_or(EpscatError::FrameOutOfRange { index: frame, count: data.frames.len() })?;
        let cfg = self.config;

        // ---- ResolveChannels / ResolveUnit ----
        let channels = self.resolve_channels(data, &scan_frame.source, channels)?;
        let indicator = scan_frame.source.channel(channels.indicator)?;
        let reference = channels.reference.map(|r| scan_frame.source.channel(r)).transpose()?;
        let unit = data.catalog.resolve(
            unit,
            frame,
            &indicator.space(),
            indicator.n_space(),
            cfg.roi.width,
        )?;
        tracing::debug!(frame, unit = %unit.name, ?channels, "analysing unit");

        // ---- ExtractWaveform ----
        let time = indicator.time();
        let f0 = cfg.intervals.f0.ok_or_else(|| EpscatError::InvalidConfig {
            key: "Intervals.F0",
            reason: "no baseline window configured".into(),
        })?;
        let opts = ExtractOptions {
            roi: unit.roi,
            baseline: f0.to_samples(&time),
            dark_current: cfg.intervals.dark_current.map(|w| w.to_samples(&time)),
            detrend: cfg.detrend,
        };
        let mut signal = extract_epscat(&indicator, reference.as_ref(), &opts, diagnostics)?;
        signal.name = unit.name.clone();
        let n_time = indicator.n_time();
        let defined_start = opts.baseline.clip("F0", n_time)?.range.start;
        let roi = unit.roi.clip("roi", indicator.n_space())?.range;

        // ---- FitModel ----
        let nominal = cfg.fitting.initial.as_ref().map(|i| i.to_params()).transpose()?;
        let (fitted, params, rsq) = if cfg.fitting.fit {
            let initial = cfg.fitting.initial_params()?;
            let request = FitRequest {
                initial: &initial,
                lower: &cfg.fitting.lower,
                upper: &cfg.fitting.upper,
                window: cfg.intervals.fit,
                integration: cfg.intervals.integration.as_ref(),
                coefficient_names: cfg.fitting.coefficient_names.as_deref(),
                options: &self.options,
            };
            let (fitted, report) = fit_epscat(&signal, &request, diagnostics)?;
            (Some(fitted), Some(report.params), Some(report.rsq))
        } else {
            (None, nominal, None)
        };

        // ---- ComputeDiscriminationWindows ----
        let delays = params.as_ref().map(|p| p.delays());
        let sources = WindowSources {
            protocol: unit.protocol.as_ref(),
            delays: delays.as_deref(),
            cursors: &scan_frame.cursors,
        };
        let mut windows = self.policy.resolve(&sources, &time)?;
        if let Some(p) = &params {
            let components = p.n_components();
            if windows.len() < components {
                diagnostics.push(Diagnostic::FewerWindowsThanComponents {
                    windows: windows.len(),
                    components,
                });
            }
            windows.truncate(components);
        }

        // ---- Discriminate ----
        let waveform = signal.data();
        let source = if cfg.discrimination.discr_2d {
            DiscriminationSource::Image { data: indicator.data(), roi: &roi }
        } else {
            DiscriminationSource::Waveform(waveform.view())
        };
        let n_components = params.as_ref().map_or(windows.len(), |p| p.n_components());
        let outcomes = windows
            .iter()
            .enumerate()
            .map(|(k, w)| {
                let r2 = rsq.as_deref().and_then(|r| component_r2(r, n_components, k));
                discriminate(k, w, &source, defined_start, &self.rule, r2, diagnostics)
            })
            .collect::<EpscatResult<Vec<_>>>()?;

        // ---- ComputeAmplitude ----
        let method = cfg.amplitude_method;
        let spans = windows
            .iter()
            .map(|w| {
                SampleWindow { begin: w.base.begin, end: w.peak.end }
                    .clip("amplitude", n_time)
                    .map(|c| c.range)
            })
            .collect::<EpscatResult<Vec<_>>>()?;
        let amplitude: Vec<f64> =
            spans.iter().map(|r| method.amplitude(waveform.view(), r.clone())).collect();
        let fit_amplitude: Option<Vec<f64>> = fitted.as_ref().and_then(|f| {
            let column = f.column_names().iter().position(|c| c == COLUMN_FIT)?;
            let curve = f.column(column)?;
            Some(spans.iter().map(|r| method.amplitude(curve, r.clone())).collect())
        });

        // ---- Annotate ----
        let mut result = fitted.unwrap_or(signal);
        let ann = &mut result.annotations;
        ann.insert(KEY_UNIT, unit.name.clone());
        ann.insert(KEY_FRAME, frame);
        if let Some(p) = &unit.protocol {
            ann.insert(KEY_PROTOCOL, p.name.clone());
        }
        let mut channel_list = vec![Annotation::from(channels.indicator)];
        channel_list.extend(channels.reference.map(Annotation::from));
        ann.insert(KEY_CHANNELS, Annotation::List(channel_list));
        ann.insert(
            KEY_DISCRIMINATION,
            discrimination_annotations(&outcomes, cfg.discrimination.discr_2d),
        );
        ann.insert(KEY_AMPLITUDE, amplitude);
        if let Some(fa) = fit_amplitude {
            ann.insert(KEY_FIT_AMPLITUDE, fa);
        }
        ann.stamp_now();
        Ok(result)
    }

    /// Analyse `units` in one frame and reconcile the frame's results.
    ///
    /// # Errors
    /// - [`EpscatError::FrameOutOfRange`] for an invalid frame index. Per-unit
    ///   errors are collected in the report.
    pub fn analyse_frame(
        &self, data: &mut ScanData, frame: usize, units: &[UnitSpec],
        diagnostics: &mut Diagnostics,
    ) -> EpscatResult<BatchReport> {
        let count = data.frames.len();
        if frame >= count {
            return Err(EpscatError::FrameOutOfRange { index: frame, count });
        }
        let mut report = BatchReport::default();
        let mut produced = Vec::with_capacity(units.len());
        let mut attempted = Vec::with_capacity(units.len());
        for unit in units {
            let label = unit.label().to_string();
            match self.analyse_unit(data, frame, unit, None, diagnostics) {
                Ok(signal) => {
                    report.analysed.push((frame, signal.name.clone()));
                    attempted.push(signal.name.clone());
                    produced.push(signal);
                }
                Err(error) => {
                    tracing::error!(frame, unit = %label, %error, "unit analysis failed");
                    attempted.push(label.clone());
                    report.failures.push(UnitFailure { frame, unit: label, error });
                }
            }
        }
        let existing = std::mem::take(&mut data.frames[frame].results);
        let results = reconcile(existing, produced, &attempted);
        for kept in results.iter().filter(|s| is_stale(s)) {
            tracing::warn!(frame, unit = %kept.name, "keeping result from an earlier run");
            report.stale.push((frame, kept.name.clone()));
        }
        data.frames[frame].results = results;
        Ok(report)
    }

    /// Analyse `units` in every frame of `data`.
    pub fn analyse_dataset(
        &self, data: &mut ScanData, units: &[UnitSpec], diagnostics: &mut Diagnostics,
    ) -> EpscatResult<BatchReport> {
        let mut report = BatchReport::default();
        for frame in 0..data.frames.len() {
            report.extend(self.analyse_frame(data, frame, units, diagnostics)?);
        }
        tracing::debug!(
            analysed = report.analysed.len(),
            failed = report.failures.len(),
            "data set analysed"
        );
        Ok(report)
    }
}

/// Merge freshly produced results into a frame's existing ones.
///
/// Same-named results are replaced, new ones appended and the rest dropped,
/// except results of units in `attempted` that failed this time: those keep
/// their previous value and are marked with [`KEY_STALE`]. The output is
/// sorted by name.
pub fn reconcile(existing: Vec<Signal>, produced: Vec<Signal>, attempted: &[String]) -> Vec<Signal> {
    let mut merged: Vec<Signal> = existing
        .into_iter()
        .filter(|old| {
            attempted.contains(&old.name) && !produced.iter().any(|new| new.name == old.name)
        })
        .map(|mut old| {
            old.annotations.insert(KEY_STALE, true);
            old
        })
        .collect();
    for mut signal in produced {
        signal.annotations.remove(KEY_STALE);
        match merged.iter_mut().find(|s| s.name == signal.name) {
            Some(slot) => *slot = signal,
            None => merged.push(signal),
        }
    }
    merged.sort_by(|a, b| a.name.cmp(&b.name));
    merged
}

fn is_stale(signal: &Signal) -> bool {
    signal.annotations.get(KEY_STALE).and_then(Annotation::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epscat::core::{
        annotations::KEY_SUCCESS, axes::AxisCalibration, image::LineScan, params::ComponentParams,
        protocol::TriggerProtocol, units::AnalysisUnit, window::Interval,
    };
    use ndarray::{Array1, Array2};

    const DT: f64 = 0.001;
    const N_TIME: usize = 400;

    fn transient() -> ComponentParams {
        ComponentParams { decays: vec![(1.0, 0.05)], offset: 0.0, rise_tau: 0.002, delay: 0.1 }
    }

    // Given
    // -----
    // - 8 spatial samples, 400 time samples at 1 ms.
    // - Indicator: 100 everywhere plus 50·transient on rows 2..6.
    // - Reference: 50 everywhere, so ΔF/A equals the transient on those rows.
    fn data() -> ScanData {
        let p = transient();
        let ind = Array2::from_shape_fn((8, N_TIME), |(x, t)| {
            let bump = if (2..6).contains(&x) { 50.0 * p.eval(t as f64 * DT) } else { 0.0 };
            100.0 + bump
        });
        let space = AxisCalibration::new(0.0, 1.0).expect("valid");
        let time = AxisCalibration::new(0.0, DT).expect("valid");
        let scans = vec![
            LineScan::new(ind, space, time).expect("2-D"),
            LineScan::new(Array2::from_elem((8, N_TIME), 50.0), space, time).expect("2-D"),
        ];
        let mut protocol = TriggerProtocol::new("single", 0.0, vec![0]);
        protocol.presynaptic = vec![0.1];
        ScanData {
            frames: vec![ScanFrame::new(ChannelSource::Separate(scans))],
            channel_names: vec!["Fluo-4".into(), "Alexa".into()],
            catalog: UnitCatalog {
                units: vec![AnalysisUnit {
                    name: "spine".into(),
                    roi: Interval::new("roi", 2.0, 6.0).expect("ordered"),
                    protocol: None,
                }],
                landmarks: Vec::new(),
                protocols: vec![protocol],
            },
        }
    }

    fn config(window_choice: &str) -> EpscatConfig {
        let json = format!(
            r#"{{
                "Channels": {{ "Indicator": "Fluo-4", "Reference": "Alexa" }},
                "Intervals": {{ "F0": [0.0, 0.09] }},
                "Fitting": {{ "Initial": [1.0, 0.05, 0.0, 0.002, 0.1], "Fit": false }},
                "Discrimination": {{ "WindowChoice": "{window_choice}" }}
            }}"#
        );
        let mut diag = Diagnostics::new();
        EpscatConfig::from_json_str(&json, &mut diag).expect("valid config")
    }

    #[test]
    // Purpose
    // -------
    // Without fitting, nominal delays place the windows; the transient is
    // discriminated as a success and no fit annotations appear.
    fn analyse_unit_without_fit_uses_nominal_delays() {
        let cfg = config("delays");
        let mut diag = Diagnostics::new();
        let analyzer = Analyzer::new(&cfg, &mut diag).expect("valid");
        let result = analyzer
            .analyse_unit(&data(), 0, &UnitSpec::from("spine"), None, &mut diag)
            .expect("analysable");

        assert_eq!(result.name, "spine");
        assert_eq!(result.n_columns(), 1);
        let ann = &result.annotations;
        let discr = ann.get(KEY_DISCRIMINATION).and_then(Annotation::as_map).expect("map");
        assert_eq!(discr.get(KEY_SUCCESS).and_then(Annotation::as_bools), Some(&[true][..]));
        let amp = ann.get(KEY_AMPLITUDE).and_then(Annotation::as_floats).expect("amplitude");
        assert!(amp[0] > 0.5 && amp[0] < 1.0);
        assert!(!ann.contains_key(KEY_FIT_AMPLITUDE));
        assert_eq!(ann.get(KEY_PROTOCOL), Some(&Annotation::Text("single".into())));
    }

    #[test]
    fn explicit_channels_override_and_are_validated() {
        let cfg = config("triggers");
        let mut diag = Diagnostics::new();
        let analyzer = Analyzer::new(&cfg, &mut diag).expect("valid");
        let d = data();
        let same = Some(ChannelChoice { indicator: 1, reference: Some(1) });
        assert!(matches!(
            analyzer.analyse_unit(&d, 0, &UnitSpec::Whole, same, &mut diag),
            Err(EpscatError::IdenticalChannels { index: 1 })
        ));
        let out = Some(ChannelChoice { indicator: 2, reference: None });
        assert!(matches!(
            analyzer.analyse_unit(&d, 0, &UnitSpec::Whole, out, &mut diag),
            Err(EpscatError::ChannelOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    // Purpose
    // -------
    // One failing unit does not abort the frame; the good unit is stored.
    fn analyse_frame_collects_failures() {
        let cfg = config("triggers");
        let mut diag = Diagnostics::new();
        let analyzer = Analyzer::new(&cfg, &mut diag).expect("valid");
        let mut d = data();
        let units = [UnitSpec::from("spine"), UnitSpec::from("nowhere")];

        let report = analyzer.analyse_frame(&mut d, 0, &units, &mut diag).expect("frame exists");
        assert_eq!(report.analysed, vec![(0, "spine".to_string())]);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, EpscatError::UnknownUnit { .. }));
        let names: Vec<&str> = d.frames[0].results.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["spine"]);

        assert!(matches!(
            analyzer.analyse_frame(&mut d, 3, &units, &mut diag),
            Err(EpscatError::FrameOutOfRange { index: 3, count: 1 })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Cursor mode without cursors is a hard error for the unit.
    fn cursor_mode_without_cursors_fails_the_unit() {
        let cfg = config("cursors");
        let mut diag = Diagnostics::new();
        let analyzer = Analyzer::new(&cfg, &mut diag).expect("valid");
        assert!(matches!(
            analyzer.analyse_unit(&data(), 0, &UnitSpec::Whole, None, &mut diag),
            Err(EpscatError::MissingWindows { .. })
        ));
    }

    fn named(name: &str, value: f64) -> Signal {
        Signal::new(name, Array1::from_elem(3, value), 0.0, 1.0, "").expect("valid")
    }

    #[test]
    // Purpose
    // -------
    // A previous result survives, marked stale, when its unit fails, and is
    // dropped when the unit is no longer analysed.
    fn reconcile_keeps_failed_units_only() {
        let existing = vec![named("A", 1.0), named("B", 1.0)];
        let attempted = vec!["A".to_string(), "B".to_string()];
        let out = reconcile(existing.clone(), vec![], &attempted);
        assert_eq!(out.len(), 2);
        for (kept, old) in out.iter().zip(&existing) {
            assert_eq!(kept.name, old.name);
            assert_eq!(kept.data(), old.data());
            assert!(is_stale(kept));
        }

        let out = reconcile(existing, vec![named("C", 2.0)], &["C".to_string()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "C");
        assert!(!is_stale(&out[0]));
    }

    #[test]
    // Purpose
    // -------
    // When a re-analysis of a unit fails, its earlier result stays in the
    // frame but is flagged stale, both in its annotations and in the report.
    //
    // Given
    // -----
    // - "spine" analysed once with trigger windows, then again with cursor
    //   windows and no cursors (which fails).
    //
    // Expect
    // ------
    // - Second report: one failure, `stale == [(0, "spine")]`, and the kept
    //   result carries `Stale = true`. A successful third run clears it.
    fn failed_reanalysis_marks_the_kept_result_stale() {
        let (good, bad) = (config("triggers"), config("cursors"));
        let mut diag = Diagnostics::new();
        let ok = Analyzer::new(&good, &mut diag).expect("valid");
        let failing = Analyzer::new(&bad, &mut diag).expect("valid");
        let mut d = data();
        let units = [UnitSpec::from("spine")];

        let first = ok.analyse_frame(&mut d, 0, &units, &mut diag).expect("frame exists");
        assert!(first.stale.is_empty());

        let second = failing.analyse_frame(&mut d, 0, &units, &mut diag).expect("frame exists");
        assert_eq!(second.failures.len(), 1);
        assert_eq!(second.stale, vec![(0, "spine".to_string())]);
        assert_eq!(d.frames[0].results.len(), 1);
        assert!(is_stale(&d.frames[0].results[0]));

        let third = ok.analyse_frame(&mut d, 0, &units, &mut diag).expect("frame exists");
        assert!(third.stale.is_empty());
        assert!(!is_stale(&d.frames[0].results[0]));
    }
}
