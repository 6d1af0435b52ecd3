//! epscat — calcium-transient analysis of line-scan recordings.
//!
//! Purpose
//! -------
//! Turn one line-scan frame and one analysis unit into an annotated EPSCaT
//! waveform: extract the fluorescence ratio, optionally fit a compound
//! exponential-rise/multi-decay model, integrate the fitted curves and decide
//! per component whether a transient rose above noise.
//!
//! Key behaviors
//! -------------
//! - [`extract`]: `ΔF/F0` or `ΔF/A` waveform from an ROI and baseline window,
//!   with optional dark-current subtraction and linear detrending.
//! - [`fit`]: bounded least-squares fit of [`models::CompoundModel`] with
//!   NaN-padded curve reinsertion and per-component R².
//! - [`integrate`]: Simpson integrals of the fitted curves over resolved
//!   intervals.
//! - [`windows`] and [`discriminate`]: baseline/peak windows from triggers,
//!   delays or cursors, and the statistic/predicate/comparator decision.
//! - [`amplitude`]: direct or level-crossing amplitudes.
//! - [`orchestrator`]: the per-(frame, unit) state machine, batch drivers and
//!   result reconciliation.
//!
//! Invariants & assumptions
//! ------------------------
//! - Configuration is parsed and validated once ([`config::EpscatConfig`]);
//!   stages receive typed values, never raw key paths.
//! - Numerical warnings go to a caller-owned
//!   [`core::diagnostics::Diagnostics`] sink and to `tracing`; they never abort.
//! - Every failure is an [`errors::EpscatError`]; batch drivers collect them
//!   per unit instead of aborting.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each stage; `tests/integration_epscat_pipeline.rs`
//!   checks the end-to-end properties on synthetic line scans.
pub mod amplitude;
pub mod config;
pub mod core;
pub mod discriminate;
pub mod errors;
pub mod extract;
pub mod fit;
pub mod integrate;
pub mod models;
pub mod orchestrator;
pub mod windows;

pub use self::config::EpscatConfig;
pub use self::errors::{EpscatError, EpscatResult};
pub use self::orchestrator::{Analyzer, BatchReport, ScanData, ScanFrame, reconcile};
