//! rust_epscat — EPSCaT analysis for line-scan calcium imaging.
//!
//! Purpose
//! -------
//! Serve as the crate root. The crate measures excitatory postsynaptic
//! calcium transients (EPSCaTs) in line-scan images: it extracts fluorescence
//! ratio waveforms, fits compound exponential models, integrates the fits and
//! discriminates successes from failures.
//!
//! Key behaviors
//! -------------
//! - [`epscat`] holds the analysis pipeline, its data contracts and the
//!   frame/unit orchestrator.
//! - [`optimization`] holds the argmin-backed bounded least-squares solver the
//!   fitter runs on.
//!
//! Conventions
//! -----------
//! - Fallible entrypoints return `EpscatResult<T>` or `OptResult<T>`; library
//!   code does not panic on bad input.
//! - Logging goes through `tracing`; install a subscriber to see it.
//!
//! Downstream usage
//! ----------------
//! - Build an [`epscat::EpscatConfig`], wrap it in an
//!   [`epscat::Analyzer`] and call `analyse_unit` for one-shot analysis or
//!   `analyse_frame` / `analyse_dataset` for batches.

pub mod epscat;
pub mod optimization;
