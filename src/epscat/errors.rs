//! Errors for EPSCaT analysis (configuration, data shape, windows, fitting).
//!
//! [`EpscatError`] is the single error type returned by the extractor, fitter,
//! integrator, discriminator and orchestrator. Variants follow the error
//! taxonomy of the analysis:
//!
//! - **Configuration**: unknown/duplicate channels, malformed windows or
//!   specs, mismatched bound/parameter cardinality.
//! - **Data shape**: wrong dimensionality, missing axis tags, indicator vs
//!   reference shape mismatch.
//! - **Missing discrimination windows**: no protocol, triggers or cursors for
//!   the configured window policy.
//! - **Solver**: any optimizer failure, wrapped from
//!   [`OptError`](crate::optimization::errors::OptError).
//!
//! Numerical warnings (clipped windows, all-NaN integration slices) are *not*
//! errors; they are reported through
//! [`Diagnostics`](crate::epscat::core::diagnostics::Diagnostics).
use crate::{epscat::core::axes::AxisTag, optimization::errors::OptError};
use thiserror::Error;

/// Result alias for EPSCaT operations.
pub type EpscatResult<T> = Result<T, EpscatError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EpscatError {
    // ---- Configuration ----
    #[error("Invalid configuration for '{key}': {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    #[error("Configuration could not be parsed: {reason}")]
    ConfigParse { reason: String },

    #[error("Channel '{name}' not found among {available:?}")]
    UnknownChannel { name: String, available: Vec<String> },

    #[error("Channel index {index} out of range for {count} channel(s)")]
    ChannelOutOfRange { index: usize, count: usize },

    #[error("Indicator and reference channels must differ (both are {index})")]
    IdenticalChannels { index: usize },

    #[error("Component {component} has {actual} parameters; expected 2·n_decays + 3 = {expected}")]
    InvalidParamLength { component: usize, expected: usize, actual: usize },

    #[error("{which} bound specification has wrong shape: expected {expected}, found {actual}")]
    BoundLengthMismatch { which: &'static str, expected: String, actual: String },

    #[error("Integration specification lists {actual} intervals; expected {expected}")]
    IntegrationSpecMismatch { expected: usize, actual: usize },

    #[error("Unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },

    // ---- Data shape ----
    #[error("Expected a {expected}-D array, found {found}-D")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Axis tags {tags:?} do not include the required {missing:?} axis")]
    MissingAxis { missing: AxisTag, tags: Vec<AxisTag> },

    #[error("Axis tag count {tags} does not match array dimensionality {ndim}")]
    AxisCountMismatch { tags: usize, ndim: usize },

    #[error("Indicator shape {indicator:?} differs from reference shape {reference:?}")]
    ShapeMismatch { indicator: (usize, usize), reference: (usize, usize) },

    #[error("Invalid sampling period {value}: must be finite and > 0")]
    InvalidSamplingPeriod { value: f64 },

    #[error("Signal columns must share {expected} samples; column has {found}")]
    ColumnLengthMismatch { expected: usize, found: usize },

    // ---- Windows ----
    #[error("Invalid {name} window [{begin}, {end}): {reason}")]
    InvalidWindow { name: &'static str, begin: f64, end: f64, reason: &'static str },

    #[error("No discrimination windows available: {reason}")]
    MissingWindows { reason: String },

    // ---- Data set lookups ----
    #[error("Frame {index} out of range for {count} frame(s)")]
    FrameOutOfRange { index: usize, count: usize },

    #[error("Unknown analysis unit '{name}'")]
    UnknownUnit { name: String },

    // ---- Fitting ----
    #[error("Curve fit failed: {0}")]
    Solver(#[from] OptError),

    #[error("Signal has not been fitted")]
    NotFitted,

    // ---- Numerics ----
    #[error("Numerical failure in {operation}: {reason}")]
    Numerical { operation: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Display messages embed their payload and solver errors convert via `?`.
    fn display_embeds_payload_and_wraps_solver_errors() {
        let err = EpscatError::ChannelOutOfRange { index: 3, count: 2 };
        assert!(err.to_string().contains('3'));

        fn fails() -> EpscatResult<()> {
            Err(OptError::MissingThetaHat)?
        }
        assert_eq!(fails(), Err(EpscatError::Solver(OptError::MissingThetaHat)));

        let numerical = EpscatError::Numerical { operation: "linear detrend", reason: "SVD".into() };
        assert_eq!(numerical.to_string(), "Numerical failure in linear detrend: SVD");
    }
}
