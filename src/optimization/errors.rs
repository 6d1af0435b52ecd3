//! optimization::errors — unified error surface for the least-squares solver.
//!
//! Purpose
//! -------
//! Collect configuration, numerical, and backend failures raised while fitting
//! a residual model into one enum, [`OptError`], with a shared result alias
//! [`OptResult`]. Argmin's dynamic `Error` values are downcast into concrete
//! variants at the boundary so callers never handle backend types directly.
//!
//! Conventions
//! -----------
//! - Variants carry the offending value and, where useful, a static reason.
//! - `GradientNotImplemented` is a control-flow signal: it tells the adapter
//!   to fall back to finite differences and is never surfaced to callers.
use argmin::core::{ArgminError, Error};
use thiserror::Error;

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptError {
    // ---- Gradient ----
    /// Implies that FD should be used.
    #[error("Gradient optimization not implemented")]
    GradientNotImplemented,

    #[error("Gradient dimension mismatch: expected {expected}, found {found}")]
    GradientDimMismatch { expected: usize, found: usize },

    #[error("Invalid gradient at index {index}: {value}: {reason}")]
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- FitOptions ----
    #[error("Invalid gradient tolerance {tol}: {reason}")]
    InvalidTolGrad { tol: f64, reason: &'static str },

    #[error("Invalid cost function change tolerance {tol}: {reason}")]
    InvalidTolCost { tol: f64, reason: &'static str },

    #[error("Invalid maximum iterations {max_iter}: {reason}")]
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    #[error("No tolerances provided")]
    NoTolerancesProvided,

    #[error("Invalid line searcher '{name}': {reason}")]
    InvalidLineSearch { name: String, reason: &'static str },

    #[error("Invalid L-BFGS memory {mem}: {reason}")]
    InvalidLBFGSMem { mem: usize, reason: &'static str },

    // ---- Problem definition ----
    /// Cost function returned a non-finite value.
    #[error("Non-finite cost value: {value}")]
    NonFiniteCost { value: f64 },

    /// Sample times and values differ in length.
    #[error("Data length mismatch: {times} sample times, {values} values")]
    DataLengthMismatch { times: usize, values: usize },

    /// Residual vector is empty (nothing to fit).
    #[error("No finite samples available for fitting")]
    EmptyResiduals,

    /// Lower/upper bounds are inconsistent for a parameter.
    #[error("Invalid bounds for parameter {index}: [{lower}, {upper}]: {reason}")]
    InvalidBounds { index: usize, lower: f64, upper: f64, reason: &'static str },

    /// Initial guess lies outside its bounds.
    #[error("Initial value {value} of parameter {index} is outside [{lower}, {upper}]")]
    InitialOutOfBounds { index: usize, value: f64, lower: f64, upper: f64 },

    /// Parameter vector length does not match the model.
    #[error("Theta length mismatch: expected {expected}, actual {actual}")]
    ThetaLengthMismatch { expected: usize, actual: usize },

    /// Unconstrained optimization input must have finite values.
    #[error("Invalid theta input at index {index}: {value}, must be finite")]
    InvalidThetaInput { index: usize, value: f64 },

    // ---- Optimizer outcome ----
    #[error("Invalid estimated parameter at index {index}: {value}: {reason}")]
    InvalidThetaHat { index: usize, value: f64, reason: &'static str },

    #[error("Missing estimated parameters (theta hat)")]
    MissingThetaHat,

    // ---- Argmin ----
    #[error("Invalid parameter: {text}")]
    InvalidParameter { text: String },
    #[error("Not implemented: {text}")]
    NotImplemented { text: String },
    #[error("Not initialized: {text}")]
    NotInitialized { text: String },
    #[error("Condition violated: {text}")]
    ConditionViolated { text: String },
    #[error("Checkpoint not found: {text}")]
    CheckPointNotFound { text: String },
    #[error("Potential bug: {text}")]
    PotentialBug { text: String },
    #[error("Impossible error: {text}")]
    ImpossibleError { text: String },
    #[error("Backend error: {text}")]
    BackendError { text: String },

    // ---- Fallback ----
    #[error("Unknown error")]
    UnknownError,
}

impl From<Error> for OptError {
    fn from(original_err: Error) -> Self {
        let original_err = match original_err.downcast::<OptError>() {
            Ok(opt_err) => return opt_err,
            Err(err) => err,
        };
        match original_err.downcast() {
            Ok(argmin_err) => match argmin_err {
                ArgminError::InvalidParameter { text } => OptError::InvalidParameter { text },
                ArgminError::NotImplemented { text } => OptError::NotImplemented { text },
                ArgminError::NotInitialized { text } => OptError::NotInitialized { text },
                ArgminError::ConditionViolated { text } => OptError::ConditionViolated { text },
                ArgminError::CheckpointNotFound { text } => OptError::CheckPointNotFound { text },
                ArgminError::PotentialBug { text } => OptError::PotentialBug { text },
                ArgminError::ImpossibleError { text } => OptError::ImpossibleError { text },
                _ => OptError::UnknownError,
            },
            Err(err) => OptError::BackendError { text: err.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // An `OptError` raised inside a cost closure travels through argmin as a
    // boxed `Error`; the conversion must recover the original variant.
    fn from_argmin_error_recovers_wrapped_opt_error() {
        let err: Error = OptError::NonFiniteCost { value: f64::INFINITY }.into();
        let back = OptError::from(err);
        assert_eq!(back, OptError::NonFiniteCost { value: f64::INFINITY });
    }

    #[test]
    // Purpose
    // -------
    // Argmin's own error kinds map onto the dedicated wrapper variants.
    fn from_argmin_error_maps_condition_violated() {
        let err: Error = ArgminError::ConditionViolated { text: "descent".into() }.into();
        assert_eq!(OptError::from(err), OptError::ConditionViolated { text: "descent".into() });
    }
}
