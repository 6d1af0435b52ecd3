//! lsq_optimizer — argmin-powered bounded least-squares optimizer.
//!
//! Purpose
//! -------
//! Provide a high-level, argmin-backed layer for **minimizing sums of squared
//! residuals** `½·Σ rᵢ(θ)²`. Callers implement a single trait,
//! [`ResidualModel`], and invoke [`minimize`] to run L-BFGS with a
//! configurable line search, tolerances, and finite-difference fallbacks.
//!
//! Key behaviors
//! -------------
//! - Convert user residual models into argmin cost functions via
//!   [`adapter::ArgMinAdapter`].
//! - Expose a single entrypoint [`minimize`] that validates the starting
//!   point, selects an L-BFGS solver via [`builders`] and executes it via
//!   [`run::run_lbfgs`].
//! - Centralize optimizer configuration ([`Tolerances`], [`FitOptions`]) and
//!   validation logic ([`validation`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - The optimizer works in an unconstrained space. Box constraints on model
//!   parameters are handled by the model layer through
//!   [`ParamBounds`](crate::optimization::numerical_stability::bounds::ParamBounds),
//!   which maps every bounded parameter onto the real line.
//! - Residual evaluation must treat invalid inputs as recoverable
//!   [`OptError`](crate::optimization::errors::OptError) values, not panics.
//!
//! Conventions
//! -----------
//! - Errors bubble up as `OptResult<T>`; this module never intentionally
//!   panics or uses `unsafe`.
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover FD gradients in [`adapter`], solver
//!   construction in [`builders`], configuration invariants in [`traits`]
//!   and a small end-to-end solve in [`api`].

pub mod adapter;
pub mod api;
pub mod builders;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::minimize;
pub use self::traits::{FitOptions, FitOutcome, LineSearcher, ResidualModel, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Residuals, Theta};

pub mod prelude {
    pub use super::api::minimize;
    pub use super::traits::{FitOptions, FitOutcome, LineSearcher, ResidualModel, Tolerances};
    pub use super::types::{Cost, Grad, Residuals, Theta};
}
