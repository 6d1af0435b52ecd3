//! numerical_stability — stable scalar transforms and bounded reparametrization.
//!
//! Purpose
//! -------
//! Collect the numerically robust transforms used to move between bounded
//! model parameters and the unconstrained space the L-BFGS solver works in.
//!
//! Key behaviors
//! -------------
//! - Stable scalar transforms (`safe_softplus`, its inverse, `safe_logistic`,
//!   `safe_logit`) free of overflow for large-magnitude inputs.
//! - [`bounds::ParamBounds`], a validated per-parameter box constraint that
//!   maps model vectors to θ-space and back and pins parameters whose lower
//!   and upper bounds coincide.
//!
//! Conventions
//! -----------
//! - Pure numerical helpers: no logging, I/O or global state.
//! - Invalid bounds are reported as `OptError`, never panics.

pub mod bounds;
pub mod transformations;

pub use self::bounds::{AT_BOUND_TOL, BOUND_MARGIN, ParamBounds};
pub use self::transformations::{
    LOGIT_EPS, safe_logistic, safe_logit, safe_softplus, safe_softplus_inv,
};

pub mod prelude {
    pub use super::bounds::ParamBounds;
    pub use super::transformations::{safe_logistic, safe_logit, safe_softplus, safe_softplus_inv};
}
