//! optimization — least-squares stack, numerical helpers, and error surface.
//!
//! Purpose
//! -------
//! Provide a cohesive optimization layer for curve fitting, combining an
//! argmin-backed least-squares optimizer, numerically stable bounded
//! reparametrizations, and a single error/result surface. Callers implement a
//! residual model, choose tolerances, and obtain fitted parameters and
//! diagnostics without touching backend solver details.
//!
//! Key behaviors
//! -------------
//! - Expose a high-level API for **minimizing** `½·Σ r(θ)²`
//!   (`lsq_optimizer`), including solver and stopping-criteria configuration.
//! - Supply bounded ↔ unconstrained parameter maps (`numerical_stability`)
//!   so box-constrained fits run on an unconstrained quasi-Newton solver.
//! - Normalize configuration issues, numerical failures, and backend solver
//!   errors into a single enum (`errors::OptError`).
//!
//! Conventions
//! -----------
//! - Public optimization entrypoints that can fail return `OptResult<T>`;
//!   callers never see raw argmin errors.
//! - This layer does not log; the `epscat` layer above reports diagnostics.
//!
//! Downstream usage
//! ----------------
//! - `epscat::models` implements `ResidualModel` for the compound
//!   exponential-rise/multi-decay model and calls `minimize`.
//! - Front-ends can import the curated surface via
//!   `optimization::prelude::*`.

pub mod errors;
pub mod lsq_optimizer;
pub mod numerical_stability;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::lsq_optimizer::prelude::*;
    pub use super::numerical_stability::prelude::*;
}
