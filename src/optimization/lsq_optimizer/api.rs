//! High-level entry point for minimizing a user-provided `ResidualModel`.
//!
//! Selects an L-BFGS solver with either Hager–Zhang or More–Thuente line
//! search, wraps the model in an `ArgMinAdapter` and delegates to `run_lbfgs`.
use crate::optimization::{
    errors::OptResult,
    lsq_optimizer::{
        adapter::ArgMinAdapter,
        builders::{build_optimizer_hager_zhang, build_optimizer_more_thuente},
        run::run_lbfgs,
        traits::{FitOptions, FitOutcome, LineSearcher, ResidualModel},
        types::Theta,
        validation::validate_theta_input,
    },
};

/// Minimize `½·Σ r(θ)²` using L-BFGS with the chosen line search.
///
/// # Behavior
/// - Validates `theta0` (finite entries) and calls `f.check(theta0, data)`.
/// - Builds the solver selected by `opts.line_searcher` and runs it.
///
/// # Errors
/// - Propagates any error from `f.check`.
/// - Propagates builder errors and runtime errors from `run_lbfgs`.
///
/// # Example
/// ```no_run
/// use ndarray::{array, Array1};
/// use rust_epscat::optimization::errors::OptResult;
/// use rust_epscat::optimization::lsq_optimizer::{minimize, FitOptions, ResidualModel};
///
/// struct Offset;
/// impl ResidualModel for Offset {
///     type Data = Vec<f64>;
///     fn residuals(&self, theta: &Array1<f64>, y: &Vec<f64>) -> OptResult<Array1<f64>> {
///         Ok(y.iter().map(|v| v - theta[0]).collect())
///     }
///     fn check(&self, _: &Array1<f64>, _: &Vec<f64>) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = minimize(&Offset, array![0.0], &vec![1.0, 2.0, 3.0], &FitOptions::default())?;
/// println!("θ̂ = {:?}", out.theta_hat);
/// # Ok::<(), rust_epscat::optimization::errors::OptError>(())
/// ```
pub fn minimize<F: ResidualModel>(
    f: &F, theta0: Theta, data: &F::Data, opts: &FitOptions,
) -> OptResult<FitOutcome> {
    validate_theta_input(&theta0)?;
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}
