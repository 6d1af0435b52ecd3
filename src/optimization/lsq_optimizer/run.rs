//! Execution helper that runs an `argmin` solver on a residual model and
//! returns a crate-friendly [`FitOutcome`].
use crate::optimization::{
    errors::OptResult,
    lsq_optimizer::{
        adapter::ArgMinAdapter,
        traits::{FitOptions, FitOutcome, ResidualModel},
        types::{Grad, Theta},
    },
};
#[cfg(feature = "obs_slog")]
use argmin::core::{CostFunction, Gradient};
use argmin::core::{Executor, State};
#[cfg(feature = "obs_slog")]
use argmin_math::ArgminL2Norm;

/// Run an `argmin` optimization for a least-squares problem.
///
/// Wires the model (via [`ArgMinAdapter`]), the chosen solver, the initial
/// parameter `theta0`, the optional slog observer (behind `obs_slog`) and the
/// optional `max_iter`, then converts the final state into [`FitOutcome`].
///
/// # Errors
/// - Propagates any `argmin` runtime error (line-search failures, cost
///   evaluation errors raised by the model, …) as `OptError`.
/// - Propagates validation errors from [`FitOutcome::new`].
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &FitOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<FitOutcome>
where
    F: ResidualModel,
    S: argmin::core::Solver<
            ArgMinAdapter<'a, F>,
            argmin::core::IterState<Theta, Grad, (), (), (), f64>,
        > + Send
        + 'static,
{
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        log_initial_state(&theta0, &problem)?;
    }
    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(theta0));
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, argmin::core::observers::ObserverMode::Always);
    }
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let function_counts = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    let grad = result.take_gradient();
    FitOutcome::new(
        result.take_best_param(),
        result.get_best_cost(),
        termination,
        iterations,
        function_counts,
        grad,
    )
}

#[cfg(feature = "obs_slog")]
fn log_initial_state<F>(theta0: &Theta, problem: &ArgMinAdapter<'_, F>) -> OptResult<()>
where
    F: ResidualModel,
{
    let c0 = problem.cost(theta0)?;
    let g0n = problem.gradient(theta0).ok().map(|g| g.l2_norm());
    tracing::debug!(cost = c0, grad_norm = ?g0n, "initial least-squares state");
    Ok(())
}
