//! Numerical stability utilities.
//!
//! Provides safe implementations of common nonlinear transforms
//! that are prone to overflow/underflow in naïve form. Explicit cutoffs
//! (`|x| > 20.0`) keep `f64` arithmetic in a well-conditioned regime.
//!
//! # Provided items
//! - [`safe_softplus(x)`]: `ln(1 + exp(x))`, mapping ℝ → (0, ∞).
//! - [`safe_softplus_inv(x)`]: inverse of softplus, mapping (0, ∞) → ℝ.
//! - [`safe_logistic(x)`]: `1 / (1 + exp(−x))`, mapping ℝ → (0, 1).
//! - [`safe_logit(p)`]: inverse of the logistic, with `p` clamped to
//!   `[LOGIT_EPS, 1 − LOGIT_EPS]`.

/// Clamp used by [`safe_logit`] so that points sitting exactly on a bound
/// still map to a finite optimizer coordinate.
pub const LOGIT_EPS: f64 = 1e-9;

/// Numerically stable softplus: `softplus(x) = ln(1 + exp(x))`.
pub fn safe_softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

/// Stable inverse of softplus on `(0, ∞)`: returns `t = ln(exp(x) − 1)`.
///
/// `x` must be finite and `> 0`.
pub fn safe_softplus_inv(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp_m1().ln() }
}

/// Numerically stable logistic function `σ(x) = 1 / (1 + exp(−x))`.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Inverse logistic `ln(p / (1 − p))`, clamping `p` away from {0, 1}.
pub fn safe_logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_EPS, 1.0 - LOGIT_EPS);
    (p / (1.0 - p)).ln()
}
