//! Box constraints expressed as smooth reparametrizations.
//!
//! Purpose
//! -------
//! L-BFGS works on the whole real line, while curve models need bounded
//! parameters (non-negative amplitudes, positive time constants, delays
//! pinned to a window). [`ParamBounds`] maps each bounded model parameter to
//! one unconstrained optimizer coordinate and back:
//!
//! | bounds            | model value `p(θ)`                 |
//! |-------------------|------------------------------------|
//! | `lo == hi`        | pinned, no optimizer coordinate    |
//! | `[lo, hi]` finite | `lo + (hi − lo)·σ(θ)`              |
//! | `[lo, ∞)`         | `lo + softplus(θ)`                 |
//! | `(−∞, hi]`        | `hi − softplus(θ)`                 |
//! | `(−∞, ∞)`         | `θ`                                |
//!
//! Invariants
//! ----------
//! - `lo <= hi` for every parameter and neither bound is NaN.
//! - Every model vector produced by [`ParamBounds::to_model`] lies inside
//!   its bounds.
//! - [`ParamBounds::to_theta`] starts every free parameter at least
//!   [`BOUND_MARGIN`] (scaled) inside its bounds. On an exact bound the
//!   transforms have zero slope and the coordinate could never move.
use crate::optimization::{
    errors::{OptError, OptResult},
    numerical_stability::transformations::{
        safe_logistic, safe_logit, safe_softplus, safe_softplus_inv,
    },
};
use ndarray::{Array1, ArrayView1};

/// Relative distance kept between a starting value and a bound: absolute
/// `BOUND_MARGIN · max(1, |p|)` for one-sided bounds, a fraction of the
/// width for boxes.
pub const BOUND_MARGIN: f64 = 1e-2;

/// Relative distance below which a final value counts as sitting on a bound.
pub const AT_BOUND_TOL: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
enum BoundKind {
    Fixed(f64),
    Box { lo: f64, hi: f64 },
    Lower(f64),
    Upper(f64),
    Free,
}

/// Validated per-parameter bounds and the associated θ-space mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamBounds {
    kinds: Vec<BoundKind>,
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl ParamBounds {
    /// Build validated bounds from lower/upper vectors of equal length.
    ///
    /// # Errors
    /// - [`OptError::ThetaLengthMismatch`] when the lengths differ.
    /// - [`OptError::InvalidBounds`] when a bound is NaN or `lo > hi`.
    pub fn new(lower: Array1<f64>, upper: Array1<f64>) -> OptResult<Self> {
        if lower.len() != upper.len() {
            return Err(OptError::ThetaLengthMismatch {
                expected: lower.len(),
                actual: upper.len(),
            });
        }
        let mut kinds = Vec::with_capacity(lower.len());
        for (index, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if lo.is_nan() || hi.is_nan() {
                return Err(OptError::InvalidBounds {
                    index,
                    lower: lo,
                    upper: hi,
                    reason: "Bounds must not be NaN.",
                });
            }
            if lo > hi {
                return Err(OptError::InvalidBounds {
                    index,
                    lower: lo,
                    upper: hi,
                    reason: "Lower bound exceeds upper bound.",
                });
            }
            let kind = match (lo.is_finite(), hi.is_finite()) {
                _ if lo == hi => BoundKind::Fixed(lo),
                (true, true) => BoundKind::Box { lo, hi },
                (true, false) => BoundKind::Lower(lo),
                (false, true) => BoundKind::Upper(hi),
                (false, false) => BoundKind::Free,
            };
            kinds.push(kind);
        }
        Ok(Self { kinds, lower, upper })
    }

    /// Number of model parameters.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Number of free (non-pinned) optimizer coordinates.
    pub fn n_free(&self) -> usize {
        self.kinds.iter().filter(|k| !matches!(k, BoundKind::Fixed(_))).count()
    }

    pub fn lower(&self) -> ArrayView1<'_, f64> {
        self.lower.view()
    }

    pub fn upper(&self) -> ArrayView1<'_, f64> {
        self.upper.view()
    }

    /// Map a model-space vector into θ-space, dropping pinned parameters.
    ///
    /// Values closer than [`BOUND_MARGIN`] to a bound are moved inward first.
    ///
    /// # Errors
    /// - [`OptError::ThetaLengthMismatch`] for a wrong-length input.
    /// - [`OptError::InitialOutOfBounds`] when a value lies outside its bounds.
    pub fn to_theta(&self, params: ArrayView1<'_, f64>) -> OptResult<Array1<f64>> {
        if params.len() != self.len() {
            return Err(OptError::ThetaLengthMismatch { expected: self.len(), actual: params.len() });
        }
        let mut theta = Vec::with_capacity(self.n_free());
        for (index, (&p, kind)) in params.iter().zip(&self.kinds).enumerate() {
            let (lo, hi) = (self.lower[index], self.upper[index]);
            if !(p >= lo && p <= hi) {
                return Err(OptError::InitialOutOfBounds { index, value: p, lower: lo, upper: hi });
            }
            match *kind {
                BoundKind::Fixed(_) => {}
                BoundKind::Box { lo, hi } => {
                    let u = ((p - lo) / (hi - lo)).clamp(BOUND_MARGIN, 1.0 - BOUND_MARGIN);
                    theta.push(safe_logit(u))
                }
                BoundKind::Lower(lo) => theta.push(safe_softplus_inv(inward(p - lo, p))),
                BoundKind::Upper(hi) => theta.push(safe_softplus_inv(inward(hi - p, p))),
                BoundKind::Free => theta.push(p),
            }
        }
        Ok(Array1::from(theta))
    }

    /// Map a θ-space vector back into model space, re-inserting pinned values.
    ///
    /// # Errors
    /// - [`OptError::ThetaLengthMismatch`] when `theta.len() != n_free()`.
    pub fn to_model(&self, theta: ArrayView1<'_, f64>) -> OptResult<Array1<f64>> {
        if theta.len() != self.n_free() {
            return Err(OptError::ThetaLengthMismatch {
                expected: self.n_free(),
                actual: theta.len(),
            });
        }
        let mut free = theta.iter();
        let mut out = Array1::zeros(self.len());
        for (slot, kind) in out.iter_mut().zip(&self.kinds) {
            *slot = match *kind {
                BoundKind::Fixed(v) => v,
                BoundKind::Box { lo, hi } => {
                    lo + (hi - lo) * safe_logistic(*free.next().unwrap_or(&0.0))
                }
                BoundKind::Lower(lo) => lo + safe_softplus(*free.next().unwrap_or(&0.0)),
                BoundKind::Upper(hi) => hi - safe_softplus(*free.next().unwrap_or(&0.0)),
                BoundKind::Free => *free.next().unwrap_or(&0.0),
            };
        }
        Ok(out)
    }

    /// Pull a model-space gradient back to θ-space: `∂c/∂θⱼ = ∂c/∂pᵢ · dpᵢ/dθⱼ`
    /// for each free parameter `i`, dropping pinned entries.
    ///
    /// # Errors
    /// - [`OptError::ThetaLengthMismatch`] when either input has the wrong length.
    pub fn chain_gradient(
        &self, theta: ArrayView1<'_, f64>, grad_model: ArrayView1<'_, f64>,
    ) -> OptResult<Array1<f64>> {
        if theta.len() != self.n_free() {
            return Err(OptError::ThetaLengthMismatch {
                expected: self.n_free(),
                actual: theta.len(),
            });
        }
        if grad_model.len() != self.len() {
            return Err(OptError::ThetaLengthMismatch {
                expected: self.len(),
                actual: grad_model.len(),
            });
        }
        let mut free = theta.iter();
        let mut out = Vec::with_capacity(self.n_free());
        for (&g, kind) in grad_model.iter().zip(&self.kinds) {
            let dp = match *kind {
                BoundKind::Fixed(_) => continue,
                BoundKind::Box { lo, hi } => {
                    let s = safe_logistic(*free.next().unwrap_or(&0.0));
                    (hi - lo) * s * (1.0 - s)
                }
                BoundKind::Lower(_) => safe_logistic(*free.next().unwrap_or(&0.0)),
                BoundKind::Upper(_) => -safe_logistic(*free.next().unwrap_or(&0.0)),
                BoundKind::Free => {
                    free.next();
                    1.0
                }
            };
            out.push(g * dp);
        }
        Ok(Array1::from(out))
    }

    /// Indices of free parameters resting on a bound while the model-space
    /// gradient `grad_model` of the cost still points back into the feasible
    /// region by more than `tol`.
    ///
    /// A parameter at its lower bound with `∂c/∂p < −tol` (or at its upper
    /// bound with `∂c/∂p > tol`) was held there by the transform, not by the
    /// data.
    pub fn stalled_at_bound(
        &self, params: ArrayView1<'_, f64>, grad_model: ArrayView1<'_, f64>, tol: f64,
    ) -> Vec<usize> {
        let near = |d: f64, b: f64| d <= AT_BOUND_TOL * b.abs().max(1.0);
        self.kinds
            .iter()
            .zip(params.iter().zip(grad_model.iter()))
            .enumerate()
            .filter_map(|(i, (kind, (&p, &g)))| {
                let (at_lo, at_hi) = match *kind {
                    BoundKind::Box { lo, hi } => (near(p - lo, lo), near(hi - p, hi)),
                    BoundKind::Lower(lo) => (near(p - lo, lo), false),
                    BoundKind::Upper(hi) => (false, near(hi - p, hi)),
                    BoundKind::Fixed(_) | BoundKind::Free => (false, false),
                };
                ((at_lo && g < -tol) || (at_hi && g > tol)).then_some(i)
            })
            .collect()
    }
}

/// Distance from a one-sided bound, raised to the starting margin.
fn inward(distance: f64, p: f64) -> f64 {
    distance.max(BOUND_MARGIN * p.abs().max(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Every bound kind round-trips an interior value, and pinned parameters
    // are removed from θ-space.
    //
    // Given
    // -----
    // - Bounds: fixed 2.0, box [0, 1], lower 0, upper 5, free.
    //
    // Expect
    // ------
    // - `n_free() == 4`, and `to_model(to_theta(p)) ≈ p`.
    fn round_trip_all_bound_kinds() {
        let lower = array![2.0, 0.0, 0.0, f64::NEG_INFINITY, f64::NEG_INFINITY];
        let upper = array![2.0, 1.0, f64::INFINITY, 5.0, f64::INFINITY];
        let bounds = ParamBounds::new(lower, upper).expect("valid bounds");
        let p = array![2.0, 0.25, 3.0, -1.0, 7.5];

        let theta = bounds.to_theta(p.view()).expect("inside bounds");
        assert_eq!(theta.len(), 4);
        let back = bounds.to_model(theta.view()).expect("right length");
        for (a, b) in back.iter().zip(p.iter()) {
            assert!((a - b).abs() < 1e-9, "{back:?} vs {p:?}");
        }
    }

    #[test]
    // Purpose
    // -------
    // `chain_gradient` matches a central difference of `p(θ)` for every
    // free bound kind.
    fn chain_gradient_matches_numerical_derivative() {
        let lower = array![0.0, 0.0, f64::NEG_INFINITY, 1.0, f64::NEG_INFINITY];
        let upper = array![2.0, f64::INFINITY, 3.0, 1.0, f64::INFINITY];
        let bounds = ParamBounds::new(lower, upper).expect("valid bounds");
        let theta = array![0.3, -0.7, 1.1, 0.4];
        let ones = array![1.0, 1.0, 1.0, 1.0, 1.0];

        let g = bounds.chain_gradient(theta.view(), ones.view()).expect("lengths ok");
        let h = 1e-6;
        for j in 0..theta.len() {
            let mut up = theta.clone();
            let mut dn = theta.clone();
            up[j] += h;
            dn[j] -= h;
            let pu = bounds.to_model(up.view()).expect("ok");
            let pd = bounds.to_model(dn.view()).expect("ok");
            let numeric = (pu.sum() - pd.sum()) / (2.0 * h);
            assert!((g[j] - numeric).abs() < 1e-6, "coordinate {j}: {} vs {numeric}", g[j]);
        }
    }

    #[test]
    fn to_model_stays_inside_box_for_extreme_theta() {
        let bounds = ParamBounds::new(array![0.0, 1.0], array![1.0, f64::INFINITY]).expect("valid");
        for t in [-1e3, -10.0, 0.0, 10.0, 1e3] {
            let p = bounds.to_model(array![t, t].view()).expect("length ok");
            assert!((0.0..=1.0).contains(&p[0]));
            assert!(p[1] >= 1.0);
        }
    }

    #[test]
    // Purpose
    // -------
    // Starting values on a bound are moved inside it so that the transform
    // still has usable slope there.
    //
    // Given
    // -----
    // - Lower 0 (one-sided), upper 5 (one-sided), box [0, 1]; all at a bound.
    //
    // Expect
    // ------
    // - The round trip lands `BOUND_MARGIN` inside each bound and
    //   `dp/dθ ≥ BOUND_MARGIN / 2` for every coordinate.
    fn starting_values_on_a_bound_move_inside() {
        let bounds = ParamBounds::new(
            array![0.0, f64::NEG_INFINITY, 0.0],
            array![f64::INFINITY, 5.0, 1.0],
        )
        .expect("valid");
        let theta = bounds.to_theta(array![0.0, 5.0, 1.0].view()).expect("on bounds");
        let p = bounds.to_model(theta.view()).expect("length ok");
        assert!((p[0] - BOUND_MARGIN).abs() < 1e-9, "{p:?}");
        assert!((p[1] - (5.0 - 5.0 * BOUND_MARGIN)).abs() < 1e-9, "{p:?}");
        assert!((p[2] - (1.0 - BOUND_MARGIN)).abs() < 1e-9, "{p:?}");

        let slope = bounds.chain_gradient(theta.view(), array![1.0, 1.0, 1.0].view()).expect("ok");
        for g in slope.iter() {
            assert!(g.abs() >= BOUND_MARGIN / 2.0, "{slope:?}");
        }
    }

    #[test]
    // Purpose
    // -------
    // Only parameters on a bound whose gradient points inward are reported.
    //
    // Given
    // -----
    // - Lower-bounded parameters at 0 with gradients −1 (inward), +1
    //   (outward), an interior parameter with gradient −1, and a pinned one.
    //
    // Expect
    // ------
    // - Only index 0 is stalled.
    fn stalled_at_bound_requires_an_inward_gradient() {
        let bounds = ParamBounds::new(
            array![0.0, 0.0, 0.0, 2.0],
            array![f64::INFINITY, f64::INFINITY, f64::INFINITY, 2.0],
        )
        .expect("valid");
        let params = array![1e-12, 0.0, 0.5, 2.0];
        let grad = array![-1.0, 1.0, -1.0, -1.0];
        assert_eq!(bounds.stalled_at_bound(params.view(), grad.view(), 1e-6), vec![0]);
    }

    #[test]
    fn new_rejects_inverted_bounds_and_out_of_range_start() {
        assert!(matches!(
            ParamBounds::new(array![1.0], array![0.0]),
            Err(OptError::InvalidBounds { index: 0, .. })
        ));
        let bounds = ParamBounds::new(array![0.0], array![1.0]).expect("valid");
        assert!(matches!(
            bounds.to_theta(array![2.0].view()),
            Err(OptError::InitialOutOfBounds { index: 0, .. })
        ));
    }
}
