//! EPSCaT model parameters: one component and compound sequences.
//!
//! Purpose
//! -------
//! Represent the exponential-rise / multi-decay model and convert between its
//! structured form and the flat per-component vectors used in configuration
//! and in the optimizer.
//!
//! Model
//! -----
//! One component with decays `(aᵢ, dᵢ)`, offset `o`, rise time constant `r`
//! and onset (delay) `x₀`:
//!
//! ```text
//! y(t) = o                                                   t <  x₀
//! y(t) = o + (1 − e^{−(t−x₀)/r}) · Σᵢ aᵢ · e^{−(t−x₀)/dᵢ}      t >= x₀
//! ```
//!
//! A rise constant `r <= 0` means an instantaneous rise (factor 1). A compound
//! model is the sum of its components.
//!
//! Layout
//! ------
//! Each component serializes to `2·n_decays + 3` scalars:
//! `[a₁, d₁, …, aₙ, dₙ, o, r, x₀]` — decay pairs first, then offset, rise
//! time constant, delay. A compound model flattens its components in order.
use crate::epscat::errors::{EpscatError, EpscatResult};
use ndarray::{Array1, ArrayView1};

/// One exponential-rise / multi-decay component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentParams {
    /// `(scale, time constant)` per decay.
    pub decays: Vec<(f64, f64)>,
    pub offset: f64,
    pub rise_tau: f64,
    pub delay: f64,
}

impl ComponentParams {
    /// Parse a flat `[a₁, d₁, …, o, r, x₀]` vector.
    ///
    /// # Errors
    /// - [`EpscatError::InvalidParamLength`] unless `len = 2·n + 3`, `n >= 1`.
    pub fn from_flat(component: usize, flat: &[f64]) -> EpscatResult<Self> {
        let n_decays = n_decays_for_len(component, flat.len())?;
        let decays = (0..n_decays).map(|i| (flat[2 * i], flat[2 * i + 1])).collect();
        let tail = &flat[2 * n_decays..];
        Ok(Self { decays, offset: tail[0], rise_tau: tail[1], delay: tail[2] })
    }

    pub fn n_decays(&self) -> usize {
        self.decays.len()
    }

    pub fn n_params(&self) -> usize {
        2 * self.decays.len() + 3
    }

    pub fn to_flat(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.n_params());
        for &(a, d) in &self.decays {
            out.push(a);
            out.push(d);
        }
        out.extend([self.offset, self.rise_tau, self.delay]);
        out
    }

    /// Evaluate the component at time `t`.
    pub fn eval(&self, t: f64) -> f64 {
        if t < self.delay {
            return self.offset;
        }
        let dt = t - self.delay;
        let rise = if self.rise_tau > 0.0 { 1.0 - (-dt / self.rise_tau).exp() } else { 1.0 };
        let decay: f64 = self
            .decays
            .iter()
            .map(|&(a, d)| if d > 0.0 { a * (-dt / d).exp() } else { 0.0 })
            .sum();
        self.offset + rise * decay
    }

    /// Partial derivatives of [`eval`](Self::eval) at `t` with respect to the
    /// flat parameters `[a₁, d₁, …, o, r, x₀]`, written into `out`.
    ///
    /// Derivatives are one-sided at `t = x₀` (taken from the right).
    pub fn partials(&self, t: f64, out: &mut [f64]) {
        let n = self.decays.len();
        out.iter_mut().for_each(|v| *v = 0.0);
        out[2 * n] = 1.0;
        if t < self.delay {
            return;
        }
        let u = t - self.delay;
        let (rise, drise_du, drise_dr) = if self.rise_tau > 0.0 {
            let e = (-u / self.rise_tau).exp();
            (1.0 - e, e / self.rise_tau, -e * u / (self.rise_tau * self.rise_tau))
        } else {
            (1.0, 0.0, 0.0)
        };
        let mut sum = 0.0;
        let mut dsum_du = 0.0;
        for (i, &(a, d)) in self.decays.iter().enumerate() {
            if d <= 0.0 {
                continue;
            }
            let e = (-u / d).exp();
            sum += a * e;
            dsum_du -= a * e / d;
            out[2 * i] = rise * e;
            out[2 * i + 1] = rise * a * e * u / (d * d);
        }
        out[2 * n + 1] = drise_dr * sum;
        out[2 * n + 2] = -(drise_du * sum + rise * dsum_du);
    }
}

/// Ordered sequence of components.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundParams {
    components: Vec<ComponentParams>,
}

impl CompoundParams {
    /// # Errors
    /// - [`EpscatError::InvalidConfig`] when `components` is empty.
    pub fn new(components: Vec<ComponentParams>) -> EpscatResult<Self> {
        if components.is_empty() {
            return Err(EpscatError::InvalidConfig {
                key: "Fitting.Initial",
                reason: "at least one component is required".into(),
            });
        }
        Ok(Self { components })
    }

    /// Parse one flat vector per component.
    pub fn from_flat_vecs(flat: &[Vec<f64>]) -> EpscatResult<Self> {
        let components = flat
            .iter()
            .enumerate()
            .map(|(k, v)| ComponentParams::from_flat(k, v))
            .collect::<EpscatResult<Vec<_>>>()?;
        Self::new(components)
    }

    /// Rebuild from a concatenated vector using `layout` (decay count per component).
    pub fn from_concat(layout: &[usize], flat: ArrayView1<'_, f64>) -> EpscatResult<Self> {
        let expected: usize = layout.iter().map(|n| 2 * n + 3).sum();
        if flat.len() != expected {
            return Err(EpscatError::InvalidParamLength {
                component: 0,
                expected,
                actual: flat.len(),
            });
        }
        let mut start = 0;
        let mut components = Vec::with_capacity(layout.len());
        for (k, &n) in layout.iter().enumerate() {
            let len = 2 * n + 3;
            let chunk: Vec<f64> = flat.iter().skip(start).take(len).copied().collect();
            components.push(ComponentParams::from_flat(k, &chunk)?);
            start += len;
        }
        Self::new(components)
    }

    pub fn components(&self) -> &[ComponentParams] {
        &self.components
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    /// Number of decays per component.
    pub fn layout(&self) -> Vec<usize> {
        self.components.iter().map(ComponentParams::n_decays).collect()
    }

    /// Concatenated flat vector of all components.
    pub fn concat(&self) -> Array1<f64> {
        Array1::from_iter(self.components.iter().flat_map(ComponentParams::to_flat))
    }

    pub fn to_flat_vecs(&self) -> Vec<Vec<f64>> {
        self.components.iter().map(ComponentParams::to_flat).collect()
    }

    pub fn delays(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.delay).collect()
    }

    /// Compound value at `t` (sum over components).
    pub fn eval(&self, t: f64) -> f64 {
        self.components.iter().map(|c| c.eval(t)).sum()
    }
}

/// Number of decays implied by a flat component length.
pub fn n_decays_for_len(component: usize, len: usize) -> EpscatResult<usize> {
    if len < 5 || (len - 3) % 2 != 0 {
        let expected = if len < 5 { 5 } else { len + 1 };
        return Err(EpscatError::InvalidParamLength { component, expected, actual: len });
    }
    Ok((len - 3) / 2)
}

/// Default coefficient names for a component with `n_decays` decays.
pub fn default_coefficient_names(n_decays: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(2 * n_decays + 3);
    for i in 1..=n_decays {
        names.push(format!("a_{i}"));
        names.push(format!("d_{i}"));
    }
    names.extend(["o".to_string(), "r".to_string(), "x0".to_string()]);
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Flat layout is decay pairs first, then offset, rise, delay.
    fn from_flat_reads_decay_pairs_first() {
        let c = ComponentParams::from_flat(0, &[1.0, 0.05, 0.2, 0.01, 0.0, 0.002, 0.1])
            .expect("two decays");
        assert_eq!(c.decays, vec![(1.0, 0.05), (0.2, 0.01)]);
        assert_eq!((c.offset, c.rise_tau, c.delay), (0.0, 0.002, 0.1));
        assert_eq!(c.to_flat().len(), 7);
    }

    #[test]
    fn from_flat_rejects_even_or_short_lengths() {
        assert!(ComponentParams::from_flat(0, &[1.0, 2.0, 3.0, 4.0]).is_err());
        assert!(ComponentParams::from_flat(1, &[1.0; 6]).is_err());
    }

    #[test]
    // Purpose
    // -------
    // Before the delay the component equals its offset; with no rise the
    // value at the delay is offset + Σ aᵢ.
    fn eval_respects_delay_and_instantaneous_rise() {
        let c = ComponentParams { decays: vec![(2.0, 0.1)], offset: 0.5, rise_tau: 0.0, delay: 1.0 };
        assert_eq!(c.eval(0.9), 0.5);
        assert!((c.eval(1.0) - 2.5).abs() < 1e-12);
        assert!((c.eval(1.1) - (0.5 + 2.0 * (-1.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Analytic partials agree with central differences away from the kink.
    fn partials_match_central_differences() {
        let base = vec![1.5, 0.05, 0.4, 0.2, 0.1, 0.01, 0.3];
        let c = ComponentParams::from_flat(0, &base).expect("two decays");
        let t = 0.37;
        let mut g = vec![0.0; base.len()];
        c.partials(t, &mut g);

        let h = 1e-7;
        for j in 0..base.len() {
            let mut up = base.clone();
            let mut dn = base.clone();
            up[j] += h;
            dn[j] -= h;
            let fu = ComponentParams::from_flat(0, &up).expect("ok").eval(t);
            let fd = ComponentParams::from_flat(0, &dn).expect("ok").eval(t);
            let numeric = (fu - fd) / (2.0 * h);
            assert!((g[j] - numeric).abs() < 1e-5, "parameter {j}: {} vs {numeric}", g[j]);
        }
    }

    #[test]
    fn concat_round_trips_through_layout() {
        let p = CompoundParams::from_flat_vecs(&[
            vec![1.0, 0.05, 0.0, 0.002, 0.1],
            vec![0.5, 0.02, 0.3, 0.2, 0.0, 0.001, 0.3],
        ])
        .expect("valid components");
        let flat = p.concat();
        assert_eq!(flat.len(), 12);
        let back = CompoundParams::from_concat(&p.layout(), flat.view()).expect("same layout");
        assert_eq!(back, p);
        assert_eq!(back.delays(), vec![0.1, 0.3]);
        assert!(CompoundParams::from_concat(&[1], array![1.0, 2.0].view()).is_err());
    }
}
