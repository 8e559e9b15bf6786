//! adam — moment-based adaptive optimizers with global-norm clipping.
//!
//! Purpose
//! -------
//! Provide the two optimizers driven by the ES-RNN training loop: a dense
//! [`Adam`] instance over the flattened recurrent-network parameters and a
//! row-wise [`RowAdam`] instance over the per-series exponential-smoothing
//! table, where each series only ever updates its own row.
//!
//! Key behaviors
//! -------------
//! - Gradients are validated (dimension, finiteness) before any state is
//!   touched; a rejected gradient leaves moments and parameters unchanged.
//! - Gradients whose L2 norm exceeds the clip threshold are rescaled to the
//!   threshold before the moment updates.
//! - Updates use bias-corrected first/second moments:
//!   `θ ← θ − lr · m̂ / (sqrt(v̂) + ε)`.
//! - [`RowAdam`] keeps one step counter per row, so bias correction for a
//!   row depends only on how many times that row has been updated.
//!
//! Invariants & assumptions
//! ------------------------
//! - Options are validated at construction ([`AdamOptions::new`]); learning
//!   rate changes go through [`Adam::set_learning_rate`] /
//!   [`RowAdam::set_learning_rate`] and are validated the same way.
//! - Candidate parameters are checked for finiteness before being written
//!   back, so a failed step never leaves a partially-updated vector.
//!
//! Conventions
//! -----------
//! - Parameters are passed as mutable views so callers can keep them inside
//!   their own containers (flat weight vectors, table rows).
//! - Moment defaults follow the usual `β₁ = 0.9`, `β₂ = 0.999`.
//!
//! Testing notes
//! -------------
//! - Unit tests cover clipping, the first-step magnitude identity
//!   (`|Δθ| ≈ lr` for a non-zero gradient), row isolation, and rejection of
//!   invalid gradients without side effects.
use crate::optimization::{
    errors::{OptError, OptResult},
    validation::{
        validate_grad, validate_theta, verify_beta, verify_clip_threshold, verify_epsilon,
        verify_learning_rate,
    },
};
use argmin_math::ArgminL2Norm;
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, Zip};

/// Default first-moment decay.
pub const DEFAULT_BETA1: f64 = 0.9;
/// Default second-moment decay.
pub const DEFAULT_BETA2: f64 = 0.999;

/// AdamOptions — validated hyper-parameters for one optimizer instance.
///
/// Fields
/// ------
/// - `learning_rate`: step size (> 0, finite).
/// - `beta1`, `beta2`: moment decay rates in `[0, 1)`.
/// - `epsilon`: denominator offset (> 0, finite).
/// - `clip_threshold`: global L2-norm clip (> 0, finite).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamOptions {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    pub clip_threshold: f64,
}

impl AdamOptions {
    /// Construct options with default moment decays.
    ///
    /// # Errors
    /// - [`OptError::InvalidLearningRate`], [`OptError::InvalidEpsilon`], or
    ///   [`OptError::InvalidClipThreshold`] when the respective value is
    ///   non-finite or not strictly positive.
    pub fn new(learning_rate: f64, epsilon: f64, clip_threshold: f64) -> OptResult<Self> {
        verify_learning_rate(learning_rate)?;
        verify_epsilon(epsilon)?;
        verify_clip_threshold(clip_threshold)?;
        Ok(Self {
            learning_rate,
            beta1: DEFAULT_BETA1,
            beta2: DEFAULT_BETA2,
            epsilon,
            clip_threshold,
        })
    }

    /// Replace the moment decay rates.
    ///
    /// # Errors
    /// - [`OptError::InvalidBeta`] unless both rates lie in `[0, 1)`.
    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> OptResult<Self> {
        verify_beta(beta1)?;
        verify_beta(beta2)?;
        self.beta1 = beta1;
        self.beta2 = beta2;
        Ok(self)
    }
}

/// Rescale `grad` so its L2 norm does not exceed `threshold`.
///
/// Returns the norm measured before clipping.
pub fn clip_global_norm(grad: &mut Array1<f64>, threshold: f64) -> f64 {
    let norm: f64 = grad.l2_norm();
    if norm > threshold {
        let scale = threshold / norm;
        grad.mapv_inplace(|g| g * scale);
    }
    norm
}

/// Shared bias-corrected update on views.
///
/// `step` is the 1-based count of updates applied to these moments,
/// including the current one.
fn adam_update(
    options: &AdamOptions, mut theta: ArrayViewMut1<f64>, mut m: ArrayViewMut1<f64>,
    mut v: ArrayViewMut1<f64>, grad: ArrayView1<f64>, step: u64,
) -> OptResult<()> {
    let dim = theta.len();
    validate_grad(grad, dim)?;
    let mut g = grad.to_owned();
    clip_global_norm(&mut g, options.clip_threshold);

    let (b1, b2) = (options.beta1, options.beta2);
    let new_m = &m * b1 + &g * (1.0 - b1);
    let new_v = &v * b2 + &g.mapv(|x| x * x) * (1.0 - b2);
    let exp = i32::try_from(step).unwrap_or(i32::MAX);
    let c1 = 1.0 - b1.powi(exp);
    let c2 = 1.0 - b2.powi(exp);

    let mut candidate = theta.to_owned();
    Zip::from(&mut candidate).and(&new_m).and(&new_v).for_each(|t, &mi, &vi| {
        let m_hat = mi / c1;
        let v_hat = vi / c2;
        *t -= options.learning_rate * m_hat / (v_hat.sqrt() + options.epsilon);
    });
    validate_theta(candidate.view())?;

    theta.assign(&candidate);
    m.assign(&new_m);
    v.assign(&new_v);
    Ok(())
}

/// Adam — dense optimizer over one flat parameter vector.
///
/// Holds first/second moment estimates of the same length as the parameter
/// vector and a global step counter.
#[derive(Debug, Clone)]
pub struct Adam {
    options: AdamOptions,
    m: Array1<f64>,
    v: Array1<f64>,
    t: u64,
}

impl Adam {
    /// Create an optimizer for a parameter vector of length `dim`.
    pub fn new(options: AdamOptions, dim: usize) -> Self {
        Self { options, m: Array1::zeros(dim), v: Array1::zeros(dim), t: 0 }
    }

    /// Apply one clipped Adam update to `theta`.
    ///
    /// # Errors
    /// - [`OptError::GradientDimMismatch`] if `grad` or `theta` does not
    ///   match the optimizer dimension.
    /// - [`OptError::InvalidGradient`] for non-finite gradient entries.
    /// - [`OptError::NonFiniteParameter`] if the update would produce a
    ///   non-finite parameter.
    ///
    /// On error nothing is modified.
    pub fn step(&mut self, theta: ArrayViewMut1<f64>, grad: ArrayView1<f64>) -> OptResult<()> {
        if theta.len() != self.m.len() {
            return Err(OptError::GradientDimMismatch {
                expected: self.m.len(),
                found: theta.len(),
            });
        }
        adam_update(&self.options, theta, self.m.view_mut(), self.v.view_mut(), grad, self.t + 1)?;
        self.t += 1;
        Ok(())
    }

    pub fn learning_rate(&self) -> f64 {
        self.options.learning_rate
    }

    /// Change the step size, keeping the moment estimates.
    pub fn set_learning_rate(&mut self, learning_rate: f64) -> OptResult<()> {
        verify_learning_rate(learning_rate)?;
        self.options.learning_rate = learning_rate;
        Ok(())
    }

    /// Number of successful updates applied so far.
    pub fn steps(&self) -> u64 {
        self.t
    }
}

/// RowAdam — Adam over a table whose rows are updated independently.
///
/// Each row has its own moments and step counter; stepping row `r` never
/// touches the state of any other row.
#[derive(Debug, Clone)]
pub struct RowAdam {
    options: AdamOptions,
    m: Array2<f64>,
    v: Array2<f64>,
    t: Vec<u64>,
}

impl RowAdam {
    /// Create an optimizer for a `rows × cols` parameter table.
    pub fn new(options: AdamOptions, rows: usize, cols: usize) -> Self {
        Self {
            options,
            m: Array2::zeros((rows, cols)),
            v: Array2::zeros((rows, cols)),
            t: vec![0; rows],
        }
    }

    /// Apply one clipped Adam update to row `row` of the table.
    ///
    /// # Errors
    /// - [`OptError::RowOutOfRange`] if `row` is not a valid row index.
    /// - Any error of [`Adam::step`], with the same no-side-effect guarantee.
    pub fn step_row(
        &mut self, row: usize, theta_row: ArrayViewMut1<f64>, grad: ArrayView1<f64>,
    ) -> OptResult<()> {
        let rows = self.t.len();
        if row >= rows {
            return Err(OptError::RowOutOfRange { row, rows });
        }
        if theta_row.len() != self.m.ncols() {
            return Err(OptError::GradientDimMismatch {
                expected: self.m.ncols(),
                found: theta_row.len(),
            });
        }
        let step = self.t[row] + 1;
        adam_update(
            &self.options,
            theta_row,
            self.m.row_mut(row),
            self.v.row_mut(row),
            grad,
            step,
        )?;
        self.t[row] = step;
        Ok(())
    }

    pub fn learning_rate(&self) -> f64 {
        self.options.learning_rate
    }

    /// Change the step size, keeping the moment estimates.
    pub fn set_learning_rate(&mut self, learning_rate: f64) -> OptResult<()> {
        verify_learning_rate(learning_rate)?;
        self.options.learning_rate = learning_rate;
        Ok(())
    }

    /// Number of successful updates applied to `row`.
    pub fn row_steps(&self, row: usize) -> Option<u64> {
        self.t.get(row).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // Clipping, the first-step magnitude of Adam, row isolation of RowAdam,
    // and rejection of invalid gradients without side effects.
    // -------------------------------------------------------------------------

    fn options(lr: f64) -> AdamOptions {
        AdamOptions::new(lr, 1e-8, 20.0).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // `clip_global_norm` rescales only when the norm exceeds the threshold.
    //
    // Given
    // -----
    // - g = [3, 4] (norm 5) with thresholds 1 and 10.
    //
    // Expect
    // ------
    // - Threshold 1: g becomes [0.6, 0.8]; threshold 10: g unchanged.
    fn clip_global_norm_rescales_only_above_threshold() {
        let mut g = array![3.0, 4.0];
        let norm = clip_global_norm(&mut g, 10.0);
        assert!((norm - 5.0).abs() < 1e-12);
        assert_eq!(g, array![3.0, 4.0]);

        let norm = clip_global_norm(&mut g, 1.0);
        assert!((norm - 5.0).abs() < 1e-12);
        assert!((g[0] - 0.6).abs() < 1e-12 && (g[1] - 0.8).abs() < 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // The first bias-corrected Adam step moves each coordinate by about `lr`
    // against the gradient sign.
    //
    // Given
    // -----
    // - theta = [1, 1, 1], grad = [2, -0.5, 0], lr = 0.01.
    //
    // Expect
    // ------
    // - theta ≈ [0.99, 1.01, 1.0] and one recorded step.
    fn first_step_moves_by_learning_rate() {
        let mut theta = array![1.0, 1.0, 1.0];
        let grad = array![2.0, -0.5, 0.0];
        let mut adam = Adam::new(options(0.01), 3);
        adam.step(theta.view_mut(), grad.view()).unwrap();

        assert!((theta[0] - 0.99).abs() < 1e-6);
        assert!((theta[1] - 1.01).abs() < 1e-6);
        assert!((theta[2] - 1.0).abs() < 1e-12);
        assert_eq!(adam.steps(), 1);
    }

    #[test]
    // Purpose
    // -------
    // Repeated steps on a convex quadratic drive the parameter to its minimum.
    //
    // Given
    // -----
    // - f(θ) = (θ − 3)², θ₀ = 0, lr = 0.1, 500 steps.
    //
    // Expect
    // ------
    // - θ within 1e-2 of 3.
    fn adam_minimizes_a_quadratic() {
        let mut theta = array![0.0];
        let mut adam = Adam::new(options(0.1), 1);
        for _ in 0..500 {
            let grad = array![2.0 * (theta[0] - 3.0)];
            adam.step(theta.view_mut(), grad.view()).unwrap();
        }
        assert!((theta[0] - 3.0).abs() < 1e-2, "theta = {}", theta[0]);
    }

    #[test]
    // Purpose
    // -------
    // A non-finite gradient is rejected and leaves everything unchanged.
    //
    // Given
    // -----
    // - grad containing NaN.
    //
    // Expect
    // ------
    // - `InvalidGradient`, theta unchanged, step counter still 0.
    fn invalid_gradient_is_rejected_without_side_effects() {
        let mut theta = array![1.0, 2.0];
        let grad = array![0.5, f64::NAN];
        let mut adam = Adam::new(options(0.01), 2);
        let err = adam.step(theta.view_mut(), grad.view()).unwrap_err();
        assert!(matches!(err, OptError::InvalidGradient { index: 1, .. }));
        assert_eq!(theta, array![1.0, 2.0]);
        assert_eq!(adam.steps(), 0);
    }

    #[test]
    // Purpose
    // -------
    // RowAdam updates only the addressed row and counts steps per row.
    //
    // Given
    // -----
    // - A 3 × 2 table of ones; row 1 is stepped twice.
    //
    // Expect
    // ------
    // - Rows 0 and 2 unchanged, row 1 decreased, step counts [0, 2, 0];
    //   out-of-range rows are rejected.
    fn row_adam_isolates_rows() {
        let mut table = Array2::<f64>::ones((3, 2));
        let mut opt = RowAdam::new(options(0.05), 3, 2);
        let grad = array![1.0, 1.0];
        for _ in 0..2 {
            opt.step_row(1, table.row_mut(1), grad.view()).unwrap();
        }
        assert_eq!(table.row(0), array![1.0, 1.0]);
        assert_eq!(table.row(2), array![1.0, 1.0]);
        assert!(table[[1, 0]] < 1.0 && table[[1, 1]] < 1.0);
        assert_eq!(opt.row_steps(0), Some(0));
        assert_eq!(opt.row_steps(1), Some(2));

        let mut spare = array![0.0, 0.0];
        assert_eq!(
            opt.step_row(3, spare.view_mut(), grad.view()),
            Err(OptError::RowOutOfRange { row: 3, rows: 3 })
        );
    }

    #[test]
    fn set_learning_rate_validates_input() {
        let mut adam = Adam::new(options(0.01), 1);
        assert!(adam.set_learning_rate(-1.0).is_err());
        adam.set_learning_rate(0.005).unwrap();
        assert_eq!(adam.learning_rate(), 0.005);
    }
}
