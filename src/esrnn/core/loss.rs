//! Loss functions — pinball loss, level-variability penalty, and gradients.
//!
//! Purpose
//! -------
//! Provide the scalar training objectives of the ES-RNN forecaster together
//! with their (sub)gradients, so the training loop can back-propagate them
//! through the network and the smoothing recursion.
//!
//! Key behaviors
//! -------------
//! - [`pinball_loss`]: `mean(max(τ·u, (τ − 1)·u))` with `u = y − ŷ`.
//! - [`pinball_grad`]: subgradient with respect to `ŷ`; at `u = 0` the
//!   `−τ/h` branch is taken.
//! - [`level_variability_loss`]: `penalty · mean((d[t+1] − d[t])²)` over
//!   the log-level differences `d`, zero when fewer than two exist.
//! - [`level_variability_grad`]: gradient with respect to `d`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `target.len() == pred.len() > 0`; callers guarantee this.
//! - `τ ∈ (0, 1)` (validated in the configuration).
use ndarray::{Array1, ArrayView1, Zip};

/// Mean pinball (quantile) loss between `target` and `pred` at quantile `tau`.
pub fn pinball_loss(target: ArrayView1<f64>, pred: ArrayView1<f64>, tau: f64) -> f64 {
    let mut acc = 0.0;
    Zip::from(&target).and(&pred).for_each(|&y, &yhat| {
        let u = y - yhat;
        acc += (tau * u).max((tau - 1.0) * u);
    });
    acc / target.len() as f64
}

/// Subgradient of [`pinball_loss`] with respect to `pred`.
pub fn pinball_grad(target: ArrayView1<f64>, pred: ArrayView1<f64>, tau: f64) -> Array1<f64> {
    let scale = 1.0 / target.len() as f64;
    Zip::from(&target).and(&pred).map_collect(|&y, &yhat| {
        if y - yhat >= 0.0 { -tau * scale } else { (1.0 - tau) * scale }
    })
}

/// Level-variability penalty over log-level differences.
pub fn level_variability_loss(log_diffs: ArrayView1<f64>, penalty: f64) -> f64 {
    let m = log_diffs.len();
    if m < 2 || penalty <= 0.0 {
        return 0.0;
    }
    let sum: f64 = log_diffs.windows(2).into_iter().map(|w| (w[1] - w[0]).powi(2)).sum();
    penalty * sum / (m - 1) as f64
}

/// Gradient of [`level_variability_loss`] with respect to `log_diffs`.
pub fn level_variability_grad(log_diffs: ArrayView1<f64>, penalty: f64) -> Array1<f64> {
    let m = log_diffs.len();
    let mut grad = Array1::zeros(m);
    if m < 2 || penalty <= 0.0 {
        return grad;
    }
    let coef = 2.0 * penalty / (m - 1) as f64;
    for j in 0..m - 1 {
        let e = log_diffs[j + 1] - log_diffs[j];
        grad[j + 1] += coef * e;
        grad[j] -= coef * e;
    }
    grad
}
