//! ExponentialSmoother — per-series level/seasonality state-space model.
//!
//! Purpose
//! -------
//! Own the per-series smoothing parameters of the ES-RNN forecaster and run
//! the multiplicative Holt–Winters style recursion that produces level and
//! seasonal trajectories, plus the analytic reverse-mode pass that maps
//! trajectory gradients back to the parameters.
//!
//! Key behaviors
//! -------------
//! - Parameters live in one contiguous table with a row per series id:
//!   column 0 is the level-smoothing logit, column 1 the seasonality logit,
//!   columns `2..2 + p` the log initial seasonal factors. All entries start
//!   at 0.5.
//! - [`es_forward`] evaluates, with `α = σ(row[0])`, `γ = σ(row[1])`,
//!   `S[k] = exp(row[2 + k])` for `k < p`:
//!
//!   ```text
//!   S[p]   = S[0]
//!   L[0]   = y[0] / S[0]
//!   L[t]   = α · y[t] / S[t] + (1 − α) · L[t − 1]        (t ≥ 1)
//!   S[t+p] = γ · y[t] / L[t] + (1 − γ) · S[t]            (t ≥ 1)
//!   d[t−1] = ln L[t] − ln L[t − 1]
//!   ```
//!
//!   and, when `h > p`, continues the seasonal sequence cyclically with
//!   `S[n + p + j] = S[n + j]` for `j < h − p`.
//! - [`es_backward`] is the exact reverse pass of [`es_forward`] for
//!   upstream gradients with respect to `ln L` and `ln S`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Observations are finite and strictly positive (enforced by
//!   `SeriesRecord`), so every level and seasonal factor is strictly
//!   positive.
//! - `seasonalities.len() == n + max(p, h)` and `levels.len() == n`.
//! - The table row count is fixed at construction; ids beyond it are
//!   rejected.
//!
//! Conventions
//! -----------
//! - Index `t` of `levels` aligns with index `t` of the observations;
//!   index `t` of `seasonalities` is the factor applied at time `t`.
//! - The recursion is a pure function of one row and one series.
//!
//! Testing notes
//! -------------
//! - Unit tests cover positivity, normalize/denormalize round trips, the
//!   cyclic seasonal extension, and agreement of [`es_backward`] with
//!   `finitediff` central differences.
use crate::{
    esrnn::{
        core::series::SeriesRecord,
        errors::{EsrnnError, EsrnnResult},
    },
    optimization::numerical_stability::{logistic_deriv, safe_logistic},
};
use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1};
use serde::{Deserialize, Serialize};

/// Initial value of every smoothing parameter.
pub const INITIAL_PARAMETER: f64 = 0.5;

/// Column of the level-smoothing logit.
pub const LEVEL_COLUMN: usize = 0;
/// Column of the seasonality-smoothing logit.
pub const SEASON_COLUMN: usize = 1;
/// First column of the log initial seasonal factors.
pub const INIT_SEASON_COLUMN: usize = 2;

/// Level and seasonal trajectories of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct EsTrajectory {
    pub level_sms: f64,
    pub season_sms: f64,
    pub levels: Array1<f64>,
    pub seasonalities: Array1<f64>,
    pub log_level_diffs: Array1<f64>,
}

/// Run the smoothing recursion for one parameter row.
///
/// Parameters
/// ----------
/// - `params`: `(logit_level, logit_season, s₀[0..p])`.
/// - `y`: strictly positive observations, `n ≥ 1`.
/// - `seasonality`: period `p ≥ 1`.
/// - `horizon`: output horizon `h`.
///
/// Returns
/// -------
/// The trajectory with `levels.len() == n` and
/// `seasonalities.len() == n + max(p, h)`.
pub fn es_forward(
    params: ArrayView1<f64>, y: ArrayView1<f64>, seasonality: usize, horizon: usize,
) -> EsTrajectory {
    let n = y.len();
    let p = seasonality;
    let alpha = safe_logistic(params[LEVEL_COLUMN]);
    let gamma = safe_logistic(params[SEASON_COLUMN]);

    let mut seasonalities = Array1::zeros(n + p.max(horizon));
    for k in 0..p {
        seasonalities[k] = params[INIT_SEASON_COLUMN + k].exp();
    }
    seasonalities[p] = seasonalities[0];

    let mut levels = Array1::zeros(n);
    let mut log_level_diffs = Array1::zeros(n.saturating_sub(1));
    levels[0] = y[0] / seasonalities[0];
    for t in 1..n {
        let level = alpha * y[t] / seasonalities[t] + (1.0 - alpha) * levels[t - 1];
        levels[t] = level;
        seasonalities[t + p] = gamma * y[t] / level + (1.0 - gamma) * seasonalities[t];
        log_level_diffs[t - 1] = level.ln() - levels[t - 1].ln();
    }

    for j in 0..horizon.saturating_sub(p) {
        seasonalities[n + p + j] = seasonalities[n + j];
    }

    EsTrajectory { level_sms: alpha, season_sms: gamma, levels, seasonalities, log_level_diffs }
}

/// Reverse pass of [`es_forward`].
///
/// Parameters
/// ----------
/// - `y`, `seasonality`, `horizon`: as passed to [`es_forward`].
/// - `traj`: the trajectory returned by that call.
/// - `g_ln_levels`: `∂loss/∂ ln L[t]`, length `n`.
/// - `g_ln_seasons`: `∂loss/∂ ln S[k]`, length `n + max(p, h)`.
///
/// Returns
/// -------
/// `∂loss/∂params`, length `2 + p`.
pub fn es_backward(
    y: ArrayView1<f64>, seasonality: usize, horizon: usize, traj: &EsTrajectory,
    g_ln_levels: ArrayView1<f64>, g_ln_seasons: ArrayView1<f64>,
) -> Array1<f64> {
    let n = y.len();
    let p = seasonality;
    let alpha = traj.level_sms;
    let gamma = traj.season_sms;
    let levels = &traj.levels;
    let seasons = &traj.seasonalities;

    let mut g_l = &g_ln_levels / levels;
    let mut g_s = &g_ln_seasons / seasons;
    let mut g_alpha = 0.0;
    let mut g_gamma = 0.0;

    for j in (0..horizon.saturating_sub(p)).rev() {
        let carried = g_s[n + p + j];
        g_s[n + j] += carried;
    }

    for t in (1..n).rev() {
        let g = g_s[t + p];
        g_gamma += g * (y[t] / levels[t] - seasons[t]);
        g_l[t] -= g * gamma * y[t] / (levels[t] * levels[t]);
        g_s[t] += g * (1.0 - gamma);

        let g = g_l[t];
        g_alpha += g * (y[t] / seasons[t] - levels[t - 1]);
        g_s[t] -= g * alpha * y[t] / (seasons[t] * seasons[t]);
        g_l[t - 1] += g * (1.0 - alpha);
    }

    let rotated = g_s[p];
    g_s[0] += rotated;
    g_s[0] -= g_l[0] * y[0] / (seasons[0] * seasons[0]);

    let mut grad = Array1::zeros(INIT_SEASON_COLUMN + p);
    grad[LEVEL_COLUMN] = g_alpha * logistic_deriv(alpha);
    grad[SEASON_COLUMN] = g_gamma * logistic_deriv(gamma);
    for k in 0..p {
        grad[INIT_SEASON_COLUMN + k] = g_s[k] * seasons[k];
    }
    grad
}

/// Fold gradients with respect to the log-level differences into
/// gradients with respect to `ln L`.
pub fn accumulate_log_diff_grad(g_ln_levels: &mut Array1<f64>, g_log_diffs: ArrayView1<f64>) {
    for (j, &g) in g_log_diffs.iter().enumerate() {
        g_ln_levels[j + 1] += g;
        g_ln_levels[j] -= g;
    }
}

/// ExponentialSmoother — id-indexed table of smoothing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExponentialSmoother {
    seasonality: usize,
    output_horizon: usize,
    params: Array2<f64>,
}

impl ExponentialSmoother {
    /// Create a table with `num_series` rows, every entry at 0.5.
    pub fn new(num_series: usize, seasonality: usize, output_horizon: usize) -> Self {
        Self {
            seasonality,
            output_horizon,
            params: Array2::from_elem(
                (num_series, INIT_SEASON_COLUMN + seasonality),
                INITIAL_PARAMETER,
            ),
        }
    }

    pub fn seasonality(&self) -> usize {
        self.seasonality
    }

    pub fn output_horizon(&self) -> usize {
        self.output_horizon
    }

    pub fn num_series(&self) -> usize {
        self.params.nrows()
    }

    /// Width of one parameter row, `2 + p`.
    pub fn row_len(&self) -> usize {
        self.params.ncols()
    }

    pub fn params(&self) -> &Array2<f64> {
        &self.params
    }

    /// Replace the whole table.
    ///
    /// # Errors
    /// - [`EsrnnError::ShapeMismatch`] when the new table does not have the
    ///   current shape.
    pub fn set_params(&mut self, params: Array2<f64>) -> EsrnnResult<()> {
        if params.nrows() != self.params.nrows() {
            return Err(EsrnnError::ShapeMismatch {
                what: "smoothing table rows",
                expected: self.params.nrows(),
                found: params.nrows(),
            });
        }
        if params.ncols() != self.params.ncols() {
            return Err(EsrnnError::ShapeMismatch {
                what: "smoothing table columns",
                expected: self.params.ncols(),
                found: params.ncols(),
            });
        }
        self.params = params;
        Ok(())
    }

    /// Parameter row of series `id`.
    ///
    /// # Errors
    /// - [`EsrnnError::SeriesCountExceeded`] when `id` has no row.
    pub fn row(&self, id: usize) -> EsrnnResult<ArrayView1<'_, f64>> {
        self.check_id(id)?;
        Ok(self.params.row(id))
    }

    /// Mutable parameter row of series `id`.
    pub fn row_mut(&mut self, id: usize) -> EsrnnResult<ArrayViewMut1<'_, f64>> {
        self.check_id(id)?;
        Ok(self.params.row_mut(id))
    }

    /// `(α_level, α_season)` of series `id`.
    pub fn smoothing_coefficients(&self, id: usize) -> EsrnnResult<(f64, f64)> {
        let row = self.row(id)?;
        Ok((safe_logistic(row[LEVEL_COLUMN]), safe_logistic(row[SEASON_COLUMN])))
    }

    /// Level and seasonal trajectories of a record.
    pub fn compute(&self, record: &SeriesRecord) -> EsrnnResult<EsTrajectory> {
        let row = self.row(record.id)?;
        Ok(es_forward(row, record.y.view(), self.seasonality, self.output_horizon))
    }

    /// Parameter gradient of a record's row for upstream `ln L`/`ln S`
    /// gradients.
    pub fn backward(
        &self, record: &SeriesRecord, traj: &EsTrajectory, g_ln_levels: ArrayView1<f64>,
        g_ln_seasons: ArrayView1<f64>,
    ) -> EsrnnResult<Array1<f64>> {
        self.check_id(record.id)?;
        if g_ln_levels.len() != traj.levels.len() {
            return Err(EsrnnError::ShapeMismatch {
                what: "level gradient",
                expected: traj.levels.len(),
                found: g_ln_levels.len(),
            });
        }
        if g_ln_seasons.len() != traj.seasonalities.len() {
            return Err(EsrnnError::ShapeMismatch {
                what: "seasonality gradient",
                expected: traj.seasonalities.len(),
                found: g_ln_seasons.len(),
            });
        }
        Ok(es_backward(
            record.y.view(),
            self.seasonality,
            self.output_horizon,
            traj,
            g_ln_levels,
            g_ln_seasons,
        ))
    }

    fn check_id(&self, id: usize) -> EsrnnResult<()> {
        if id >= self.params.nrows() {
            return Err(EsrnnError::SeriesCountExceeded {
                found: id + 1,
                capacity: self.params.nrows(),
            });
        }
        Ok(())
    }
}
