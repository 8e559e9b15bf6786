//! training — per-series forward/backward pass and the two-optimizer update.
//!
//! Purpose
//! -------
//! Evaluate the ES-RNN objective for one series and compute its exact
//! gradient with respect to the shared network weights and the series' own
//! smoothing row, then apply one clipped Adam update to each parameter
//! collection, reporting numerical failures as typed outcomes instead of
//! errors.
//!
//! Key behaviors
//! -------------
//! - For every window end `i ∈ [w − 1, n − h)`:
//!   input `x = ln y[i−w+1 ..= i] − ln S[same] − ln L[i]` (+ noise, then
//!   the exogenous vector), target `ln y[i+1 ..= i+h] − ln S[same] − ln L[i]`,
//!   and pinball loss at the training quantile.
//! - Series loss = mean window loss + level-variability penalty +
//!   cell-state penalty.
//! - Gradients flow from the pinball loss into the network output and the
//!   target, from the network input back into `ln S` / `ln L`, and from
//!   there through the smoothing recursion into the series' row.
//! - [`train_series`] checks loss, gradients, and trajectory minima before
//!   stepping; any violation yields [`SeriesUpdate::Failed`] and neither
//!   optimizer steps.
//!
//! Invariants & assumptions
//! ------------------------
//! - Records contain strictly positive observations, so every logarithm
//!   above is finite for finite parameters.
//! - Both gradients are validated before either optimizer is stepped, so a
//!   series update is all-or-nothing.
//!
//! Conventions
//! -----------
//! - Noise is drawn from the caller's RNG only when a noise distribution is
//!   supplied (training); prediction never passes one.
use crate::{
    esrnn::{
        core::{
            config::EsrnnConfig,
            loss::{level_variability_grad, level_variability_loss, pinball_grad, pinball_loss},
            recurrent::{RecurrentCursor, RecurrentForecaster, RnnWeights},
            series::SeriesRecord,
            smoother::{EsTrajectory, ExponentialSmoother, accumulate_log_diff_grad},
        },
        errors::EsrnnResult,
    },
    optimization::{
        adam::{Adam, RowAdam},
        validation::validate_grad,
    },
};
use ndarray::{Array1, ArrayView1, s};
use rand::{Rng, distributions::Distribution};
use statrs::{distribution::Normal, statistics::Statistics};
use std::time::Duration;

/// Loss components of one series.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeriesLoss {
    pub forecast: f64,
    pub level_variability: f64,
    pub state: f64,
}

impl SeriesLoss {
    pub fn total(&self) -> f64 {
        self.forecast + self.level_variability + self.state
    }

    pub fn is_finite(&self) -> bool {
        self.forecast.is_finite() && self.level_variability.is_finite() && self.state.is_finite()
    }
}

/// Everything needed to diagnose a failed series update.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureDiagnostic {
    pub series_id: String,
    pub values: Array1<f64>,
    pub levels: Array1<f64>,
    pub min_level: f64,
    pub seasonalities: Array1<f64>,
    pub min_seasonality: f64,
    pub loss: SeriesLoss,
    pub level_sms: f64,
    pub season_sms: f64,
    pub reason: &'static str,
}

/// Outcome of one series update.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesUpdate {
    Updated(SeriesLoss),
    Failed(Box<FailureDiagnostic>),
}

/// Per-epoch bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    pub epoch: usize,
    pub mean_forecast_loss: f64,
    pub mean_level_variability_loss: f64,
    pub updated_series: usize,
    pub failed_series: usize,
    pub learning_rate: f64,
    pub holdout_loss: Option<f64>,
    pub elapsed: Duration,
}

/// Summary of a full training run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FitReport {
    pub epochs: Vec<EpochSummary>,
}

impl FitReport {
    pub fn last_epoch(&self) -> Option<&EpochSummary> {
        self.epochs.last()
    }

    pub fn total_failures(&self) -> usize {
        self.epochs.iter().map(|e| e.failed_series).sum()
    }
}

/// Result of a forward/backward pass over one series.
#[derive(Debug, Clone)]
pub struct SeriesPass {
    pub loss: SeriesLoss,
    pub trajectory: EsTrajectory,
    pub rnn_grad: RnnWeights,
    pub es_grad: Array1<f64>,
    pub windows: usize,
}

/// Normalized network input for the window ending at `end`.
///
/// `ln y[end−w+1 ..= end] − ln S[same] − ln L[end]` followed by `exogenous`.
pub fn window_input(
    y: ArrayView1<f64>, traj: &EsTrajectory, end: usize, w: usize, exogenous: ArrayView1<f64>,
) -> Array1<f64> {
    let start = end + 1 - w;
    let ln_level = traj.levels[end].ln();
    let mut input = Array1::zeros(w + exogenous.len());
    for j in 0..w {
        input[j] = y[start + j].ln() - traj.seasonalities[start + j].ln() - ln_level;
    }
    input.slice_mut(s![w..]).assign(&exogenous);
    input
}

/// Normalized target block following the window ending at `end`.
pub fn window_target(
    y: ArrayView1<f64>, traj: &EsTrajectory, end: usize, h: usize,
) -> Array1<f64> {
    let ln_level = traj.levels[end].ln();
    Array1::from_shape_fn(h, |k| {
        y[end + 1 + k].ln() - traj.seasonalities[end + 1 + k].ln() - ln_level
    })
}

/// Forward and backward pass of the ES-RNN objective for one series.
///
/// Parameters
/// ----------
/// - `smoother`, `rnn`: current parameters (not modified).
/// - `record`: the series.
/// - `config`: window sizes, quantile, and penalties.
/// - `noise`: optional input-noise distribution; samples come from `rng`.
///
/// Returns
/// -------
/// Loss components, the smoothing trajectory, and both gradients.
///
/// Errors
/// ------
/// - Shape and id errors from the smoother or the network.
pub fn forward_backward<R: Rng + ?Sized>(
    smoother: &ExponentialSmoother, rnn: &RecurrentForecaster, record: &SeriesRecord,
    config: &EsrnnConfig, noise: Option<&Normal>, rng: &mut R,
) -> EsrnnResult<SeriesPass> {
    let w = config.data.input_window_size;
    let h = config.data.output_horizon_size;
    let tau = config.training_quantile;
    let y = record.y.view();
    let traj = smoother.compute(record)?;

    let ends: Vec<usize> = record.window_ends(w, h).collect();
    let windows = ends.len();
    let mut cursor = RecurrentCursor::new();
    let mut output_grads = Vec::with_capacity(windows);
    let mut forecast_loss = 0.0;
    let scale = if windows > 0 { 1.0 / windows as f64 } else { 0.0 };

    for &i in &ends {
        let mut input = window_input(y, &traj, i, w, record.exogenous.view());
        if let Some(dist) = noise {
            input.slice_mut(s![..w]).mapv_inplace(|v| v + dist.sample(rng));
        }
        let output = rnn.step(&mut cursor, input.view());
        let target = window_target(y, &traj, i, h);
        forecast_loss += pinball_loss(target.view(), output.view(), tau) * scale;
        output_grads.push(pinball_grad(target.view(), output.view(), tau) * scale);
    }

    let lv_penalty = config.train.level_variability_penalty;
    let level_variability = level_variability_loss(traj.log_level_diffs.view(), lv_penalty);
    let state_penalty = config.train.state_penalty;
    let state = rnn.cell_state_penalty(&cursor, state_penalty);

    let (rnn_grad, input_grads) = rnn.backward(&cursor, &output_grads, state_penalty)?;

    let mut g_ln_levels = Array1::zeros(traj.levels.len());
    let mut g_ln_seasons = Array1::zeros(traj.seasonalities.len());
    for (k, &i) in ends.iter().enumerate() {
        let start = i + 1 - w;
        for j in 0..w {
            let g = input_grads[k][j];
            g_ln_seasons[start + j] -= g;
            g_ln_levels[i] -= g;
        }
        // ∂loss/∂target = −∂loss/∂output for the pinball loss.
        for (q, &g_out) in output_grads[k].iter().enumerate() {
            g_ln_seasons[i + 1 + q] += g_out;
            g_ln_levels[i] += g_out;
        }
    }
    if lv_penalty > 0.0 {
        let g_diffs = level_variability_grad(traj.log_level_diffs.view(), lv_penalty);
        accumulate_log_diff_grad(&mut g_ln_levels, g_diffs.view());
    }
    let es_grad = smoother.backward(record, &traj, g_ln_levels.view(), g_ln_seasons.view())?;

    Ok(SeriesPass {
        loss: SeriesLoss { forecast: forecast_loss, level_variability, state },
        trajectory: traj,
        rnn_grad,
        es_grad,
        windows,
    })
}

fn diagnose(
    record: &SeriesRecord, pass: &SeriesPass, reason: &'static str,
) -> Box<FailureDiagnostic> {
    let traj = &pass.trajectory;
    Box::new(FailureDiagnostic {
        series_id: record.series_id.clone(),
        values: record.y.clone(),
        levels: traj.levels.clone(),
        min_level: Statistics::min(traj.levels.iter()),
        seasonalities: traj.seasonalities.clone(),
        min_seasonality: Statistics::min(traj.seasonalities.iter()),
        loss: pass.loss,
        level_sms: traj.level_sms,
        season_sms: traj.season_sms,
        reason,
    })
}

/// Reason a pass must not be applied, if any.
fn failure_reason(pass: &SeriesPass, rnn_grad: &Array1<f64>, threshold: f64) -> Option<&'static str> {
    if !pass.loss.is_finite() {
        return Some("non-finite loss");
    }
    let min_level = Statistics::min(pass.trajectory.levels.iter());
    if !(min_level >= threshold) {
        return Some("level below numeric threshold");
    }
    let min_season = Statistics::min(pass.trajectory.seasonalities.iter());
    if !(min_season >= threshold) {
        return Some("seasonality below numeric threshold");
    }
    if validate_grad(rnn_grad.view(), rnn_grad.len()).is_err() {
        return Some("non-finite recurrent gradient");
    }
    if validate_grad(pass.es_grad.view(), pass.es_grad.len()).is_err() {
        return Some("non-finite smoothing gradient");
    }
    None
}

/// Train on one series: forward/backward, checks, then one step of each
/// optimizer.
///
/// Returns
/// -------
/// - [`SeriesUpdate::Updated`] with the loss components when both
///   optimizers stepped.
/// - [`SeriesUpdate::Failed`] with a diagnostic when the loss, a gradient,
///   or a trajectory minimum is unusable; parameters are untouched.
///
/// Errors
/// ------
/// - Shape/id errors from the model components and optimizer errors on
///   already-validated gradients.
#[allow(clippy::too_many_arguments)]
pub fn train_series<R: Rng + ?Sized>(
    smoother: &mut ExponentialSmoother, rnn: &mut RecurrentForecaster, rnn_opt: &mut Adam,
    es_opt: &mut RowAdam, record: &SeriesRecord, config: &EsrnnConfig, noise: Option<&Normal>,
    rng: &mut R,
) -> EsrnnResult<SeriesUpdate> {
    let pass = forward_backward(smoother, rnn, record, config, noise, rng)?;
    let rnn_grad = pass.rnn_grad.to_flat();
    if let Some(reason) = failure_reason(&pass, &rnn_grad, config.train.numeric_threshold) {
        return Ok(SeriesUpdate::Failed(diagnose(record, &pass, reason)));
    }

    let mut theta = rnn.to_flat();
    rnn_opt.step(theta.view_mut(), rnn_grad.view())?;
    rnn.assign_flat(theta.view())?;
    es_opt.step_row(record.id, smoother.row_mut(record.id)?, pass.es_grad.view())?;
    Ok(SeriesUpdate::Updated(pass.loss))
}
