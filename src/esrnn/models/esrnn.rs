//! ES-RNN engine: data preparation, training loop, forecasting, hold-out
//! evaluation.
//!
//! Purpose
//! -------
//! Own the configuration, the per-series records, the smoothing table, the
//! shared recurrent network, and the seeded RNG, and expose the model
//! lifecycle `prepare → train → predict` (with `fit` = prepare + train).
//!
//! Key behaviors
//! -------------
//! - [`EsrnnModel::prepare`] keeps series with at least `min_series_length`
//!   valid observations, assigns dense ids in sorted series-id order, sets
//!   `max_num_series` to the number of kept series, and creates fresh
//!   parameters from the engine seed.
//! - [`EsrnnModel::train`] runs `max_epochs` epochs over the records in id
//!   order, decays both learning rates every `lr_decay_step` epochs and
//!   scores the hold-out blocks every `test_frequency` epochs.
//! - [`EsrnnModel::predict`] runs one noise-free step of a fresh recurrent
//!   cursor on the window anchored at the last observation of each series
//!   and forecasts `h` steps from it.
//!
//! Invariants & assumptions
//! ------------------------
//! - `records[k].id == k` and the smoothing table has one row per record.
//! - The RNG is re-seeded in `prepare`, so repeated fits of the same panel
//!   with the same seed produce identical parameters and forecasts.
//! - Failed series updates never abort training; they are counted and
//!   logged.
//!
//! Downstream usage
//! ----------------
//! - Build an [`EsrnnConfig`], create `EsrnnModel::new(config, seed)`, call
//!   `fit(&panel)` and then `predict()`.
//! - Checkpoints are handled by `save`/`load` (see the persistence module).
use crate::{
    esrnn::{
        core::{
            config::EsrnnConfig,
            loss::pinball_loss,
            panel::{ForecastRow, Panel},
            recurrent::{RecurrentCursor, RecurrentForecaster, RnnDims},
            series::SeriesRecord,
            smoother::ExponentialSmoother,
        },
        errors::{ConfigError, EsrnnError, EsrnnResult},
        models::training::{
            EpochSummary, FitReport, SeriesUpdate, train_series, window_input,
        },
    },
    optimization::adam::{Adam, AdamOptions, RowAdam},
};
use ndarray::Array1;
use rand::{SeedableRng, rngs::StdRng};
use statrs::distribution::Normal;
use std::{collections::HashSet, path::PathBuf, time::Instant};
use tracing::{error, info};

/// EsrnnModel — ES-RNN forecaster over a panel of series.
#[derive(Debug, Clone)]
pub struct EsrnnModel {
    pub(crate) config: EsrnnConfig,
    pub(crate) seed: u64,
    pub(crate) rng: StdRng,
    pub(crate) records: Vec<SeriesRecord>,
    pub(crate) smoother: Option<ExponentialSmoother>,
    pub(crate) rnn: Option<RecurrentForecaster>,
}

impl EsrnnModel {
    /// Create an unfitted engine.
    pub fn new(config: EsrnnConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            rng: StdRng::seed_from_u64(seed),
            records: Vec::new(),
            smoother: None,
            rnn: None,
        }
    }

    pub fn config(&self) -> &EsrnnConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn records(&self) -> &[SeriesRecord] {
        &self.records
    }

    /// External series ids in dense-id order.
    pub fn series_ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.series_id.as_str()).collect()
    }

    pub fn smoother(&self) -> Option<&ExponentialSmoother> {
        self.smoother.as_ref()
    }

    pub fn rnn(&self) -> Option<&RecurrentForecaster> {
        self.rnn.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.smoother.is_some() && self.rnn.is_some()
    }

    /// Build records and fresh parameters from a panel.
    ///
    /// Returns
    /// -------
    /// The number of series kept for training.
    ///
    /// Errors
    /// ------
    /// - [`EsrnnError::NoTrainableSeries`] when every series is dropped.
    /// - Record construction errors (e.g. a wrongly sized exogenous vector).
    pub fn prepare(&mut self, panel: &Panel) -> EsrnnResult<usize> {
        let min_length = self.config.min_series_length;
        let kept: HashSet<String> = panel.trainable_ids(min_length).into_iter().collect();
        if kept.is_empty() {
            return Err(EsrnnError::NoTrainableSeries { min_length });
        }

        let records = panel
            .sorted_series()
            .iter()
            .filter(|view| kept.contains(&view.unique_id))
            .enumerate()
            .map(|(id, view)| {
                SeriesRecord::from_view(id, view, panel.exogenous(&view.unique_id), &self.config)
            })
            .collect::<EsrnnResult<Vec<_>>>()?;

        let num_series = records.len();
        self.config.set_max_num_series(num_series);
        self.rng = StdRng::seed_from_u64(self.seed);
        self.smoother = Some(ExponentialSmoother::new(
            num_series,
            self.config.data.seasonality_period,
            self.config.data.output_horizon_size,
        ));
        let rnn = RecurrentForecaster::new(RnnDims::from_config(&self.config), &mut self.rng);
        info!(
            dataset = %self.config.dataset_name,
            num_series,
            rnn_params = rnn.num_params(),
            "prepared ES-RNN model"
        );
        self.rnn = Some(rnn);
        self.records = records;
        Ok(num_series)
    }

    /// `prepare` followed by `train`.
    pub fn fit(&mut self, panel: &Panel) -> EsrnnResult<FitReport> {
        self.prepare(panel)?;
        self.train()
    }

    /// Run the training loop on prepared records.
    ///
    /// Errors
    /// ------
    /// - [`EsrnnError::ModelNotFitted`] before `prepare`.
    /// - [`EsrnnError::Optimizer`] for invalid optimizer settings.
    /// - Shape errors from the model components.
    pub fn train(&mut self) -> EsrnnResult<FitReport> {
        let (Some(smoother), Some(rnn)) = (self.smoother.as_mut(), self.rnn.as_mut()) else {
            return Err(EsrnnError::ModelNotFitted);
        };
        let config = &self.config;
        let train = &config.train;

        let rnn_options = AdamOptions::new(
            train.learning_rate,
            train.gradient_epsilon,
            train.gradient_clip_threshold,
        )?;
        let es_options = AdamOptions::new(
            config.per_series_learning_rate(),
            train.gradient_epsilon,
            train.gradient_clip_threshold,
        )?;
        let mut rnn_opt = Adam::new(rnn_options, rnn.num_params());
        let mut es_opt = RowAdam::new(es_options, self.records.len(), smoother.row_len());
        let noise = if train.input_noise_std > 0.0 {
            Some(Normal::new(0.0, train.input_noise_std).map_err(|_| ConfigError::InvalidValue {
                key: "noise_std",
                value: train.input_noise_std,
                reason: "Noise standard deviation must be positive and finite.",
            })?)
        } else {
            None
        };

        info!(
            dataset = %config.dataset_name,
            num_series = self.records.len(),
            max_epochs = train.max_epochs,
            learning_rate = train.learning_rate,
            "training started"
        );
        let mut report = FitReport::default();
        for epoch in 1..=train.max_epochs {
            let started = Instant::now();
            let mut forecast = 0.0;
            let mut level_variability = 0.0;
            let mut updated = 0usize;
            let mut failed = 0usize;

            for record in &self.records {
                let update = train_series(
                    smoother,
                    rnn,
                    &mut rnn_opt,
                    &mut es_opt,
                    record,
                    config,
                    noise.as_ref(),
                    &mut self.rng,
                )?;
                match update {
                    SeriesUpdate::Updated(loss) => {
                        forecast += loss.forecast;
                        level_variability += loss.level_variability;
                        updated += 1;
                    }
                    SeriesUpdate::Failed(diag) => {
                        failed += 1;
                        error!(
                            series_id = %diag.series_id,
                            reason = diag.reason,
                            values = ?diag.values,
                            levels = ?diag.levels,
                            min_level = diag.min_level,
                            seasonalities = ?diag.seasonalities,
                            min_seasonality = diag.min_seasonality,
                            forecast_loss = diag.loss.forecast,
                            level_variability_loss = diag.loss.level_variability,
                            level_sms = diag.level_sms,
                            season_sms = diag.season_sms,
                            "series update failed"
                        );
                    }
                }
            }

            let denom = updated.max(1) as f64;
            let holdout_loss = if train.test_frequency > 0 && epoch % train.test_frequency == 0 {
                holdout_loss(smoother, rnn, &self.records, config)?
            } else {
                None
            };
            let summary = EpochSummary {
                epoch,
                mean_forecast_loss: forecast / denom,
                mean_level_variability_loss: level_variability / denom,
                updated_series: updated,
                failed_series: failed,
                learning_rate: rnn_opt.learning_rate(),
                holdout_loss,
                elapsed: started.elapsed(),
            };
            info!(
                epoch,
                forecast_loss = summary.mean_forecast_loss,
                level_variability_loss = summary.mean_level_variability_loss,
                failed_series = failed,
                elapsed_secs = summary.elapsed.as_secs_f64(),
                "epoch finished"
            );
            if let Some(score) = holdout_loss {
                info!(epoch, holdout_loss = score, "hold-out evaluation");
            }
            report.epochs.push(summary);

            if train.lr_decay_step > 0 && epoch % train.lr_decay_step == 0 {
                rnn_opt.set_learning_rate(rnn_opt.learning_rate() * train.lr_decay)?;
                es_opt.set_learning_rate(es_opt.learning_rate() * train.lr_decay)?;
                info!(epoch, learning_rate = rnn_opt.learning_rate(), "learning rate decayed");
            }
        }
        Ok(report)
    }

    /// Forecast `h` steps for every prepared series.
    ///
    /// Returns
    /// -------
    /// Rows ordered by series id, then increasing timestamp; timestamps
    /// start one sampling step after each series' last training timestamp.
    ///
    /// Errors
    /// ------
    /// - [`EsrnnError::ModelNotFitted`] before `prepare`/`fit`/`load`.
    /// - [`EsrnnError::TimestampOverflow`] when a forecast date leaves the
    ///   calendar range.
    pub fn predict(&self) -> EsrnnResult<Vec<ForecastRow>> {
        let (Some(smoother), Some(rnn)) = (self.smoother.as_ref(), self.rnn.as_ref()) else {
            return Err(EsrnnError::ModelNotFitted);
        };
        let h = self.config.data.output_horizon_size;
        let mut rows = Vec::with_capacity(self.records.len() * h);
        for record in &self.records {
            let values = forecast_series(smoother, rnn, record, &self.config)?;
            let stamps = self
                .config
                .frequency
                .horizon(record.last_timestamp, h)
                .ok_or(EsrnnError::TimestampOverflow { ds: record.last_timestamp })?;
            rows.extend(stamps.into_iter().zip(values).map(|(ds, y_hat)| ForecastRow {
                unique_id: record.series_id.clone(),
                ds,
                y_hat,
            }));
        }
        Ok(rows)
    }

    /// Mean pinball loss at `quantile` over series with a hold-out block.
    ///
    /// Returns `Ok(None)` when no series carries a hold-out block.
    pub fn evaluate_holdout(&self) -> EsrnnResult<Option<f64>> {
        let (Some(smoother), Some(rnn)) = (self.smoother.as_ref(), self.rnn.as_ref()) else {
            return Err(EsrnnError::ModelNotFitted);
        };
        holdout_loss(smoother, rnn, &self.records, &self.config)
    }

    /// Checkpoint directory
    /// `{output_directory}/{dataset_name}/num_series_{N}_lr_{rate}_{copy}`.
    pub fn model_dir(&self) -> PathBuf {
        let cfg = &self.config;
        cfg.data.output_directory.join(&cfg.dataset_name).join(format!(
            "num_series_{}_lr_{}_{}",
            cfg.data.max_num_series, cfg.train.learning_rate, cfg.copy
        ))
    }
}

/// Raw-scale `h`-step forecast of one series.
///
/// A single step of a fresh recurrent cursor on the window ending at the
/// last observation produces `exp(o) · S[n .. n+h] · L[n−1]`.
///
/// Errors
/// ------
/// - [`EsrnnError::SeriesTooShort`] when the series is shorter than one
///   input window.
pub fn forecast_series(
    smoother: &ExponentialSmoother, rnn: &RecurrentForecaster, record: &SeriesRecord,
    config: &EsrnnConfig,
) -> EsrnnResult<Array1<f64>> {
    let w = config.data.input_window_size;
    let h = config.data.output_horizon_size;
    let n = record.len();
    if n < w {
        return Err(EsrnnError::SeriesTooShort {
            series_id: record.series_id.clone(),
            len: n,
            min: w,
        });
    }
    let y = record.y.view();
    let exogenous = record.exogenous.view();
    let traj = smoother.compute(record)?;

    let last = n - 1;
    let output =
        rnn.step(&mut RecurrentCursor::new(), window_input(y, &traj, last, w, exogenous).view());
    let level = traj.levels[last];
    Ok(Array1::from_shape_fn(h, |k| output[k].exp() * traj.seasonalities[n + k] * level))
}

fn holdout_loss(
    smoother: &ExponentialSmoother, rnn: &RecurrentForecaster, records: &[SeriesRecord],
    config: &EsrnnConfig,
) -> EsrnnResult<Option<f64>> {
    let mut total = 0.0;
    let mut count = 0usize;
    for record in records {
        let Some(y_test) = record.y_test.as_ref() else {
            continue;
        };
        let forecast = forecast_series(smoother, rnn, record, config)?;
        total += pinball_loss(y_test.view(), forecast.view(), config.quantile);
        count += 1;
    }
    Ok((count > 0).then(|| total / count as f64))
}
