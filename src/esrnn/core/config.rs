//! Configuration — validated training, model, and data hyper-parameters.
//!
//! Purpose
//! -------
//! Load the ES-RNN hyper-parameters from a TOML document, validate every
//! range constraint once at load time, and derive the series-length bounds
//! used by record construction.
//!
//! Key behaviors
//! -------------
//! - [`EsrnnConfig::from_toml_str`] / [`EsrnnConfig::from_file`] parse a
//!   document with the sections `train_parameters`, `model_parameters`,
//!   `data_parameters` plus top-level `dataset_name` and optional `copy`.
//!   Unknown or missing keys fail at parse time.
//! - [`EsrnnConfig::new`] validates the three parameter groups, parses the
//!   sampling frequency, converts percentiles into quantiles, and derives
//!   `min_series_length` / `max_series_length`.
//!
//! Invariants & assumptions
//! ------------------------
//! - `seasonality_period ∈ {4, 7, 12, 30}`; any other value has no
//!   series-length multiplier and fails with
//!   [`ConfigError::UnsupportedSeasonality`].
//! - `min_series_length = w + h + min_input_sequence_length + 2`.
//! - `max_series_length = m(p) · p + min_series_length` with
//!   `m(4) = 40` and `m(7) = m(12) = m(30) = 20`.
//! - A constructed [`EsrnnConfig`] is never partially valid.
//!
//! Conventions
//! -----------
//! - Rust field names are descriptive; serde renames map them to the
//!   document keys (`freq_of_test`, `state_hsize`, `input_size`, ...).
//! - `max_num_series` in the document is a capacity hint; fitting replaces
//!   it with the number of distinct trainable series.
use crate::esrnn::{
    core::frequency::SamplingFrequency,
    errors::{ConfigError, ConfigResult},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Seasonality periods with a defined series-length multiplier.
pub const SUPPORTED_SEASONALITIES: [usize; 4] = [4, 7, 12, 30];

fn default_lr_decay() -> f64 {
    0.5
}

fn default_copy() -> usize {
    1
}

/// Training-loop settings (`[train_parameters]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainParameters {
    pub max_epochs: usize,
    #[serde(rename = "freq_of_test")]
    pub test_frequency: usize,
    pub learning_rate: f64,
    #[serde(rename = "lr_scheduler_step_size")]
    pub lr_decay_step: usize,
    #[serde(default = "default_lr_decay")]
    pub lr_decay: f64,
    #[serde(rename = "per_series_lr_multip")]
    pub per_series_lr_multiplier: f64,
    #[serde(rename = "gradient_eps")]
    pub gradient_epsilon: f64,
    #[serde(rename = "gradient_clipping_threshold")]
    pub gradient_clip_threshold: f64,
    #[serde(rename = "noise_std")]
    pub input_noise_std: f64,
    pub numeric_threshold: f64,
    pub level_variability_penalty: f64,
    #[serde(rename = "c_state_penalty")]
    pub state_penalty: f64,
    /// Evaluation percentile in (0, 100).
    pub percentile: f64,
    /// Training percentile in (0, 100).
    pub training_percentile: f64,
}

/// Recurrent-network settings (`[model_parameters]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    #[serde(rename = "state_hsize")]
    pub hidden_state_size: usize,
    #[serde(rename = "lback")]
    pub lookback_periods: usize,
    /// One recurrent layer per entry.
    pub dilations: Vec<usize>,
    #[serde(rename = "add_nl_layer")]
    pub add_nonlinear_layer: bool,
}

/// Data-shape settings (`[data_parameters]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataParameters {
    #[serde(rename = "seasonality")]
    pub seasonality_period: usize,
    #[serde(rename = "input_size")]
    pub input_window_size: usize,
    #[serde(rename = "output_size")]
    pub output_horizon_size: usize,
    #[serde(rename = "exogenous_size")]
    pub exogenous_feature_size: usize,
    #[serde(rename = "frequency")]
    pub sampling_frequency: String,
    #[serde(rename = "min_inp_seq_length")]
    pub min_input_sequence_length: usize,
    pub max_num_series: usize,
    #[serde(rename = "output_dir")]
    pub output_directory: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    dataset_name: String,
    #[serde(default = "default_copy")]
    copy: usize,
    train_parameters: TrainParameters,
    model_parameters: ModelParameters,
    data_parameters: DataParameters,
}

/// EsrnnConfig — immutable, validated hyper-parameters plus derived bounds.
///
/// Fields
/// ------
/// - `dataset_name`, `copy`: checkpoint directory components.
/// - `train`, `model`, `data`: the validated parameter groups.
/// - `frequency`: parsed `data.sampling_frequency`.
/// - `quantile`, `training_quantile`: percentiles divided by 100.
/// - `min_series_length`, `max_series_length`: derived record bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct EsrnnConfig {
    pub dataset_name: String,
    pub copy: usize,
    pub train: TrainParameters,
    pub model: ModelParameters,
    pub data: DataParameters,
    pub frequency: SamplingFrequency,
    pub quantile: f64,
    pub training_quantile: f64,
    pub min_series_length: usize,
    pub max_series_length: usize,
}

impl EsrnnConfig {
    /// Validate the parameter groups and derive the series-length bounds.
    ///
    /// # Errors
    /// - [`ConfigError::UnsupportedSeasonality`] for a period outside
    ///   {4, 7, 12, 30}.
    /// - [`ConfigError::InvalidValue`] / [`ConfigError::InvalidSize`] for any
    ///   range violation (see the field table of the crate docs).
    /// - [`ConfigError::EmptyDilations`] / [`ConfigError::InvalidDilation`]
    ///   for an empty schedule or a zero entry.
    /// - [`ConfigError::InvalidFrequency`] for an unknown frequency alias.
    pub fn new(
        dataset_name: impl Into<String>, copy: usize, train: TrainParameters,
        model: ModelParameters, data: DataParameters,
    ) -> ConfigResult<Self> {
        validate_train(&train)?;
        validate_model(&model)?;
        validate_data(&data)?;
        let frequency = SamplingFrequency::parse(&data.sampling_frequency)?;

        let multiplier = series_length_multiplier(data.seasonality_period)?;
        let min_series_length = data.input_window_size
            + data.output_horizon_size
            + data.min_input_sequence_length
            + 2;
        let max_series_length = multiplier * data.seasonality_period + min_series_length;

        Ok(Self {
            dataset_name: dataset_name.into(),
            copy,
            quantile: train.percentile / 100.0,
            training_quantile: train.training_percentile / 100.0,
            train,
            model,
            data,
            frequency,
            min_series_length,
            max_series_length,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// - [`ConfigError::Parse`] for malformed documents, unknown keys, or
    ///   missing required keys.
    /// - Any error of [`EsrnnConfig::new`].
    pub fn from_toml_str(document: &str) -> ConfigResult<Self> {
        let doc: ConfigDocument = toml::from_str(document)
            .map_err(|err| ConfigError::Parse { reason: err.to_string() })?;
        Self::new(
            doc.dataset_name,
            doc.copy,
            doc.train_parameters,
            doc.model_parameters,
            doc.data_parameters,
        )
    }

    /// Read, parse, and validate a TOML file.
    ///
    /// # Errors
    /// - [`ConfigError::Io`] when the file cannot be read.
    /// - Any error of [`EsrnnConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_toml_str(&document)
    }

    /// Width of the flattened network input: window plus exogenous features.
    pub fn network_input_size(&self) -> usize {
        self.data.input_window_size + self.data.exogenous_feature_size
    }

    /// Learning rate of the per-series smoothing parameters.
    pub fn per_series_learning_rate(&self) -> f64 {
        self.train.learning_rate * self.train.per_series_lr_multiplier
    }

    pub(crate) fn set_max_num_series(&mut self, count: usize) {
        self.data.max_num_series = count;
    }
}

/// Series-length multiplier `m(p)` for a seasonality period.
///
/// # Errors
/// - [`ConfigError::UnsupportedSeasonality`] when `p ∉ {4, 7, 12, 30}`.
pub fn series_length_multiplier(period: usize) -> ConfigResult<usize> {
    match period {
        4 => Ok(40),
        7 | 12 | 30 => Ok(20),
        _ => Err(ConfigError::UnsupportedSeasonality { period }),
    }
}

fn positive_finite(key: &'static str, value: f64) -> ConfigResult<()> {
    if !value.is_finite() {
        return Err(ConfigError::InvalidValue { key, value, reason: "Value must be finite." });
    }
    if value <= 0.0 {
        return Err(ConfigError::InvalidValue { key, value, reason: "Value must be positive." });
    }
    Ok(())
}

fn non_negative_finite(key: &'static str, value: f64) -> ConfigResult<()> {
    if !value.is_finite() {
        return Err(ConfigError::InvalidValue { key, value, reason: "Value must be finite." });
    }
    if value < 0.0 {
        return Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "Value must be non-negative.",
        });
    }
    Ok(())
}

fn percentile(key: &'static str, value: f64) -> ConfigResult<()> {
    if !(value.is_finite() && value > 0.0 && value < 100.0) {
        return Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "Percentile must lie strictly between 0 and 100.",
        });
    }
    Ok(())
}

fn positive_size(key: &'static str, value: usize) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::InvalidSize { key, value, reason: "Value must be positive." });
    }
    Ok(())
}

fn validate_train(train: &TrainParameters) -> ConfigResult<()> {
    positive_finite("learning_rate", train.learning_rate)?;
    positive_finite("per_series_lr_multip", train.per_series_lr_multiplier)?;
    positive_finite("gradient_eps", train.gradient_epsilon)?;
    positive_finite("gradient_clipping_threshold", train.gradient_clip_threshold)?;
    non_negative_finite("noise_std", train.input_noise_std)?;
    non_negative_finite("numeric_threshold", train.numeric_threshold)?;
    non_negative_finite("level_variability_penalty", train.level_variability_penalty)?;
    non_negative_finite("c_state_penalty", train.state_penalty)?;
    percentile("percentile", train.percentile)?;
    percentile("training_percentile", train.training_percentile)?;
    if !(train.lr_decay.is_finite() && train.lr_decay > 0.0 && train.lr_decay <= 1.0) {
        return Err(ConfigError::InvalidValue {
            key: "lr_decay",
            value: train.lr_decay,
            reason: "Decay factor must lie in (0, 1].",
        });
    }
    Ok(())
}

fn validate_model(model: &ModelParameters) -> ConfigResult<()> {
    positive_size("state_hsize", model.hidden_state_size)?;
    if model.dilations.is_empty() {
        return Err(ConfigError::EmptyDilations);
    }
    if let Some(index) = model.dilations.iter().position(|&d| d == 0) {
        return Err(ConfigError::InvalidDilation { index, value: model.dilations[index] });
    }
    Ok(())
}

fn validate_data(data: &DataParameters) -> ConfigResult<()> {
    series_length_multiplier(data.seasonality_period)?;
    positive_size("input_size", data.input_window_size)?;
    positive_size("output_size", data.output_horizon_size)?;
    Ok(())
}
