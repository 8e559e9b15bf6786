//! Errors for the ES-RNN forecaster (configuration loading, panel and record
//! validation, model state, and persistence).
//!
//! This module defines a configuration error type, [`ConfigError`], and a
//! model error type, [`EsrnnError`], used across the engine and its core
//! building blocks. Both implement `Display`/`Error`.
//!
//! ## Conventions
//! - **Indices are 0-based.**
//! - Observations must be **strictly positive and finite**; the smoothing
//!   recursion divides by them and the network works on their logarithm.
//! - Numerical blow-ups during training are *not* errors: they are reported
//!   per series as a failed update and logged by the training loop.
//! - Optimizer failures are wrapped as [`EsrnnError::Optimizer`].
use crate::optimization::errors::OptError;
use chrono::NaiveDateTime;

/// Result alias for configuration parsing/validation paths that may produce
/// [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Crate-wide result alias for ES-RNN operations that may produce [`EsrnnError`].
pub type EsrnnResult<T> = Result<T, EsrnnError>;

/// Configuration errors, all raised at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    // ---- Document ----
    /// The configuration file could not be read.
    Io { path: String, reason: String },

    /// The document is malformed or misses a required key.
    Parse { reason: String },

    // ---- Values ----
    /// Seasonality period has no series-length multiplier.
    UnsupportedSeasonality { period: usize },

    /// A real-valued setting is outside its admissible range.
    InvalidValue { key: &'static str, value: f64, reason: &'static str },

    /// An integer setting is outside its admissible range.
    InvalidSize { key: &'static str, value: usize, reason: &'static str },

    /// The dilation schedule must contain at least one layer.
    EmptyDilations,

    /// Dilation entries must be strictly positive.
    InvalidDilation { index: usize, value: usize },

    /// Sampling-frequency string could not be parsed.
    InvalidFrequency { alias: String, reason: &'static str },
}

impl std::error::Error for ConfigError {}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Document ----
            ConfigError::Io { path, reason } => {
                write!(f, "Could not read configuration '{path}': {reason}")
            }
            ConfigError::Parse { reason } => {
                write!(f, "Malformed configuration: {reason}")
            }

            // ---- Values ----
            ConfigError::UnsupportedSeasonality { period } => {
                write!(f, "Unsupported seasonality {period}: expected one of 4, 7, 12, 30")
            }
            ConfigError::InvalidValue { key, value, reason } => {
                write!(f, "Invalid value for '{key}': {value}: {reason}")
            }
            ConfigError::InvalidSize { key, value, reason } => {
                write!(f, "Invalid value for '{key}': {value}: {reason}")
            }
            ConfigError::EmptyDilations => {
                write!(f, "Dilation schedule must contain at least one layer")
            }
            ConfigError::InvalidDilation { index, value } => {
                write!(f, "Invalid dilation at index {index}: {value}, must be > 0")
            }
            ConfigError::InvalidFrequency { alias, reason } => {
                write!(f, "Invalid sampling frequency '{alias}': {reason}")
            }
        }
    }
}

/// Unified error type for the ES-RNN engine.
///
/// Covers panel/record validation, model state, persistence, and wraps
/// configuration and optimizer errors.
#[derive(Debug, Clone, PartialEq)]
pub enum EsrnnError {
    // ---- Wrapped ----
    /// Configuration failure.
    Config(ConfigError),

    /// Optimizer failure.
    Optimizer(OptError),

    // ---- Panel ----
    /// The panel contains no rows.
    EmptyPanel,

    /// The same `(unique_id, ds)` key occurs twice.
    DuplicateKey { unique_id: String, ds: NaiveDateTime },

    /// Predictor and target tables do not share the same keys.
    MisalignedTables { reason: String },

    /// Exogenous vectors must have `exogenous_feature_size` entries.
    ExogenousLengthMismatch { unique_id: String, expected: usize, found: usize },

    /// No series passed the trainable-id filter.
    NoTrainableSeries { min_length: usize },

    // ---- Records ----
    /// A record needs at least two retained observations.
    SeriesTooShort { series_id: String, len: usize, min: usize },

    /// An observation is NaN/±inf.
    NonFiniteObservation { series_id: String, index: usize, value: f64 },

    /// An observation is ≤ 0.
    NonPositiveObservation { series_id: String, index: usize, value: f64 },

    /// Timestamps and values differ in length.
    LengthMismatch { series_id: String, values: usize, timestamps: usize },

    // ---- Model state ----
    /// `predict`/`save`/`evaluate_holdout` called before `prepare`/`fit`.
    ModelNotFitted,

    /// More distinct series than smoothing-table rows.
    SeriesCountExceeded { found: usize, capacity: usize },

    /// A parameter block has an unexpected size.
    ShapeMismatch { what: &'static str, expected: usize, found: usize },

    /// Advancing a timestamp left the representable calendar.
    TimestampOverflow { ds: NaiveDateTime },

    // ---- Persistence ----
    /// Reading or writing a checkpoint failed.
    Io { path: String, reason: String },

    /// A checkpoint could not be encoded or decoded.
    Serialization { reason: String },
}

impl std::error::Error for EsrnnError {}

impl std::fmt::Display for EsrnnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Wrapped ----
            EsrnnError::Config(err) => write!(f, "{err}"),
            EsrnnError::Optimizer(err) => write!(f, "Optimizer error: {err}"),

            // ---- Panel ----
            EsrnnError::EmptyPanel => write!(f, "Panel contains no rows"),
            EsrnnError::DuplicateKey { unique_id, ds } => {
                write!(f, "Duplicate panel key ('{unique_id}', {ds})")
            }
            EsrnnError::MisalignedTables { reason } => {
                write!(f, "Predictor and target tables are misaligned: {reason}")
            }
            EsrnnError::ExogenousLengthMismatch { unique_id, expected, found } => {
                write!(
                    f,
                    "Exogenous vector for '{unique_id}' has length {found}, expected {expected}"
                )
            }
            EsrnnError::NoTrainableSeries { min_length } => {
                write!(
                    f,
                    "No series has at least {min_length} finite, strictly positive observations"
                )
            }

            // ---- Records ----
            EsrnnError::SeriesTooShort { series_id, len, min } => {
                write!(f, "Series '{series_id}' has {len} observations, need at least {min}")
            }
            EsrnnError::NonFiniteObservation { series_id, index, value } => {
                write!(f, "Series '{series_id}' has a non-finite value at index {index}: {value}")
            }
            EsrnnError::NonPositiveObservation { series_id, index, value } => {
                write!(
                    f,
                    "Series '{series_id}' has a non-positive value at index {index}: {value}"
                )
            }
            EsrnnError::LengthMismatch { series_id, values, timestamps } => {
                write!(
                    f,
                    "Series '{series_id}' has {values} values but {timestamps} timestamps"
                )
            }

            // ---- Model state ----
            EsrnnError::ModelNotFitted => write!(f, "Model has not been fitted"),
            EsrnnError::SeriesCountExceeded { found, capacity } => {
                write!(f, "Found {found} series but the smoothing table holds {capacity}")
            }
            EsrnnError::ShapeMismatch { what, expected, found } => {
                write!(f, "Shape mismatch for {what}: expected {expected}, found {found}")
            }
            EsrnnError::TimestampOverflow { ds } => {
                write!(f, "Cannot advance timestamp {ds}: out of calendar range")
            }

            // ---- Persistence ----
            EsrnnError::Io { path, reason } => write!(f, "I/O error on '{path}': {reason}"),
            EsrnnError::Serialization { reason } => {
                write!(f, "Checkpoint serialization error: {reason}")
            }
        }
    }
}

impl From<ConfigError> for EsrnnError {
    fn from(err: ConfigError) -> EsrnnError {
        EsrnnError::Config(err)
    }
}

impl From<OptError> for EsrnnError {
    fn from(err: OptError) -> EsrnnError {
        EsrnnError::Optimizer(err)
    }
}

impl From<serde_json::Error> for EsrnnError {
    fn from(err: serde_json::Error) -> EsrnnError {
        EsrnnError::Serialization { reason: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Wrapped errors keep their identity and render a readable message.
    //
    // Given
    // -----
    // - An `OptError::RowOutOfRange` and a `ConfigError::EmptyDilations`.
    //
    // Expect
    // ------
    // - Conversions produce the wrapping variants and `Display` mentions the
    //   inner message.
    fn conversions_wrap_inner_errors() {
        let err: EsrnnError = OptError::RowOutOfRange { row: 4, rows: 2 }.into();
        assert_eq!(err, EsrnnError::Optimizer(OptError::RowOutOfRange { row: 4, rows: 2 }));
        assert!(err.to_string().contains("Row 4 out of range"));

        let err: EsrnnError = ConfigError::EmptyDilations.into();
        assert!(matches!(err, EsrnnError::Config(ConfigError::EmptyDilations)));
        assert!(err.to_string().contains("at least one layer"));
    }

    #[test]
    fn unsupported_seasonality_lists_supported_periods() {
        let msg = ConfigError::UnsupportedSeasonality { period: 5 }.to_string();
        assert!(msg.contains('5') && msg.contains("4, 7, 12, 30"));
    }
}
