//! esrnn — hybrid exponential-smoothing / recurrent-network forecaster.
//!
//! Purpose
//! -------
//! Forecast a panel of positive time series with a per-series Holt–Winters
//! style multiplicative smoother feeding normalized windows into one shared
//! dilated LSTM stack, trained jointly by pinball loss.
//!
//! Key behaviors
//! -------------
//! - [`core`] holds configuration, panel data, records, the smoother, and
//!   the recurrent network.
//! - [`models`] holds the engine ([`EsrnnModel`]), the training step, and
//!   checkpoints.
//! - [`errors`] defines [`ConfigError`] and [`EsrnnError`] with their result
//!   aliases.
//!
//! Invariants & assumptions
//! ------------------------
//! - Only series with at least `min_series_length` finite, strictly positive
//!   observations are trained and forecast.
//! - The engine is single-threaded; one instance owns all parameters and its
//!   RNG, so a fixed seed gives reproducible fits.
//!
//! Downstream usage
//! ----------------
//! 1. Load an [`EsrnnConfig`] with `EsrnnConfig::from_file`.
//! 2. Build a [`Panel`] from rows (or from aligned predictor/target tables).
//! 3. `let mut model = EsrnnModel::new(config, seed);`
//!    `model.fit(&panel)?;` then `model.predict()?` for `ForecastRow`s.
//! 4. `model.save(None)?` / `model.load(None)?` for checkpoints.
//!
//! Testing notes
//! -------------
//! - Unit tests live beside each submodule; `tests/integration_esrnn_pipeline.rs`
//!   runs the public API end to end.

pub mod core;
pub mod errors;
pub mod models;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::core::{
    EsrnnConfig, ExponentialSmoother, ForecastRow, Panel, PanelRow, PredictorRow,
    RecurrentForecaster, SamplingFrequency, SeriesRecord,
};

pub use self::errors::{ConfigError, ConfigResult, EsrnnError, EsrnnResult};

pub use self::models::{EpochSummary, EsrnnModel, FitReport, SeriesLoss, SeriesUpdate};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use esrnn_forecast::esrnn::prelude::*;
//
// to import the main forecasting surface in a single line.

pub mod prelude {
    pub use super::{
        ConfigError, ConfigResult, EpochSummary, EsrnnConfig, EsrnnError, EsrnnModel,
        EsrnnResult, FitReport, ForecastRow, Panel, PanelRow, PredictorRow, SeriesUpdate,
    };
}
