//! core — configuration, panel data, per-series records, and the two model
//! components of the ES-RNN forecaster.
//!
//! Purpose
//! -------
//! Collect the building blocks the engine composes: the validated
//! configuration, the sampling-frequency calendar, the long-format panel and
//! per-series records, the exponential-smoothing recursion, the dilated
//! residual LSTM stack, and the training losses.
//!
//! Key behaviors
//! -------------
//! - [`EsrnnConfig`] loads the three parameter groups from TOML and derives
//!   the minimum and maximum series lengths.
//! - [`Panel`] validates `(unique_id, ds, y)` rows and groups them into
//!   sorted series; [`SeriesRecord`] splits off hold-out blocks and caps the
//!   training prefix.
//! - [`ExponentialSmoother`] owns the id-indexed smoothing table and computes
//!   level/seasonal trajectories with their reverse pass;
//!   [`RecurrentForecaster`] owns the shared network weights and computes
//!   forward steps and back-propagation through time.
//!
//! Invariants & assumptions
//! ------------------------
//! - Observations inside records are finite and strictly positive.
//! - Series ids are dense, zero-based, and follow sorted external-id order.
//!
//! Conventions
//! -----------
//! - Indexing is 0-based, oldest observation first.
//! - This module logs only data-preparation decisions (dropped series,
//!   skipped hold-out splits); training progress is reported by the engine.

pub mod config;
pub mod frequency;
pub mod loss;
pub mod panel;
pub mod recurrent;
pub mod series;
pub mod smoother;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::config::{DataParameters, EsrnnConfig, ModelParameters, TrainParameters};
pub use self::frequency::{FrequencyUnit, SamplingFrequency};
pub use self::loss::{level_variability_loss, pinball_loss};
pub use self::panel::{ForecastRow, Panel, PanelRow, PredictorRow, SeriesView};
pub use self::recurrent::{RecurrentCursor, RecurrentForecaster, RnnDims, RnnWeights};
pub use self::series::SeriesRecord;
pub use self::smoother::{EsTrajectory, ExponentialSmoother};
