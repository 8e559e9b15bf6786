//! esrnn_forecast — ES-RNN forecasting for panels of time series.
//!
//! Purpose
//! -------
//! Serve as the crate root for a hybrid forecaster that couples per-series
//! multiplicative exponential smoothing with a shared dilated LSTM, trained
//! jointly by quantile (pinball) loss and used to produce multi-step
//! forecasts for every series of a panel.
//!
//! Key behaviors
//! -------------
//! - Re-export the forecasting stack ([`esrnn`]) and the gradient-descent
//!   layer it trains with ([`optimization`]) as the public crate surface.
//!
//! Invariants & assumptions
//! ------------------------
//! - Observations are strictly positive; the model works in log space.
//! - All numerical work is synchronous and single-threaded.
//!
//! Conventions
//! -----------
//! - Errors are surfaced as rich enums (`ConfigError`, `EsrnnError`,
//!   `OptError`) with `Result` aliases; numerical failures of individual
//!   series during training are reported as typed outcomes and logged.
//! - Logging goes through `tracing`; the library never installs a
//!   subscriber.
//!
//! Downstream usage
//! ----------------
//! - Most callers need only `esrnn::prelude::*`.
//!
//! Testing notes
//! -------------
//! - Unit tests live in the inner modules; integration tests under `tests/`
//!   exercise fit → predict → save → load through the public API.

pub mod esrnn;
pub mod optimization;
