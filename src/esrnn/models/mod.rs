//! models — the ES-RNN engine, its training step, and checkpoints.
//!
//! Key behaviors
//! -------------
//! - [`EsrnnModel`] drives `prepare → train → predict` over a panel.
//! - [`training`] holds the per-series forward/backward pass and the
//!   two-optimizer update with typed failure outcomes.
//! - [`persistence`] saves and restores both parameter collections as JSON.
//!
//! Testing notes
//! -------------
//! - Gradient exactness is checked against finite differences in
//!   [`training`]; lifecycle, decay, and hold-out behavior in [`esrnn`];
//!   round trips and id re-mapping in [`persistence`].

pub mod esrnn;
pub mod persistence;
pub mod training;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::esrnn::{EsrnnModel, forecast_series};
pub use self::training::{
    EpochSummary, FailureDiagnostic, FitReport, SeriesLoss, SeriesUpdate, forward_backward,
    train_series,
};
