//! optimization — Adam optimizers, numerical helpers, and unified error surface.
//!
//! Purpose
//! -------
//! Provide the gradient-descent layer used to train the ES-RNN forecaster:
//! moment-based adaptive optimizers with global-norm clipping, numerically
//! stable scalar transforms, shared validation, and a single error/result
//! surface.
//!
//! Key behaviors
//! -------------
//! - Expose a dense optimizer ([`adam::Adam`]) for flat parameter vectors
//!   and a row-wise optimizer ([`adam::RowAdam`]) for per-series parameter
//!   tables, both configured through validated [`adam::AdamOptions`].
//! - Supply shared numerical primitives (`numerical_stability`) such as the
//!   stable logistic and output-based activation derivatives.
//! - Normalize hyper-parameter mistakes and gradient failures into a single
//!   enum (`errors::OptError`) with a common result alias (`OptResult<T>`).
//!
//! Invariants & assumptions
//! ------------------------
//! - Optimizers operate on unconstrained parameters; a step either applies a
//!   finite update in full or returns an `OptError` and changes nothing.
//! - Gradients are computed analytically by the caller; this layer never
//!   differentiates anything itself.
//!
//! Conventions
//! -----------
//! - Parameters and gradients are `ndarray` vectors/views.
//! - This module and its submodules avoid I/O and logging; the training loop
//!   reports progress and failures.
//!
//! Downstream usage
//! ----------------
//! - The ES-RNN training loop owns one [`adam::Adam`] over the flattened
//!   recurrent weights and one [`adam::RowAdam`] over the smoothing table,
//!   and converts `OptError` into its own error type via `From`.
//!
//! Testing notes
//! -------------
//! - Unit tests in the submodules cover clipping, update magnitudes, row
//!   isolation, validation failures, and agreement of the stable transforms
//!   with naïve formulas.

pub mod adam;
pub mod errors;
pub mod numerical_stability;
pub mod validation;

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use esrnn_forecast::optimization::prelude::*;
//
// to import the main optimization surface in a single line.

pub mod prelude {
    pub use super::adam::{Adam, AdamOptions, RowAdam, clip_global_norm};
    pub use super::errors::{OptError, OptResult};
    pub use super::numerical_stability::{glorot_limit, safe_logistic};
}
