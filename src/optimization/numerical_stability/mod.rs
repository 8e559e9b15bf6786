//! numerical_stability — numerically robust transforms for the ES-RNN stack.
//!
//! Purpose
//! -------
//! Collect numerically stable scalar transforms and their output-based
//! derivatives so the smoothing recursion, the recurrent cells, and the
//! optimizers share one set of well-conditioned building blocks.
//!
//! Key behaviors
//! -------------
//! - Provide a stable logistic (`safe_logistic`) for mapping unconstrained
//!   logits into (0, 1) smoothing coefficients and gate activations.
//! - Provide derivative helpers (`logistic_deriv`, `tanh_deriv`) that reuse
//!   cached forward outputs during back-propagation.
//! - Provide the Glorot-uniform initialization width (`glorot_limit`).
//!
//! Invariants & assumptions
//! ------------------------
//! - All transforms assume finite `f64` inputs; domain validation is done by
//!   the callers (records, configuration, optimizers).
//!
//! Conventions
//! -----------
//! - This module never logs, performs I/O, or touches global state.

pub mod transformations;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::transformations::{glorot_limit, logistic_deriv, safe_logistic, tanh_deriv};
