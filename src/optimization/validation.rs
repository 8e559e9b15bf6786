//! Validation helpers for the gradient-based optimizers.
//!
//! This module centralizes the consistency checks shared by the dense and
//! row-wise Adam optimizers:
//!
//! - **Hyper-parameter checks**: [`verify_learning_rate`],
//!   [`verify_epsilon`], [`verify_clip_threshold`], [`verify_beta`] ensure
//!   numeric settings are finite and inside their admissible ranges.
//! - **Gradient validation**: [`validate_grad`] enforces correct dimension
//!   and finite entries.
//! - **Parameter validation**: [`validate_theta`] rejects non-finite
//!   parameters after an update.
//!
//! These helpers return domain-specific [`OptError`] variants so higher-level
//! code can report failures uniformly.
use crate::optimization::errors::{OptError, OptResult};
use ndarray::ArrayView1;

/// Validate a learning rate.
///
/// # Errors
/// Returns [`OptError::InvalidLearningRate`] if the value is non-finite or ≤ 0.0.
pub fn verify_learning_rate(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::InvalidLearningRate { value, reason: "Learning rate must be finite." });
    }
    if value <= 0.0 {
        return Err(OptError::InvalidLearningRate {
            value,
            reason: "Learning rate must be positive.",
        });
    }
    Ok(())
}

/// Validate the Adam denominator epsilon.
///
/// # Errors
/// Returns [`OptError::InvalidEpsilon`] if the value is non-finite or ≤ 0.0.
pub fn verify_epsilon(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::InvalidEpsilon { value, reason: "Epsilon must be finite." });
    }
    if value <= 0.0 {
        return Err(OptError::InvalidEpsilon { value, reason: "Epsilon must be positive." });
    }
    Ok(())
}

/// Validate the global-norm clipping threshold.
///
/// # Errors
/// Returns [`OptError::InvalidClipThreshold`] if the value is non-finite or ≤ 0.0.
pub fn verify_clip_threshold(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::InvalidClipThreshold {
            value,
            reason: "Clip threshold must be finite.",
        });
    }
    if value <= 0.0 {
        return Err(OptError::InvalidClipThreshold {
            value,
            reason: "Clip threshold must be positive.",
        });
    }
    Ok(())
}

/// Validate a moment decay rate.
///
/// # Errors
/// Returns [`OptError::InvalidBeta`] unless `0.0 <= value < 1.0`.
pub fn verify_beta(value: f64) -> OptResult<()> {
    if !(0.0..1.0).contains(&value) {
        return Err(OptError::InvalidBeta { value, reason: "Decay rate must lie in [0, 1)." });
    }
    Ok(())
}

/// Validate a gradient vector against dimension and finiteness.
///
/// Checks:
/// - `grad.len() == dim`
/// - every element is finite (`NaN` or `±∞` are rejected)
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if length does not match `dim`.
/// - [`OptError::InvalidGradient`] with the index/value/reason of the first
///   offending element.
pub fn validate_grad(grad: ArrayView1<f64>, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Validate that every parameter is finite.
///
/// # Errors
/// Returns [`OptError::NonFiniteParameter`] for the first offending entry.
pub fn validate_theta(theta: ArrayView1<f64>) -> OptResult<()> {
    for (index, &value) in theta.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::NonFiniteParameter { index, value });
        }
    }
    Ok(())
}
