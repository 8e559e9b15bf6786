//! Numerical stability utilities.
//!
//! Provides safe implementations of the squashing transforms used by the
//! ES-RNN forecaster, which are prone to overflow/underflow in naïve form.
//! The functions here follow guarded strategies similar to those in major ML
//! libraries, branching on the sign of the input so `exp` is only ever
//! evaluated on non-positive arguments.
//!
//! # Provided items
//! - [`safe_logistic(x)`]: stable version of `1 / (1 + exp(-x))`, mapping
//!   ℝ → (0, 1). Used for the exponential-smoothing coefficients and the
//!   LSTM gates.
//! - [`logistic_deriv(s)`]: derivative of the logistic expressed through its
//!   output `s = σ(x)`.
//! - [`tanh_deriv(t)`]: derivative of `tanh` expressed through its output.
//! - [`glorot_limit(fan_in, fan_out)`]: half-width of the Glorot-uniform
//!   initialization interval.
//!
//! # Rationale
//! Both the smoothing recursion and the recurrent cells evaluate these
//! transforms millions of times per epoch; expressing derivatives through the
//! cached forward outputs keeps the backward pass free of extra `exp` calls.

/// Numerically stable logistic: `σ(x) = 1 / (1 + exp(-x))`.
///
/// For `x ≥ 0` the textbook form is evaluated; for `x < 0` the equivalent
/// `exp(x) / (1 + exp(x))` is used so `exp` never overflows.
///
/// # Parameters
/// - `x`: real input.
///
/// # Returns
/// - `σ(x)` in `[0, 1]` (strictly inside for moderate `|x|`).
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Derivative of the logistic given its output `s = σ(x)`: `s (1 − s)`.
pub fn logistic_deriv(s: f64) -> f64 {
    s * (1.0 - s)
}

/// Derivative of `tanh` given its output `t = tanh(x)`: `1 − t²`.
pub fn tanh_deriv(t: f64) -> f64 {
    1.0 - t * t
}

/// Half-width of the Glorot (Xavier) uniform interval,
/// `sqrt(6 / (fan_in + fan_out))`.
pub fn glorot_limit(fan_in: usize, fan_out: usize) -> f64 {
    (6.0 / (fan_in + fan_out).max(1) as f64).sqrt()
}
