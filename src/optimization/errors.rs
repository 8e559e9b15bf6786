//! Errors for the gradient-based optimizers (hyper-parameter validation,
//! gradient checks, and parameter-table addressing).
//!
//! [`OptError`] is shared by the dense and row-wise Adam optimizers in
//! [`crate::optimization::adam`]. It converts into the model-level error type
//! via `From`, so training code can use `?` on optimizer calls.
//!
//! ## Conventions
//! - **Indices are 0-based.**
//! - Gradients must be **finite**; a non-finite entry is reported with its
//!   index and value and the update is not applied.

/// Crate-wide result alias for optimizer operations.
pub type OptResult<T> = Result<T, OptError>;

#[derive(Debug, Clone, PartialEq)]
pub enum OptError {
    // ---- Gradient ----
    /// Gradient dimensions do not match parameter dimensions.
    GradientDimMismatch { expected: usize, found: usize },

    /// Gradient elements need to be finite.
    InvalidGradient { index: usize, value: f64, reason: &'static str },

    // ---- AdamOptions ----
    /// Learning rate needs to be positive and finite.
    InvalidLearningRate { value: f64, reason: &'static str },

    /// Epsilon needs to be positive and finite.
    InvalidEpsilon { value: f64, reason: &'static str },

    /// Clip threshold needs to be positive and finite.
    InvalidClipThreshold { value: f64, reason: &'static str },

    /// Moment decay rates must lie in [0, 1).
    InvalidBeta { value: f64, reason: &'static str },

    // ---- Row-wise tables ----
    /// Row index is outside the parameter table.
    RowOutOfRange { row: usize, rows: usize },

    // ---- Optimizer outcome ----
    /// Updated parameters must be finite.
    NonFiniteParameter { index: usize, value: f64 },
}

impl std::error::Error for OptError {}

impl std::fmt::Display for OptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Gradient ----
            OptError::GradientDimMismatch { expected, found } => {
                write!(f, "Gradient dimension mismatch: expected {expected}, found {found}")
            }
            OptError::InvalidGradient { index, value, reason } => {
                write!(f, "Invalid gradient at index {index}: {value}: {reason}")
            }

            // ---- AdamOptions ----
            OptError::InvalidLearningRate { value, reason } => {
                write!(f, "Invalid learning rate {value}: {reason}")
            }
            OptError::InvalidEpsilon { value, reason } => {
                write!(f, "Invalid epsilon {value}: {reason}")
            }
            OptError::InvalidClipThreshold { value, reason } => {
                write!(f, "Invalid gradient clipping threshold {value}: {reason}")
            }
            OptError::InvalidBeta { value, reason } => {
                write!(f, "Invalid moment decay rate {value}: {reason}")
            }

            // ---- Row-wise tables ----
            OptError::RowOutOfRange { row, rows } => {
                write!(f, "Row {row} out of range for a table with {rows} rows")
            }

            // ---- Optimizer outcome ----
            OptError::NonFiniteParameter { index, value } => {
                write!(f, "Non-finite parameter after update at index {index}: {value}")
            }
        }
    }
}
