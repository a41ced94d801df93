//! Error types for model fitting and evaluation.

use thiserror::Error;

/// Errors that can occur while fitting or evaluating a 2D model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// Too few (or too degenerate) point matches for a least-squares fit.
    ///
    /// Singular normal equations are reported through this variant as well,
    /// so a fit never produces `NaN` parameters.
    #[error("{found} point matches cannot constrain a model needing {needed}")]
    NotEnoughDataPoints {
        /// Minimum number of matches the model requires.
        needed: usize,
        /// Number of usable matches provided.
        found: usize,
    },

    /// The model cannot be inverted at the requested point.
    #[error("model is not invertible (determinant {determinant:e})")]
    NonInvertible {
        /// Determinant of the linear part.
        determinant: f64,
    },

    /// A parameter array had the wrong length for the model.
    #[error("parameter array has {found} entries, expected {expected}")]
    BadParameterCount {
        /// Expected entry count.
        expected: usize,
        /// Provided entry count.
        found: usize,
    },
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
