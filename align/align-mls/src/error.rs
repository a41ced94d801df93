//! Error types for moving-least-squares transforms.

use thiserror::Error;

/// Errors that can occur while building or parsing an MLS transform.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MlsError {
    /// Too few control points to define a local affine.
    #[error("{found} control points cannot define a local affine, need {needed}")]
    NotEnoughDataPoints {
        /// Minimum number of control points.
        needed: usize,
        /// Control points available.
        found: usize,
    },

    /// A serialized data string could not be parsed.
    #[error("bad MLS data string: {message}")]
    BadDataString {
        /// What was wrong with the string.
        message: String,
    },
}

/// Result type for MLS operations.
pub type MlsResult<T> = Result<T, MlsError>;
