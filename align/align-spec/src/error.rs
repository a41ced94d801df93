//! Error types for spec parsing and coordinate lookup.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading, writing, or interpreting specs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpecError {
    /// A file could not be read or written.
    #[error("i/o failure on {}", path.display())]
    Io {
        /// The offending path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file held malformed JSON or the wrong shape.
    #[error("cannot parse {}: {}", path.display(), message)]
    Parse {
        /// The offending path.
        path: PathBuf,
        /// Parser diagnostics.
        message: String,
    },

    /// A tile spec carried no usable layer index.
    #[error("tile spec file {path} has a tile without a layer")]
    MissingLayer {
        /// The offending file.
        path: String,
    },

    /// A skip-layer range expression could not be parsed.
    #[error("bad layer range expression: {text:?}")]
    BadRange {
        /// The offending expression.
        text: String,
    },

    /// A transform descriptor could not be interpreted.
    #[error("bad transform {class_name}: {message}")]
    BadTransform {
        /// The descriptor's discriminator.
        class_name: String,
        /// What was wrong.
        message: String,
    },

    /// A world position could not be inverted through any candidate tile.
    #[error("world coordinate ({x}, {y}) cannot be inverted")]
    NonInvertible {
        /// World x.
        x: f64,
        /// World y.
        y: f64,
    },
}

/// Result type for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;
