//! Error types for the tile configuration solver.

use thiserror::Error;

/// Errors that can occur while optimizing a tile configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SolverError {
    /// A movable tile has too few usable matches to be solved.
    #[error("tile {tile} has {found} usable matches, needs at least {needed}")]
    NotEnoughDataPoints {
        /// The under-constrained tile.
        tile: usize,
        /// Minimum usable matches required.
        needed: usize,
        /// Usable matches found.
        found: usize,
    },

    /// An operation referenced a tile id that was never created.
    #[error("unknown tile id {tile}")]
    UnknownTile {
        /// The offending id.
        tile: usize,
    },
}

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;
