//! Error types for spring-mesh construction and relaxation.

use thiserror::Error;

/// Errors that can occur while building or relaxing spring meshes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MeshError {
    /// A triangle of the lattice degenerated (collapsed or folded over)
    /// during relaxation. Fatal for the whole solve.
    #[error("mesh {mesh}: triangle {triangle} collapsed during relaxation")]
    Collapse {
        /// Identifier of the offending mesh (the layer index).
        mesh: usize,
        /// Index of the degenerate triangle.
        triangle: usize,
    },

    /// Relaxation produced a non-finite energy, so convergence is
    /// unreachable.
    #[error("mesh relaxation diverged at iteration {iteration}")]
    Diverged {
        /// Iteration at which the energy became non-finite.
        iteration: usize,
    },

    /// The requested lattice would have fewer than 2×2 vertices.
    #[error("mesh {mesh}: lattice of {columns}x{rows} vertices is degenerate")]
    DegenerateLattice {
        /// Identifier of the offending mesh (the layer index).
        mesh: usize,
        /// Lattice columns.
        columns: usize,
        /// Lattice rows.
        rows: usize,
    },

    /// A mesh parameter was outside its valid range.
    #[error("invalid mesh parameter {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
}

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;
