//! Error types for the elastic aligner.

use align_mesh::MeshError;
use align_mls::MlsError;
use align_solver::SolverError;
use align_spec::SpecError;
use thiserror::Error;

/// One collected input failure.
#[derive(Debug, Clone)]
pub struct InputFailure {
    /// The offending file.
    pub path: String,
    /// Parser diagnostics.
    pub message: String,
}

/// Errors that can occur during an elastic alignment run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ElasticError {
    /// One or more input files failed to parse. Failures are collected
    /// across all files before the run aborts.
    #[error("{} input file(s) failed to parse (first: {})", failures.len(),
            failures.first().map_or(String::new(), |f| f.path.clone()))]
    InputParse {
        /// All collected failures.
        failures: Vec<InputFailure>,
    },

    /// A referenced tile-spec file carries no usable layer index.
    #[error("tile spec file {url} has a tilespec without a layer")]
    MissingLayer {
        /// The offending file.
        url: String,
    },

    /// Two correspondence records cover the same ordered layer pair.
    #[error("duplicate correspondence record for layers {layer_a} -> {layer_b}")]
    DuplicateCorrespondence {
        /// First layer of the pair.
        layer_a: i64,
        /// Second layer of the pair.
        layer_b: i64,
    },

    /// The requested layer window contains no layers.
    #[error("no layers to align in the requested range")]
    EmptyRange,

    /// An alignment parameter was out of range.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// A spring-mesh failure (collapse is fatal for the whole solve).
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// A tile-configuration failure during pre-alignment.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// A per-layer transform could not be built at emit time.
    #[error("layer {layer}: cannot build output transform")]
    Mls {
        /// The offending layer.
        layer: i64,
        /// The underlying error.
        #[source]
        source: MlsError,
    },

    /// A spec-level failure (I/O, parsing, coordinate lookup).
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// The run was canceled cooperatively; partial work is discarded.
    #[error("alignment canceled")]
    Canceled,
}

impl ElasticError {
    /// The single-word error kind tag reported on stderr.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputParse { .. } | Self::EmptyRange | Self::InvalidParameter { .. } => {
                "input-parse"
            }
            Self::MissingLayer { .. } => "missing-layer",
            Self::DuplicateCorrespondence { .. } => "duplicate-correspondence",
            Self::Solver(SolverError::NotEnoughDataPoints { .. }) | Self::Mls { .. } => {
                "not-enough-data-points"
            }
            Self::Solver(_) => "input-parse",
            Self::Mesh(MeshError::Diverged { .. }) => "convergence-timeout",
            Self::Mesh(MeshError::Collapse { .. } | MeshError::DegenerateLattice { .. }) => {
                "mesh-collapse"
            }
            Self::Mesh(_) => "input-parse",
            Self::Spec(SpecError::Io { .. }) => "io",
            Self::Spec(SpecError::MissingLayer { .. }) => "missing-layer",
            Self::Spec(SpecError::NonInvertible { .. }) => "non-invertible-model",
            Self::Spec(_) => "input-parse",
            Self::Canceled => "canceled",
        }
    }

    /// The process exit code for this error: 1 for input problems, 2 for
    /// convergence/solver failures, 3 for I/O failures.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            "input-parse" | "missing-layer" | "duplicate-correspondence" => 1,
            "io" => 3,
            _ => 2,
        }
    }
}

/// Result type for elastic alignment.
pub type ElasticResult<T> = Result<T, ElasticError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_exit_codes() {
        let parse = ElasticError::InputParse { failures: vec![] };
        assert_eq!(parse.kind(), "input-parse");
        assert_eq!(parse.exit_code(), 1);

        let collapse = ElasticError::Mesh(MeshError::Collapse { mesh: 4, triangle: 0 });
        assert_eq!(collapse.kind(), "mesh-collapse");
        assert_eq!(collapse.exit_code(), 2);

        let io = ElasticError::Spec(SpecError::Io {
            path: "/x".into(),
            source: std::io::Error::other("boom"),
        });
        assert_eq!(io.kind(), "io");
        assert_eq!(io.exit_code(), 3);

        assert_eq!(ElasticError::Canceled.exit_code(), 2);
    }
}
