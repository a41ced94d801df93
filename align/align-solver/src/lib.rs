//! Tile configuration solver.
//!
//! A [`TileConfiguration`] is a graph of model-bearing tiles connected by
//! weighted point-match edges. [`TileConfiguration::optimize`] sweeps the
//! movable tiles in insertion order, refitting each tile's model to its
//! incident matches as imaged through the neighbors' current models, until
//! the per-tile error converges or plateaus.
//!
//! In the layer-alignment pipeline one tile stands for one layer; the
//! solved models pre-align the spring meshes before elastic relaxation.
//!
//! # Example
//!
//! ```
//! use align_models::{Model, ModelKind};
//! use align_solver::{TileConfiguration, TileMatch};
//! use nalgebra::Point2;
//!
//! let mut cfg = TileConfiguration::new();
//! let a = cfg.create_tile(Model::new(ModelKind::Translation));
//! let b = cfg.create_tile(Model::new(ModelKind::Translation));
//!
//! // Three shared points, shifted by (1, 0) between the two frames.
//! let matches: Vec<TileMatch> = [(0.0, 0.0), (4.0, 0.0), (0.0, 4.0)]
//!     .iter()
//!     .map(|&(x, y)| TileMatch {
//!         source: Point2::new(x, y),
//!         target: Point2::new(x - 1.0, y),
//!         weight: 1.0,
//!     })
//!     .collect();
//! cfg.connect(a, b, &matches);
//! cfg.fix_tile(b);
//!
//! let report = cfg.optimize(1e-9, 100, 10, None).unwrap();
//! assert!(report.status.is_converged());
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod config;
mod error;

pub use config::{SolveReport, Tile, TileConfiguration, TileId, TileMatch};
pub use error::{SolverError, SolverResult};
