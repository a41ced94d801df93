//! Elastic multi-layer alignment.
//!
//! This crate orchestrates the full alignment of a serial-section stack:
//!
//! 1. Load tile specs grouped by layer ([`LayerSet`]) and index the
//!    pairwise correspondence records ([`CorrespondenceIndex`]).
//! 2. Build one spring mesh per layer and snap every record's `p1`
//!    endpoints onto the mesh lattice (fix-up).
//! 3. Wire inter-layer constraints: zero-rest springs between an active
//!    vertex on one layer and a passive vertex carried by its neighbor,
//!    with spring constant `1 / layer_distance`, plus graph edges for
//!    records that request rigid connection.
//! 4. Pre-align with the tile configuration solver, seed each mesh from
//!    its layer's solved model, then relax the coupled spring meshes.
//! 5. Unscale into world units and emit one restricted
//!    moving-least-squares transform per tile, appended to the tile's
//!    transform chain.
//!
//! The solve runs in layer-scaled units throughout; only the emit stage
//! sees world coordinates. All phases are deterministic for fixed inputs:
//! parallel work is partitioned by layer and reduced in layer order with
//! pairwise summation.

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod aligner;
mod error;
mod fixup;
mod inputs;
mod loader;
mod params;
mod report;
mod wire;

pub use aligner::{align_layers, AlignInputs, AlignOutput};
pub use error::{ElasticError, ElasticResult, InputFailure};
pub use inputs::{LayerSet, LayerTiles};
pub use loader::CorrespondenceIndex;
pub use params::AlignParams;
pub use report::RunReport;
