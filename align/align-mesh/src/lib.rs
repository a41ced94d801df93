//! Deformable spring meshes for elastic layer alignment.
//!
//! Each layer of a stack gets one [`SpringMesh`]: a regular triangulated
//! lattice of vertices connected by springs. Point-match constraints from
//! neighboring layers attach as zero-rest-length springs between an active
//! lattice vertex on one mesh and a [`PassiveVertex`] carried by the other
//! mesh's triangulation.
//!
//! # Structure
//!
//! ```text
//!   ●───●───●        layer i   (active lattice vertices)
//!    \ / \ / \  ○ ⟍
//!     ●───●───●   ⟍ zero-rest spring to a passive vertex
//!      \ / \ / \    carried by layer i+1's mesh
//!       ●───●───●
//! ```
//!
//! # Relaxation
//!
//! [`optimize_meshes`] repeatedly updates all meshes in parallel. One
//! update accumulates spring forces per vertex, integrates
//! `Δw = damp · force / degree`, then carries the passive vertices by
//! barycentric interpolation. Termination is by displacement threshold or
//! by an energy plateau; [`optimize_meshes_legacy`] keeps the historical
//! fixed-count loop for bit-compatible reruns.
//!
//! # Example
//!
//! ```
//! use align_mesh::{MeshParams, SpringMesh, optimize_meshes};
//!
//! let params = MeshParams::sized(64.0, 64.0);
//! let mut meshes = vec![SpringMesh::new(0, &params).unwrap()];
//! let report = optimize_meshes(&mut meshes, 1e-6, 100, 10, None).unwrap();
//! assert!(report.status.is_converged());
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod error;
mod mesh;
mod optimize;
mod spring;
mod vertex;

pub use error::{MeshError, MeshResult};
pub use mesh::{MeshParams, MeshStep, SpringMesh};
pub use optimize::{optimize_meshes, optimize_meshes_legacy, RelaxReport};
pub use spring::Spring;
pub use vertex::{Attachment, PassiveOwner, PassiveRef, PassiveVertex, Vertex};
