//! Parametric 2D transform models for layer alignment.
//!
//! This crate provides the closed family of transforms used by the
//! alignment stack, each estimated by weighted least squares from point
//! matches:
//!
//! | Model | Parameters | Minimum matches |
//! |-------|------------|-----------------|
//! | [`TranslationModel2d`] | `tx, ty` | 1 |
//! | [`RigidModel2d`] | `θ, tx, ty` | 2 |
//! | [`SimilarityModel2d`] | `s·cos θ, s·sin θ, tx, ty` | 2 |
//! | [`AffineModel2d`] | `m00, m10, m01, m11, tx, ty` | 3 |
//! | [`HomographyModel2d`] | 3×3 homogeneous matrix | 4 |
//!
//! All fits run in `f64`. Affine-family models share the canonical 6-value
//! array representation `[m00, m10, m01, m11, tx, ty]`; the homography uses
//! 9 row-major values. A singular fit reports
//! [`ModelError::NotEnoughDataPoints`] instead of producing `NaN`.
//!
//! # Example
//!
//! ```
//! use align_models::{Model, Model2d, ModelKind};
//! use align_types::{Point, PointMatch};
//! use nalgebra::Point2;
//!
//! // Two matches shifted by (2, 0) pin down a rigid motion.
//! let matches: Vec<PointMatch> = [(0.0, 0.0), (4.0, 0.0)]
//!     .iter()
//!     .map(|&(x, y)| {
//!         PointMatch::new(
//!             Point::new(Point2::new(x, y)),
//!             Point::new(Point2::new(x + 2.0, y)),
//!             1.0,
//!         )
//!     })
//!     .collect();
//!
//! let mut model = Model::new(ModelKind::Rigid);
//! model.fit(&matches).unwrap();
//! assert!(model.cost(&matches) < 1e-9);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod affine;
mod error;
mod homography;
mod model;
mod rigid;
mod scale;
mod similarity;
mod translation;

pub use affine::AffineModel2d;
pub use error::{ModelError, ModelResult};
pub use homography::HomographyModel2d;
pub use model::{Model, Model2d, ModelKind};
pub use rigid::RigidModel2d;
pub use scale::{best_mipmap_level, create_scale_level_transform};
pub use similarity::SimilarityModel2d;
pub use translation::TranslationModel2d;
