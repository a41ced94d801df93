//! Core types for elastic layer alignment.
//!
//! This crate provides the foundational vocabulary shared by the alignment
//! stack:
//!
//! - [`Point`] - A local/world coordinate pair
//! - [`PointMatch`] - A weighted correspondence between two points
//! - [`ErrorHistory`] - A ring buffer with plateau detection for iterative
//!   optimizers
//! - [`OptimizeStatus`] - How an optimizer run terminated
//! - [`CancelToken`] - Cooperative cancellation checked between iterations
//! - [`pairwise_sum`] / [`pairwise_mean`] - Deterministic reductions
//!
//! # Units
//!
//! This library is unit-agnostic. All coordinates are `f64`. The alignment
//! pipeline operates in layer-scaled pixel units until the final unscale
//! step.
//!
//! # Example
//!
//! ```
//! use align_types::{Point, PointMatch};
//! use nalgebra::Point2;
//!
//! let p1 = Point::new(Point2::new(0.0, 0.0));
//! let p2 = Point::with_world(Point2::new(1.0, 0.0), Point2::new(1.5, 0.0));
//! let m = PointMatch::new(p1, p2, 1.0);
//! assert!(m.distance() > 0.0);
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod cancel;
mod convergence;
mod point;
mod sum;

pub use cancel::CancelToken;
pub use convergence::{ErrorHistory, OptimizeStatus};
pub use point::{ulp, Point, PointMatch};
pub use sum::{pairwise_mean, pairwise_sum};

// Re-export the nalgebra types used throughout the alignment stack.
pub use nalgebra::{Point2, Vector2};
