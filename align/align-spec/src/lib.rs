//! External interfaces of the alignment pipeline.
//!
//! This crate covers the on-disk formats and the format-level helpers:
//!
//! - [`TileSpec`] / [`TransformSpec`] - tile-spec JSON files, with unknown
//!   fields preserved for round-tripping
//! - [`CorrespondenceSpec`] - point-match correspondence JSON files
//! - [`TransformList`] - parsed transform chains (`className` is a
//!   discriminator, `dataString` carries the parameters)
//! - [`world_to_local`] / [`local_to_world`] - coordinate lookup across a
//!   layer's tiles, skipping non-invertible tiles
//! - [`parse_layer_range`] - skip-layer expressions such as `"3,5-7,12"`
//! - [`expand_file_args`] - single-list-file expansion of file arguments
//! - [`sample_average_scale`] - similarity-fit scale estimation of a chain
//!
//! # Example
//!
//! ```
//! use align_spec::{TransformList, TransformSpec};
//! use nalgebra::Point2;
//!
//! let chain = TransformList::from_specs(&[TransformSpec {
//!     class_name: "TranslationModel2D".to_string(),
//!     data_string: "10 20".to_string(),
//! }])
//! .unwrap();
//! assert_eq!(chain.apply(Point2::origin()), Point2::new(10.0, 20.0));
//! ```

#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]

mod coords;
mod error;
mod io;
mod range;
mod scale;
mod transform;
mod types;

pub use coords::{local_to_world, world_to_local, TileCoordinates};
pub use error::{SpecError, SpecResult};
pub use io::{expand_file_args, read_correspondences, read_tile_specs, write_tile_specs};
pub use range::parse_layer_range;
pub use scale::sample_average_scale;
pub use transform::{TileTransform, TransformList, MLS_CLASS_NAME};
pub use types::{CorrespondenceSpec, PointPairSpec, PointSpec, TileSpec, TransformSpec};
