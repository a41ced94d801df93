//! Tile-spec inputs grouped by layer.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use align_spec::{read_tile_specs, TileSpec};
use hashbrown::HashMap;
use nalgebra::Vector2;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::{ElasticError, ElasticResult, InputFailure};

/// The tiles of one layer, together with the file they came from.
#[derive(Debug, Clone)]
pub struct LayerTiles {
    /// The originating tile-spec file.
    pub path: String,
    /// Basename used for the emitted output file.
    pub basename: String,
    /// The layer's tiles.
    pub tiles: Vec<TileSpec>,
}

/// All loaded tile specs, grouped by layer.
#[derive(Debug, Default)]
pub struct LayerSet {
    /// Layers in ascending order.
    pub layers: BTreeMap<i64, LayerTiles>,
    /// Mapping from tile-spec file path to its layer.
    pub url_to_layer: HashMap<String, i64>,
}

fn basename_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |n| n.to_string_lossy().to_string())
}

impl LayerSet {
    /// Load tile-spec files, skipping files whose layer is in `skipped`.
    ///
    /// Parse failures are collected across all files and reported together.
    ///
    /// # Errors
    ///
    /// [`ElasticError::InputParse`] with the collected failures, or
    /// [`ElasticError::MissingLayer`] when a file has no usable layer.
    pub fn load(files: &[String], skipped: &BTreeSet<i64>) -> ElasticResult<Self> {
        info!(files = files.len(), "reading tilespecs");
        let parsed: Vec<(String, Result<Vec<TileSpec>, String>)> = files
            .par_iter()
            .map(|f| {
                let result = read_tile_specs(f).map_err(|e| e.to_string());
                (f.clone(), result)
            })
            .collect();

        let mut failures = Vec::new();
        let mut set = Self::default();
        for (path, result) in parsed {
            let tiles = match result {
                Ok(tiles) => tiles,
                Err(message) => {
                    failures.push(InputFailure {
                        path,
                        message,
                    });
                    continue;
                }
            };
            let Some(first) = tiles.first() else {
                failures.push(InputFailure {
                    path,
                    message: "tile spec file holds no tiles".to_string(),
                });
                continue;
            };
            if !first.has_layer() {
                return Err(ElasticError::MissingLayer { url: path });
            }
            let layer = first.layer;
            if skipped.contains(&layer) {
                continue;
            }
            if set.layers.contains_key(&layer) {
                warn!(layer, path = %path, "layer loaded twice, keeping the later file");
            }
            set.url_to_layer.insert(path.clone(), layer);
            set.layers.insert(
                layer,
                LayerTiles {
                    basename: basename_of(&path),
                    path,
                    tiles,
                },
            );
        }

        if !failures.is_empty() {
            return Err(ElasticError::InputParse { failures });
        }
        Ok(set)
    }

    /// First and last layer present.
    #[must_use]
    pub fn layer_span(&self) -> Option<(i64, i64)> {
        let first = *self.layers.keys().next()?;
        let last = *self.layers.keys().next_back()?;
        Some((first, last))
    }

    /// Minimum corner of the union of all tile bounding boxes: the scene
    /// origin the solve is translated against.
    #[must_use]
    pub fn origin(&self) -> Vector2<f64> {
        let mut origin = Vector2::new(f64::INFINITY, f64::INFINITY);
        for layer in self.layers.values() {
            for tile in &layer.tiles {
                if let Some([min_x, _, min_y, _]) = tile.bbox {
                    origin.x = origin.x.min(min_x);
                    origin.y = origin.y.min(min_y);
                }
            }
        }
        if origin.x.is_finite() && origin.y.is_finite() {
            origin
        } else {
            Vector2::zeros()
        }
    }
}
