//! Correspondence loading and indexing.

use std::collections::BTreeMap;

use align_spec::{read_correspondences, read_tile_specs, CorrespondenceSpec};
use rayon::prelude::*;
use tracing::info;

use crate::{ElasticError, ElasticResult, InputFailure, LayerSet};

/// Correspondence records indexed by `(layer_a, layer_b)`.
///
/// `BTreeMap` keeps iteration in layer order, which downstream phases rely
/// on for reproducible output.
#[derive(Debug, Default)]
pub struct CorrespondenceIndex {
    /// `map[a][b]` holds the record whose `p1` side lives in layer `a`.
    pub map: BTreeMap<i64, BTreeMap<i64, CorrespondenceSpec>>,
}

fn layer_of_url(url: &str, layers: &LayerSet) -> ElasticResult<i64> {
    if let Some(&layer) = layers.url_to_layer.get(url) {
        return Ok(layer);
    }
    // The correspondence may reference a tile-spec file outside the loaded
    // set; read its first tile's layer directly.
    let tiles = read_tile_specs(url)?;
    match tiles.first() {
        Some(t) if t.has_layer() => Ok(t.layer),
        _ => Err(ElasticError::MissingLayer {
            url: url.to_string(),
        }),
    }
}

impl CorrespondenceIndex {
    /// Parse correspondence files and index their records by layer pair.
    ///
    /// Files parse in parallel; per-file failures are collected and
    /// reported together after all files have been read. A layer pair
    /// appearing twice is fatal.
    ///
    /// # Errors
    ///
    /// [`ElasticError::InputParse`], [`ElasticError::MissingLayer`], or
    /// [`ElasticError::DuplicateCorrespondence`].
    pub fn load(files: &[String], layers: &LayerSet) -> ElasticResult<Self> {
        info!(files = files.len(), "parsing correspondence files");
        let parsed: Vec<(String, Result<Vec<CorrespondenceSpec>, String>)> = files
            .par_iter()
            .map(|f| {
                let result = read_correspondences(f).map_err(|e| e.to_string());
                (f.clone(), result)
            })
            .collect();

        let mut failures = Vec::new();
        let mut index = Self::default();
        for (path, result) in parsed {
            let records = match result {
                Ok(records) => records,
                Err(message) => {
                    failures.push(InputFailure { path, message });
                    continue;
                }
            };
            for record in records {
                let layer_a = layer_of_url(&record.url1, layers)?;
                let layer_b = layer_of_url(&record.url2, layers)?;
                let previous = index
                    .map
                    .entry(layer_a)
                    .or_default()
                    .insert(layer_b, record);
                if previous.is_some() {
                    return Err(ElasticError::DuplicateCorrespondence { layer_a, layer_b });
                }
            }
        }

        if !failures.is_empty() {
            return Err(ElasticError::InputParse { failures });
        }
        Ok(index)
    }

    /// The record for an ordered layer pair, if present.
    #[must_use]
    pub fn record(&self, layer_a: i64, layer_b: i64) -> Option<&CorrespondenceSpec> {
        self.map.get(&layer_a)?.get(&layer_b)
    }
}
