//! The elastic aligner pipeline.

use std::collections::{BTreeMap, BTreeSet};

use align_mesh::{optimize_meshes, optimize_meshes_legacy, RelaxReport, SpringMesh};
use align_mls::{ControlPoint, MovingLeastSquares};
use align_solver::SolveReport;
use align_spec::{TransformSpec, MLS_CLASS_NAME};
use align_types::{CancelToken, OptimizeStatus};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::fixup::build_meshes;
use crate::wire::wire_layers;
use crate::{
    AlignParams, CorrespondenceIndex, ElasticError, ElasticResult, LayerSet, LayerTiles,
    RunReport,
};

/// Inputs of one alignment run.
#[derive(Debug)]
pub struct AlignInputs {
    /// Loaded tile specs grouped by layer.
    pub layers: LayerSet,
    /// Indexed correspondence records.
    pub correspondences: CorrespondenceIndex,
    /// Layers frozen during the solve.
    pub fixed_layers: BTreeSet<i64>,
    /// Layers excluded from wiring and emit.
    pub skipped_layers: BTreeSet<i64>,
    /// First layer to align (defaults to the first loaded layer).
    pub from_layer: Option<i64>,
    /// Last layer to align (defaults to the last loaded layer).
    pub to_layer: Option<i64>,
    /// Cooperative cancellation, checked between iterations.
    pub cancel: Option<CancelToken>,
}

/// The aligned tiles, ready to be written per layer.
#[derive(Debug)]
pub struct AlignOutput {
    /// Updated layers in ascending order.
    pub layers: BTreeMap<i64, LayerTiles>,
    /// Run statistics.
    pub report: RunReport,
}

fn checked_status(status: OptimizeStatus, phase: &str) -> ElasticResult<()> {
    match status {
        OptimizeStatus::Canceled => Err(ElasticError::Canceled),
        OptimizeStatus::IterationLimit => {
            warn!(phase, "iteration cap reached before convergence");
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Run the full elastic alignment: fix-up, wiring, rigid pre-alignment,
/// spring-mesh relaxation, unscale, and per-tile transform emit.
///
/// # Errors
///
/// Any [`ElasticError`]; on error no partial output is produced.
pub fn align_layers(params: &AlignParams, inputs: &AlignInputs) -> ElasticResult<AlignOutput> {
    params.validate()?;

    let Some((mut first, mut last)) = inputs.layers.layer_span() else {
        return Err(ElasticError::EmptyRange);
    };
    if let Some(from) = inputs.from_layer {
        first = first.max(from);
    }
    if let Some(to) = inputs.to_layer {
        last = last.min(to);
    }
    if last < first {
        return Err(ElasticError::EmptyRange);
    }

    // Fixed layers outside the window (or skipped) are dropped; an empty
    // fixed set anchors the first layer so the solution cannot drift.
    let mut fixed: BTreeSet<i64> = inputs
        .fixed_layers
        .iter()
        .copied()
        .filter(|l| *l >= first && *l <= last && !inputs.skipped_layers.contains(l))
        .collect();
    if fixed.is_empty() {
        fixed.insert(first);
    }
    let origin = inputs.layers.origin();
    info!(first, last, ?fixed, origin = ?(origin.x, origin.y), "starting elastic alignment");

    let fixup = build_meshes(params, &inputs.correspondences, first, last)?;
    let dropped_matches = fixup.dropped;

    let mut wired = wire_layers(
        params,
        fixup.meshes,
        &fixup.bound,
        &fixed,
        &inputs.skipped_layers,
        first,
        last,
    );

    // Stage one: rigid pre-alignment of whole layers.
    let prealign: Option<SolveReport> = if wired.config.member_count() > 0 {
        info!("pre-aligning by optimizing a piecewise linear model");
        let report = wired.config.optimize(
            params.max_epsilon * params.layer_scale,
            params.max_iterations,
            params.max_plateau_width,
            inputs.cancel.as_ref(),
        )?;
        checked_status(report.status, "pre-align")?;
        Some(report)
    } else {
        None
    };

    info!("initializing meshes from the layer models");
    for (slot, mesh) in wired.meshes.iter_mut().enumerate() {
        if let Some(tile) = wired.config.tile(wired.tiles[slot]) {
            mesh.init(tile.model());
        }
    }

    // Stage two: elastic relaxation.
    let relaxation: RelaxReport = if params.use_legacy_optimizer {
        optimize_meshes_legacy(
            &mut wired.meshes,
            params.max_epsilon * params.layer_scale,
            params.max_iterations,
            inputs.cancel.as_ref(),
        )?
    } else {
        optimize_meshes(
            &mut wired.meshes,
            params.max_epsilon * params.layer_scale,
            params.max_iterations,
            params.max_plateau_width,
            inputs.cancel.as_ref(),
        )?
    };
    checked_status(relaxation.status, "relaxation")?;

    info!("translating meshes back to world units");
    for mesh in &mut wired.meshes {
        mesh.unscale(params.layer_scale, origin);
    }

    let layers = emit(&wired.meshes, &inputs.layers, &inputs.skipped_layers, first, last)?;
    let report = RunReport {
        dropped_matches,
        prealign,
        relaxation,
        layers_emitted: layers.len(),
    };
    info!(layers = report.layers_emitted, "elastic alignment complete");
    Ok(AlignOutput { layers, report })
}

/// Build each layer's restricted MLS transform from its mesh control
/// points and append it to every tile's transform chain.
fn emit(
    meshes: &[SpringMesh],
    layers: &LayerSet,
    skipped: &BTreeSet<i64>,
    first: i64,
    last: i64,
) -> ElasticResult<BTreeMap<i64, LayerTiles>> {
    let work: Vec<(i64, &LayerTiles)> = layers
        .layers
        .range(first..=last)
        .filter(|&(layer, _)| !skipped.contains(layer))
        .map(|(&layer, tiles)| (layer, tiles))
        .collect();

    let emitted: Vec<ElasticResult<(i64, LayerTiles)>> = work
        .par_iter()
        .map(|&(layer, layer_tiles)| {
            #[allow(clippy::cast_sign_loss)]
            let mesh = &meshes[(layer - first) as usize];
            let controls: Vec<ControlPoint> = mesh
                .vertices()
                .iter()
                .map(|v| ControlPoint {
                    source: v.local(),
                    target: v.world(),
                    weight: 1.0,
                })
                .collect();
            let mls = MovingLeastSquares::new(controls, 2.0)
                .map_err(|source| ElasticError::Mls { layer, source })?;

            let (min, max) = mesh.bounds();
            let mesh_bbox = [min.x, max.x, min.y, max.y];

            let mut out = layer_tiles.clone();
            for tile in &mut out.tiles {
                let restricted = mls.restrict_to(tile.bbox.unwrap_or(mesh_bbox));
                tile.transforms.push(TransformSpec {
                    class_name: MLS_CLASS_NAME.to_string(),
                    data_string: restricted.to_data_string(),
                });
                tile.bbox = Some(mesh_bbox);
            }
            info!(layer, tiles = out.tiles.len(), "updated tiles in layer");
            Ok((layer, out))
        })
        .collect();

    let mut out = BTreeMap::new();
    for result in emitted {
        let (layer, tiles) = result?;
        out.insert(layer, tiles);
    }
    Ok(out)
}
