//! Per-layer mesh construction and match-vertex fix-up.

use std::collections::BTreeMap;

use align_mesh::{MeshParams, SpringMesh};
use align_types::{Point, PointMatch};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{AlignParams, CorrespondenceIndex, ElasticResult};

/// A correspondence match after fix-up: its `p1` is the identified active
/// vertex of the source layer's mesh.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SnappedMatch {
    /// Active vertex index in the source layer's mesh.
    pub vertex: usize,
    /// The match's target point, in the other layer's frame.
    pub p2: Point,
    /// Match weight.
    pub weight: f64,
}

/// One correspondence record with its matches snapped to mesh vertices.
#[derive(Debug, Clone)]
pub(crate) struct BoundRecord {
    pub should_connect: bool,
    pub matches: Vec<SnappedMatch>,
}

/// The fix-up result: one mesh per layer of the range, plus the snapped
/// records keyed by `(layer_a, layer_b)`.
#[derive(Debug)]
pub(crate) struct FixupOutput {
    pub meshes: Vec<SpringMesh>,
    pub bound: BTreeMap<(i64, i64), BoundRecord>,
    pub dropped: usize,
}

/// Build one spring mesh per layer in `[start, end]` and snap every
/// record's `p1` endpoints onto the lattice.
///
/// Layers are partitioned across workers; each worker owns its layers'
/// meshes and records exclusively, and the per-layer results are
/// concatenated in layer order.
pub(crate) fn build_meshes(
    params: &AlignParams,
    corrs: &CorrespondenceIndex,
    start: i64,
    end: i64,
) -> ElasticResult<FixupOutput> {
    info!(start, end, "fixing point-match vertices");
    let mesh_params = MeshParams {
        resolution: params.mesh_resolution,
        width: params.mesh_width(),
        height: params.mesh_height(),
        stiffness: params.stiffness,
        max_stretch: params.max_stretch * params.layer_scale,
        damp: params.damp,
    };

    let layers: Vec<i64> = (start..=end).collect();
    type LayerResult = (SpringMesh, Vec<((i64, i64), BoundRecord)>, usize);
    let per_layer: Vec<ElasticResult<LayerResult>> = layers
        .par_iter()
        .map(|&layer| {
            #[allow(clippy::cast_sign_loss)]
            let mut mesh = SpringMesh::new(layer.max(0) as usize, &mesh_params)?;
            let mut bound = Vec::new();
            let mut dropped = 0_usize;
            if let Some(inner) = corrs.map.get(&layer) {
                for (&other, record) in inner {
                    let mut snapped = Vec::with_capacity(record.correspondence_point_pairs.len());
                    for pair in &record.correspondence_point_pairs {
                        let pm: PointMatch = (*pair).into();
                        if let Some(vertex) = mesh.find_lattice_vertex(pm.p1.local) {
                            // The match's world side wins: vertices are
                            // built at rest, matches encode observed drift.
                            mesh.set_vertex_world(vertex, pm.p1.world);
                            snapped.push(SnappedMatch {
                                vertex,
                                p2: pm.p2,
                                weight: pm.weight,
                            });
                        } else {
                            dropped += 1;
                        }
                    }
                    debug!(
                        layer,
                        other,
                        snapped = snapped.len(),
                        "bound correspondence record"
                    );
                    bound.push((
                        (layer, other),
                        BoundRecord {
                            should_connect: record.should_connect,
                            matches: snapped,
                        },
                    ));
                }
            }
            Ok((mesh, bound, dropped))
        })
        .collect();

    let mut output = FixupOutput {
        meshes: Vec::with_capacity(layers.len()),
        bound: BTreeMap::new(),
        dropped: 0,
    };
    for result in per_layer {
        let (mesh, bound, dropped) = result?;
        output.meshes.push(mesh);
        output.bound.extend(bound);
        output.dropped += dropped;
    }
    if output.dropped > 0 {
        info!(dropped = output.dropped, "matches outside the mesh were dropped");
    }
    Ok(output)
}
