//! Inter-layer constraint wiring.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use align_mesh::{PassiveOwner, PassiveRef, Spring, SpringMesh};
use align_models::Model;
use align_solver::{TileConfiguration, TileId, TileMatch};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::fixup::BoundRecord;
use crate::AlignParams;

/// The wired system: meshes coupled by springs plus the rigid
/// pre-alignment graph.
#[derive(Debug)]
pub(crate) struct WiredSystem {
    pub meshes: Vec<SpringMesh>,
    pub config: TileConfiguration,
    /// Tile id per layer slot.
    pub tiles: Vec<TileId>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wire springs and graph edges for every layer pair within
/// `max_layer_distance`.
///
/// Pairs are partitioned by their lower layer across workers. The two
/// meshes of a pair are locked in ascending layer order; the tile
/// configuration has its own mutex with O(1) critical sections.
pub(crate) fn wire_layers(
    params: &AlignParams,
    meshes: Vec<SpringMesh>,
    bound: &BTreeMap<(i64, i64), BoundRecord>,
    fixed: &BTreeSet<i64>,
    skipped: &BTreeSet<i64>,
    start: i64,
    end: i64,
) -> WiredSystem {
    info!(start, end, max_distance = params.max_layer_distance, "matching layers");

    let mut config = TileConfiguration::new();
    let tiles: Vec<TileId> = meshes
        .iter()
        .map(|_| config.create_tile(Model::new(params.model)))
        .collect();

    let cells: Vec<Mutex<SpringMesh>> = meshes.into_iter().map(Mutex::new).collect();
    let config_cell = Mutex::new(config);

    let lower_layers: Vec<i64> = (start..end).collect();
    lower_layers.par_iter().for_each(|&layer_a| {
        if skipped.contains(&layer_a) {
            debug!(layer = layer_a, "skipping wiring of layer");
            return;
        }
        for layer_b in (layer_a + 1)..=(layer_a + params.max_layer_distance) {
            if layer_b > end || skipped.contains(&layer_b) {
                continue;
            }
            let a_fixed = fixed.contains(&layer_a);
            let b_fixed = fixed.contains(&layer_b);
            if a_fixed && b_fixed {
                continue;
            }
            let rec_ab = bound.get(&(layer_a, layer_b));
            let rec_ba = bound.get(&(layer_b, layer_a));
            if rec_ab.is_none() && rec_ba.is_none() {
                continue;
            }

            #[allow(clippy::cast_sign_loss)]
            let slot_a = (layer_a - start) as usize;
            #[allow(clippy::cast_sign_loss)]
            let slot_b = (layer_b - start) as usize;
            #[allow(clippy::cast_precision_loss)]
            let spring_constant = 1.0 / (layer_b - layer_a) as f64;

            // Ascending-layer lock order prevents deadlocks between
            // workers wiring overlapping pairs.
            let mut mesh_a = lock(&cells[slot_a]);
            let mut mesh_b = lock(&cells[slot_b]);

            if a_fixed {
                lock(&config_cell).fix_tile(tiles[slot_a]);
            } else if let Some(rec) = rec_ab {
                if rec.matches.len() > 1 {
                    wire_direction(
                        rec,
                        &mut mesh_a,
                        slot_a,
                        &mut mesh_b,
                        slot_b,
                        spring_constant,
                    );
                    if rec.should_connect {
                        let matches = tile_matches(rec, &mesh_a);
                        let mut cfg = lock(&config_cell);
                        cfg.add_tile(tiles[slot_a]);
                        cfg.add_tile(tiles[slot_b]);
                        cfg.connect(tiles[slot_a], tiles[slot_b], &matches);
                    }
                }
            }

            if b_fixed {
                lock(&config_cell).fix_tile(tiles[slot_b]);
            } else if let Some(rec) = rec_ba {
                if rec.matches.len() > 1 {
                    wire_direction(
                        rec,
                        &mut mesh_b,
                        slot_b,
                        &mut mesh_a,
                        slot_a,
                        spring_constant,
                    );
                    if rec.should_connect {
                        let matches = tile_matches(rec, &mesh_b);
                        let mut cfg = lock(&config_cell);
                        cfg.add_tile(tiles[slot_b]);
                        cfg.add_tile(tiles[slot_a]);
                        cfg.connect(tiles[slot_b], tiles[slot_a], &matches);
                    }
                }
            }

            debug!(
                layer_a,
                layer_b, spring_constant, "wired layer pair"
            );
        }
    });

    let meshes: Vec<SpringMesh> = cells
        .into_iter()
        .map(|c| c.into_inner().unwrap_or_else(PoisonError::into_inner))
        .collect();
    let config = config_cell
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    WiredSystem {
        meshes,
        config,
        tiles,
    }
}

/// Install one direction's springs: for every snapped match, a fresh
/// passive vertex on the target mesh and a zero-rest spring from the
/// source mesh's active vertex to it.
fn wire_direction(
    rec: &BoundRecord,
    source_mesh: &mut SpringMesh,
    source_slot: usize,
    target_mesh: &mut SpringMesh,
    target_slot: usize,
    spring_constant: f64,
) {
    for m in &rec.matches {
        let passive = target_mesh.add_passive_vertex(
            m.p2,
            PassiveOwner {
                mesh: source_slot,
                vertex: m.vertex,
            },
        );
        source_mesh.add_attachment(
            m.vertex,
            PassiveRef {
                mesh: target_slot,
                index: passive,
            },
            Spring::new(0.0, spring_constant),
            m.weight,
        );
    }
}

/// The solver-facing view of a record: each match's source-vertex rest
/// position paired with the target point's local position.
fn tile_matches(rec: &BoundRecord, source_mesh: &SpringMesh) -> Vec<TileMatch> {
    rec.matches
        .iter()
        .map(|m| TileMatch {
            source: source_mesh.vertices()[m.vertex].local(),
            target: m.p2.local,
            weight: m.weight,
        })
        .collect()
}
