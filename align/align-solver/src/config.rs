//! The tile graph and its iterative error-minimizing optimizer.

use align_models::{Model, Model2d};
use align_types::{CancelToken, ErrorHistory, OptimizeStatus, Point, PointMatch};
use hashbrown::{HashMap, HashSet};
use nalgebra::Point2;
use tracing::{debug, info, warn};

use crate::{SolverError, SolverResult};

/// Identifier of a tile within a [`TileConfiguration`].
pub type TileId = usize;

/// A weighted correspondence between the local frames of two connected
/// tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileMatch {
    /// Local position in the first tile's frame.
    pub source: Point2<f64>,
    /// Local position in the second tile's frame.
    pub target: Point2<f64>,
    /// Non-negative confidence weight.
    pub weight: f64,
}

impl TileMatch {
    fn bit_key(&self) -> [u64; 5] {
        [
            self.source.x.to_bits(),
            self.source.y.to_bits(),
            self.target.x.to_bits(),
            self.target.y.to_bits(),
            self.weight.to_bits(),
        ]
    }
}

/// A model-bearing node of the tile graph.
#[derive(Debug, Clone)]
pub struct Tile {
    model: Model,
    cost: f64,
}

impl Tile {
    /// The tile's current model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The tile's mean transfer error from the last optimizer sweep.
    #[must_use]
    pub fn cost(&self) -> f64 {
        self.cost
    }
}

#[derive(Debug, Clone)]
struct Connection {
    a: TileId,
    b: TileId,
    matches: Vec<TileMatch>,
    seen: HashSet<[u64; 5]>,
}

/// Outcome of a [`TileConfiguration::optimize`] run.
#[derive(Debug, Clone, Copy)]
pub struct SolveReport {
    /// Sweeps executed.
    pub iterations: usize,
    /// How the run terminated.
    pub status: OptimizeStatus,
    /// Largest per-tile error at the final sweep.
    pub max_error: f64,
    /// Mean per-tile error at the final sweep.
    pub mean_error: f64,
}

/// A set of tiles plus point-match connections, with some tiles held
/// fixed at their current model.
///
/// Tiles are created up front with [`TileConfiguration::create_tile`];
/// only tiles added via [`TileConfiguration::add_tile`] (or referenced by a
/// connection, which adds them implicitly) participate in the solve.
#[derive(Debug, Default)]
pub struct TileConfiguration {
    tiles: Vec<Tile>,
    members: Vec<TileId>,
    member_set: HashSet<TileId>,
    fixed: HashSet<TileId>,
    connections: Vec<Connection>,
    edge_index: HashMap<(TileId, TileId), usize>,
}

impl TileConfiguration {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tile slot carrying `model`. The tile does not take part
    /// in the solve until added or connected.
    pub fn create_tile(&mut self, model: Model) -> TileId {
        self.tiles.push(Tile { model, cost: 0.0 });
        self.tiles.len() - 1
    }

    /// Access a tile by id.
    #[must_use]
    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id)
    }

    /// Add a tile to the solve set. Idempotent.
    pub fn add_tile(&mut self, id: TileId) {
        if id < self.tiles.len() && self.member_set.insert(id) {
            self.members.push(id);
        }
    }

    /// Freeze a tile at its current model. Idempotent.
    pub fn fix_tile(&mut self, id: TileId) {
        if id < self.tiles.len() {
            self.fixed.insert(id);
        }
    }

    /// Whether a tile is fixed.
    #[must_use]
    pub fn is_fixed(&self, id: TileId) -> bool {
        self.fixed.contains(&id)
    }

    /// Number of tiles participating in the solve.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Connect two tiles with a symmetric point-match edge.
    ///
    /// Installing the same edge twice is a no-op for the edge itself; the
    /// match list is appended, skipping matches already present
    /// (bit-identical coordinates and weight). Connected tiles join the
    /// solve set.
    pub fn connect(&mut self, a: TileId, b: TileId, matches: &[TileMatch]) {
        if a == b || a >= self.tiles.len() || b >= self.tiles.len() {
            return;
        }
        self.add_tile(a);
        self.add_tile(b);
        let key = (a.min(b), a.max(b));
        let idx = *self.edge_index.entry(key).or_insert_with(|| {
            self.connections.push(Connection {
                a,
                b,
                matches: Vec::new(),
                seen: HashSet::new(),
            });
            self.connections.len() - 1
        });
        let conn = &mut self.connections[idx];
        // The stored orientation may be flipped relative to the caller's.
        let flip = conn.a != a;
        for m in matches {
            let m = if flip {
                TileMatch {
                    source: m.target,
                    target: m.source,
                    weight: m.weight,
                }
            } else {
                *m
            };
            if conn.seen.insert(m.bit_key()) {
                conn.matches.push(m);
            }
        }
    }

    /// Matches incident to `tile`, as fit constraints: each source local
    /// position paired with the neighbor's current image of the target
    /// local position.
    fn fit_matches(&self, tile: TileId) -> Vec<PointMatch> {
        let mut out = Vec::new();
        for conn in &self.connections {
            if conn.a == tile {
                let neighbor = &self.tiles[conn.b].model;
                out.extend(conn.matches.iter().map(|m| {
                    PointMatch::new(
                        Point::new(m.source),
                        Point::with_world(m.target, neighbor.apply(m.target)),
                        m.weight,
                    )
                }));
            } else if conn.b == tile {
                let neighbor = &self.tiles[conn.a].model;
                out.extend(conn.matches.iter().map(|m| {
                    PointMatch::new(
                        Point::new(m.target),
                        Point::with_world(m.source, neighbor.apply(m.source)),
                        m.weight,
                    )
                }));
            }
        }
        out
    }

    /// Iteratively fit every movable tile's model to its incident matches
    /// transformed through its neighbors' current models.
    ///
    /// Sweeps run in tile insertion order. Termination is by the largest
    /// per-tile error dropping below `max_epsilon`, by a plateau of the
    /// mean error over `max_plateau_width` sweeps, or by the `max_iterations`
    /// cap.
    ///
    /// # Errors
    ///
    /// [`SolverError::NotEnoughDataPoints`] when a movable member tile has
    /// fewer than 3 usable matches.
    pub fn optimize(
        &mut self,
        max_epsilon: f64,
        max_iterations: usize,
        max_plateau_width: usize,
        cancel: Option<&CancelToken>,
    ) -> SolverResult<SolveReport> {
        // Wiring may install members and connections from several workers;
        // canonicalize their order so sweeps and reductions are
        // reproducible run to run.
        self.members.sort_unstable();
        self.connections
            .sort_by_key(|c| (c.a.min(c.b), c.a.max(c.b)));
        self.edge_index = self
            .connections
            .iter()
            .enumerate()
            .map(|(i, c)| ((c.a.min(c.b), c.a.max(c.b)), i))
            .collect();

        let movable: Vec<TileId> = self
            .members
            .iter()
            .copied()
            .filter(|id| !self.fixed.contains(id))
            .collect();

        for &id in &movable {
            let found: usize = self
                .connections
                .iter()
                .filter(|c| c.a == id || c.b == id)
                .map(|c| c.matches.len())
                .sum();
            if found < 3 {
                return Err(SolverError::NotEnoughDataPoints {
                    tile: id,
                    needed: 3,
                    found,
                });
            }
        }

        info!(
            tiles = self.members.len(),
            movable = movable.len(),
            connections = self.connections.len(),
            "optimizing tile configuration"
        );

        let mut history = ErrorHistory::new(max_plateau_width);
        let mut report = SolveReport {
            iterations: 0,
            status: OptimizeStatus::IterationLimit,
            max_error: f64::INFINITY,
            mean_error: f64::INFINITY,
        };

        for iteration in 0..max_iterations {
            if cancel.is_some_and(CancelToken::is_canceled) {
                report.status = OptimizeStatus::Canceled;
                break;
            }

            for &id in &movable {
                let matches = self.fit_matches(id);
                let mut model = self.tiles[id].model.clone();
                match model.fit(&matches) {
                    Ok(()) => {}
                    Err(e) => {
                        warn!(tile = id, error = %e, "fit failed, keeping identity");
                        model.reset();
                    }
                }
                self.tiles[id].cost = model.cost(&matches);
                self.tiles[id].model = model;
            }

            let errors: Vec<f64> = movable.iter().map(|&id| self.tiles[id].cost).collect();
            report.iterations = iteration + 1;
            report.max_error = errors.iter().fold(0.0_f64, |m, &e| m.max(e));
            report.mean_error = align_types::pairwise_mean(&errors);
            history.push(report.mean_error);

            if report.max_error < max_epsilon {
                report.status = OptimizeStatus::Converged;
                break;
            }
            if history.plateaued() {
                report.status = OptimizeStatus::Plateaued;
                break;
            }
            if iteration % 100 == 0 {
                debug!(
                    iteration,
                    max_error = report.max_error,
                    mean_error = report.mean_error,
                    "solver sweep"
                );
            }
        }

        info!(
            iterations = report.iterations,
            status = ?report.status,
            max_error = report.max_error,
            "tile configuration solve finished"
        );
        Ok(report)
    }
}
